//! Unified error handling with Sentry integration.
//!
//! [`AppError`] wraps the error of every boundary so binaries can report a
//! single type. Failures that point at the remote service are captured to
//! Sentry via [`AppError::report`].

use thiserror::Error;

use crate::api::ApiError;
use crate::cart::{CartError, CartFailure};
use crate::checkout::CheckoutError;
use crate::config::ConfigError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Commerce API client failure.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Cart operation rejected locally.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Cart operation rejected remotely.
    #[error("Cart error: {0}")]
    CartFailure(CartFailure),

    /// Checkout attempt ended.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// A signed-in user is required.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Output could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<CartFailure> for AppError {
    fn from(failure: CartFailure) -> Self {
        Self::CartFailure(failure)
    }
}

impl AppError {
    /// Whether this error points at a fault worth tracking rather than a
    /// user mistake.
    #[must_use]
    pub const fn is_reportable(&self) -> bool {
        matches!(
            self,
            Self::Api(_)
                | Self::Checkout(CheckoutError::OrdersFailed { .. })
        )
    }

    /// Log the error, capturing reportable ones to Sentry.
    pub fn report(&self) {
        if self.is_reportable() {
            let event_id = sentry::capture_error(self);
            tracing::error!(error = %self, sentry_event_id = %event_id, "Command failed");
        } else {
            tracing::error!(error = %self, "Command failed");
        }
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Add a breadcrumb for a checkout or cart step.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("checkout", "Payment requested", Some(&[("payment_id", "payment-...")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    for (key, value) in data.unwrap_or_default() {
        breadcrumb.data.insert(
            (*key).to_string(),
            serde_json::Value::String((*value).to_string()),
        );
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use super::*;
    use kibble_core::CartItemId;

    #[test]
    fn test_app_error_display() {
        let err = AppError::Unauthorized("no access token".to_string());
        assert_eq!(err.to_string(), "Unauthorized: no access token");

        let err = AppError::from(CartError::ItemNotFound(CartItemId::new(3)));
        assert_eq!(err.to_string(), "Cart error: Cart item 3 not found");

        let err = AppError::from(CartFailure::message("Out of stock"));
        assert_eq!(err.to_string(), "Cart error: Out of stock");
    }

    #[test]
    fn test_reportable_errors() {
        assert!(AppError::Api(ApiError::Decode("eof".to_string())).is_reportable());
        assert!(!AppError::Cart(CartError::SoldOut(CartItemId::new(1))).is_reportable());
        assert!(!AppError::Checkout(CheckoutError::NothingPurchasable).is_reportable());
    }

    #[test]
    fn test_breadcrumb_without_client_is_noop() {
        add_breadcrumb("cart", "Quantity changed", Some(&[("item_id", "3")]));
        add_breadcrumb("cart", "Cart fetched", None);
    }
}
