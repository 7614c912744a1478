//! Commerce REST API gateway.
//!
//! # Architecture
//!
//! - The remote API is the source of truth for carts and orders; the engine
//!   only holds a snapshot of it
//! - [`CartGateway`] and [`OrderGateway`] are the seams the cart store and
//!   checkout flow talk to; [`CommerceClient`] implements both over `reqwest`
//! - Every response uses the `{ok, item}` / `{ok: 0, message}` envelope;
//!   transport failures are folded into the same failure shape
//!
//! # Example
//!
//! ```rust,ignore
//! use kibble_storefront::api::{AccessToken, CartGateway, CommerceClient};
//!
//! let client = CommerceClient::new(&config.api)?;
//! let token = AccessToken::new("eyJhbGciOi...");
//! let items = client.list_cart(&token).await?;
//! ```

mod client;
mod conversions;
mod wire;

pub use client::CommerceClient;

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use kibble_core::{CartItemId, CartLineItem, DeliveryCycle, OrderId, ProductId, PurchaseMode};

// =============================================================================
// Errors
// =============================================================================

/// Errors that can occur when talking to the commerce API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Network failure, timeout or non-JSON transport problem.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with an `ok: 0` envelope.
    #[error("API error: {}", .0.message)]
    Remote(ApiFailure),

    /// The response body did not match the expected shape.
    #[error("Decode error: {0}")]
    Decode(String),
}

impl ApiError {
    /// Whether this is a transport-level failure rather than a business one.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Decode(_))
    }

    /// Fold into the structured failure stored by the cart store.
    ///
    /// Transport failures never leak their raw text; they become the
    /// generic `fallback` message for the operation.
    #[must_use]
    pub fn into_failure(self, fallback: &str) -> ApiFailure {
        match self {
            Self::Remote(failure) => failure,
            Self::Http(_) | Self::Decode(_) => ApiFailure::message(fallback),
        }
    }
}

/// Structured failure from an `ok: 0` envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiFailure {
    /// User-presentable message.
    pub message: String,
    /// Field-level validation errors keyed by field name.
    #[serde(default)]
    pub errors: BTreeMap<String, FieldError>,
}

impl ApiFailure {
    /// A failure carrying only a message.
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            errors: BTreeMap::new(),
        }
    }
}

impl fmt::Display for ApiFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// One field-level validation error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Validation message.
    pub msg: String,
    /// Offending field path, if reported.
    #[serde(default)]
    pub path: Option<String>,
}

/// Generic messages used when a transport failure hides the real cause.
pub mod messages {
    pub const FETCH_FAILED: &str = "A temporary network problem prevented loading the cart.";
    pub const ADD_FAILED: &str = "A temporary network problem prevented adding to the cart.";
    pub const UPDATE_FAILED: &str = "A temporary network problem prevented updating the cart.";
    pub const DELETE_FAILED: &str = "A temporary network problem prevented removing cart items.";
    pub const ORDER_FAILED: &str = "A temporary network problem prevented placing the order.";
}

// =============================================================================
// Credentials
// =============================================================================

/// Bearer token of the signed-in user.
///
/// Wraps a [`SecretString`] so it never shows up in `Debug` output or logs.
#[derive(Clone)]
pub struct AccessToken(SecretString);

impl AccessToken {
    /// Wrap a raw bearer token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }

    /// Expose the raw token for the `Authorization` header.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken([REDACTED])")
    }
}

impl From<SecretString> for AccessToken {
    fn from(secret: SecretString) -> Self {
        Self(secret)
    }
}

// =============================================================================
// Requests and Results
// =============================================================================

/// Remote update of one cart row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartItemUpdate {
    pub quantity: u32,
    /// Sent as `size` only for delivery-cycle changes.
    pub cycle: Option<DeliveryCycle>,
}

/// Request to put a product into the cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewCartItem {
    pub product_id: ProductId,
    pub quantity: u32,
    pub mode: PurchaseMode,
    pub cycle: Option<DeliveryCycle>,
}

/// One product line of an order request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub quantity: u32,
    pub mode: PurchaseMode,
    /// Always set for subscriptions, never for one-time lines.
    pub cycle: Option<DeliveryCycle>,
}

impl OrderLine {
    /// Build the order line for a cart row.
    ///
    /// Subscriptions without a stored cycle are ordered biweekly.
    #[must_use]
    pub fn for_item(item: &CartLineItem) -> Self {
        Self {
            product_id: item.product.id,
            quantity: item.quantity,
            mode: item.purchase_mode,
            cycle: item.effective_cycle(),
        }
    }
}

/// An order created by the commerce API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlacedOrder {
    pub id: OrderId,
    pub state: Option<String>,
    pub total: Option<Decimal>,
    pub discount: Option<Decimal>,
    pub created_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Gateway Traits
// =============================================================================

/// Server-side cart operations.
#[async_trait]
pub trait CartGateway: Send + Sync {
    /// Load every cart row of the authenticated user.
    async fn list_cart(&self, token: &AccessToken) -> Result<Vec<CartLineItem>, ApiError>;

    /// Add a product to the cart.
    async fn add_cart_item(
        &self,
        token: &AccessToken,
        item: &NewCartItem,
    ) -> Result<(), ApiError>;

    /// Update the quantity and optionally the delivery cycle of one row.
    async fn update_cart_item(
        &self,
        token: &AccessToken,
        id: CartItemId,
        update: &CartItemUpdate,
    ) -> Result<(), ApiError>;

    /// Delete one row.
    async fn delete_cart_item(&self, token: &AccessToken, id: CartItemId) -> Result<(), ApiError>;

    /// Delete several rows in one request.
    async fn delete_cart_items(
        &self,
        token: &AccessToken,
        ids: &[CartItemId],
    ) -> Result<(), ApiError>;
}

/// Order creation.
#[async_trait]
pub trait OrderGateway: Send + Sync {
    /// Create one order record for the given product lines.
    async fn create_order(
        &self,
        token: &AccessToken,
        lines: &[OrderLine],
    ) -> Result<PlacedOrder, ApiError>;
}
