//! Storefront context passed to every consumer.
//!
//! Replaces process-wide cart state: binaries build one
//! [`StorefrontContext`], hand out [`CartStore`]s and [`CheckoutFlow`]s from
//! it, and call [`CartStore::reset`] on logout.

use std::sync::Arc;

use crate::api::{AccessToken, ApiError, CommerceClient};
use crate::cart::CartStore;
use crate::checkout::{CheckoutFlow, PaymentGateway};
use crate::config::StorefrontConfig;

/// Shared storefront resources.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct StorefrontContext {
    inner: Arc<StorefrontContextInner>,
}

struct StorefrontContextInner {
    config: StorefrontConfig,
    client: CommerceClient,
}

impl StorefrontContext {
    /// Build the context and its API client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: StorefrontConfig) -> Result<Self, ApiError> {
        let client = CommerceClient::new(&config.api)?;
        Ok(Self {
            inner: Arc::new(StorefrontContextInner { config, client }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn client(&self) -> &CommerceClient {
        &self.inner.client
    }

    /// Access token configured up front, if any.
    #[must_use]
    pub fn access_token(&self) -> Option<AccessToken> {
        self.inner.config.access_token.clone().map(AccessToken::from)
    }

    /// A fresh, empty cart store talking to the commerce API.
    #[must_use]
    pub fn cart_store(&self) -> CartStore {
        CartStore::new(Arc::new(self.inner.client.clone()))
    }

    /// A checkout flow placing orders through the commerce API.
    #[must_use]
    pub fn checkout_flow(&self, payments: Arc<dyn PaymentGateway>) -> CheckoutFlow {
        CheckoutFlow::new(Arc::new(self.inner.client.clone()), payments)
    }
}
