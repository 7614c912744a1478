//! `reqwest` implementation of the gateway traits.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::de::{DeserializeOwned, IgnoredAny};
use tracing::{debug, instrument};

use kibble_core::{CartItemId, CartLineItem};

use crate::config::ApiConfig;

use super::conversions::{convert_cart, convert_order};
use super::wire::{
    AddCartItemBody, CreateOrderBody, DeleteCartItemsBody, Envelope, UpdateCartItemBody,
    WireCartItem, WireOrder, WireOrderProduct,
};
use super::{
    AccessToken, ApiError, CartGateway, CartItemUpdate, NewCartItem, OrderGateway, OrderLine,
    PlacedOrder,
};

/// Header carrying the storefront's registered client ID.
const CLIENT_ID_HEADER: &str = "Client-Id";

/// Client for the commerce REST API.
///
/// Cheap to clone; all clones share one connection pool.
#[derive(Clone)]
pub struct CommerceClient {
    inner: Arc<CommerceClientInner>,
}

struct CommerceClientInner {
    client: reqwest::Client,
    base_url: String,
}

impl CommerceClient {
    /// Create a new commerce API client.
    ///
    /// # Errors
    ///
    /// Returns error if the client ID is not a valid header value or the
    /// HTTP client fails to build.
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            CLIENT_ID_HEADER,
            HeaderValue::from_str(&config.client_id)
                .map_err(|e| ApiError::Decode(format!("Invalid client ID format: {e}")))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(CommerceClientInner {
                client,
                base_url: config.base_url.as_str().trim_end_matches('/').to_string(),
            }),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.inner.base_url)
    }

    /// Send a request and decode the response envelope.
    ///
    /// The API reports business failures inside the envelope even on 4xx
    /// statuses, so the body is decoded before the status is considered.
    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        token: &AccessToken,
    ) -> Result<Envelope<T>, ApiError> {
        let response = request.bearer_auth(token.expose()).send().await?;
        let status = response.status();
        let body = response.text().await?;

        match serde_json::from_str::<Envelope<T>>(&body) {
            Ok(envelope) => Ok(envelope),
            Err(e) => {
                tracing::error!(
                    status = %status,
                    error = %e,
                    body = %body.chars().take(500).collect::<String>(),
                    "Failed to decode commerce API response"
                );
                Err(ApiError::Decode(format!("HTTP {status}: {e}")))
            }
        }
    }
}

#[async_trait]
impl CartGateway for CommerceClient {
    #[instrument(skip_all)]
    async fn list_cart(&self, token: &AccessToken) -> Result<Vec<CartLineItem>, ApiError> {
        let request = self.inner.client.get(self.url("/carts"));
        let items = self
            .send::<Vec<WireCartItem>>(request, token)
            .await?
            .into_item()?;
        debug!(count = items.len(), "Fetched cart rows");
        convert_cart(items)
    }

    #[instrument(skip(self, token), fields(product_id = %item.product_id))]
    async fn add_cart_item(
        &self,
        token: &AccessToken,
        item: &NewCartItem,
    ) -> Result<(), ApiError> {
        let body = AddCartItemBody {
            product_id: item.product_id,
            quantity: item.quantity,
            color: item.mode.code(),
            size: item.cycle.map(kibble_core::DeliveryCycle::code),
        };
        let request = self.inner.client.post(self.url("/carts")).json(&body);
        self.send::<IgnoredAny>(request, token).await?.into_ack()
    }

    #[instrument(skip(self, token, update), fields(quantity = update.quantity))]
    async fn update_cart_item(
        &self,
        token: &AccessToken,
        id: CartItemId,
        update: &CartItemUpdate,
    ) -> Result<(), ApiError> {
        let body = UpdateCartItemBody {
            quantity: update.quantity,
            size: update.cycle.map(kibble_core::DeliveryCycle::code),
        };
        let request = self
            .inner
            .client
            .patch(self.url(&format!("/carts/{id}")))
            .json(&body);
        self.send::<IgnoredAny>(request, token).await?.into_ack()
    }

    #[instrument(skip(self, token))]
    async fn delete_cart_item(&self, token: &AccessToken, id: CartItemId) -> Result<(), ApiError> {
        let request = self.inner.client.delete(self.url(&format!("/carts/{id}")));
        self.send::<IgnoredAny>(request, token).await?.into_ack()
    }

    #[instrument(skip(self, token), fields(count = ids.len()))]
    async fn delete_cart_items(
        &self,
        token: &AccessToken,
        ids: &[CartItemId],
    ) -> Result<(), ApiError> {
        let body = DeleteCartItemsBody { carts: ids };
        let request = self.inner.client.delete(self.url("/carts")).json(&body);
        self.send::<IgnoredAny>(request, token).await?.into_ack()
    }
}

#[async_trait]
impl OrderGateway for CommerceClient {
    #[instrument(skip(self, token, lines), fields(lines = lines.len()))]
    async fn create_order(
        &self,
        token: &AccessToken,
        lines: &[OrderLine],
    ) -> Result<PlacedOrder, ApiError> {
        let body = CreateOrderBody {
            products: lines
                .iter()
                .map(|line| WireOrderProduct {
                    id: line.product_id,
                    quantity: line.quantity,
                    size: line.cycle.map_or("", kibble_core::DeliveryCycle::code),
                    color: line.mode.code(),
                })
                .collect(),
        };
        let request = self.inner.client.post(self.url("/orders")).json(&body);
        let order = self.send::<WireOrder>(request, token).await?.into_item()?;
        convert_order(order)
    }
}
