//! Wire types for the commerce REST API.
//!
//! Field names follow the API (`_id`, `buyQuantity`, `color`, `size`).
//! These stay private to the `api` module; callers get the domain types from
//! `kibble_core` through [`super::conversions`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use kibble_core::{CartItemId, OrderId, ProductId};

use super::{ApiError, ApiFailure, FieldError};

// =============================================================================
// Response Envelope
// =============================================================================

/// Discriminated response envelope: `ok: 1` carries `item`, `ok: 0` carries
/// `message` and optional field-level `errors`.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub ok: u8,
    pub item: Option<T>,
    pub message: Option<String>,
    pub errors: Option<BTreeMap<String, FieldError>>,
}

impl<T> Envelope<T> {
    /// Unwrap a success envelope that must carry an item.
    pub fn into_item(self) -> Result<T, ApiError> {
        if self.ok == 1 {
            return self
                .item
                .ok_or_else(|| ApiError::Decode("success envelope without item".to_string()));
        }
        Err(ApiError::Remote(self.failure_parts()))
    }

    /// Accept any success envelope, ignoring its item.
    pub fn into_ack(self) -> Result<(), ApiError> {
        if self.ok == 1 {
            Ok(())
        } else {
            Err(ApiError::Remote(self.failure_parts()))
        }
    }

    fn failure_parts(self) -> ApiFailure {
        ApiFailure {
            message: self
                .message
                .unwrap_or_else(|| "The request was rejected.".to_string()),
            errors: self.errors.unwrap_or_default(),
        }
    }
}

// =============================================================================
// Cart Rows
// =============================================================================

/// Product image as embedded in cart rows.
#[derive(Debug, Clone, Deserialize)]
pub struct WireImage {
    pub path: String,
    #[serde(default)]
    pub name: String,
}

/// Product snapshot embedded in a cart row.
#[derive(Debug, Clone, Deserialize)]
pub struct WireCartProduct {
    #[serde(rename = "_id")]
    pub id: ProductId,
    #[serde(default)]
    pub name: String,
    pub price: serde_json::Number,
    #[serde(default)]
    pub quantity: u32,
    #[serde(rename = "buyQuantity", default)]
    pub buy_quantity: u32,
    pub image: Option<WireImage>,
}

/// One cart row as returned by `GET /carts`.
#[derive(Debug, Clone, Deserialize)]
pub struct WireCartItem {
    #[serde(rename = "_id")]
    pub id: CartItemId,
    pub quantity: u32,
    pub product: WireCartProduct,
    #[serde(default)]
    pub color: String,
    pub size: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: Option<String>,
    #[serde(rename = "updatedAt")]
    pub updated_at: Option<String>,
}

// =============================================================================
// Request Bodies
// =============================================================================

/// Body of `POST /carts`.
#[derive(Debug, Serialize)]
pub struct AddCartItemBody<'a> {
    pub product_id: ProductId,
    pub quantity: u32,
    pub color: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<&'a str>,
}

/// Body of `PATCH /carts/{id}`.
#[derive(Debug, Serialize)]
pub struct UpdateCartItemBody<'a> {
    pub quantity: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<&'a str>,
}

/// Body of bulk `DELETE /carts`.
#[derive(Debug, Serialize)]
pub struct DeleteCartItemsBody<'a> {
    pub carts: &'a [CartItemId],
}

/// One product line of `POST /orders`.
#[derive(Debug, Serialize)]
pub struct WireOrderProduct<'a> {
    #[serde(rename = "_id")]
    pub id: ProductId,
    pub quantity: u32,
    pub size: &'a str,
    pub color: &'a str,
}

/// Body of `POST /orders`.
#[derive(Debug, Serialize)]
pub struct CreateOrderBody<'a> {
    pub products: Vec<WireOrderProduct<'a>>,
}

// =============================================================================
// Orders
// =============================================================================

/// Discount breakdown of an order.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireOrderDiscount {
    #[serde(default)]
    pub products: Option<serde_json::Number>,
    #[serde(rename = "shippingFees", default)]
    pub shipping_fees: Option<serde_json::Number>,
}

/// Cost breakdown of an order.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireOrderCost {
    #[serde(default)]
    pub products: Option<serde_json::Number>,
    #[serde(rename = "shippingFees", default)]
    pub shipping_fees: Option<serde_json::Number>,
    #[serde(default)]
    pub discount: WireOrderDiscount,
    #[serde(default)]
    pub total: Option<serde_json::Number>,
}

/// Order record returned by `POST /orders`.
#[derive(Debug, Clone, Deserialize)]
pub struct WireOrder {
    #[serde(rename = "_id")]
    pub id: OrderId,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub cost: WireOrderCost,
    #[serde(rename = "createdAt")]
    pub created_at: Option<String>,
}
