//! Conversions from wire types to `kibble_core` domain types.

use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use tracing::warn;

use kibble_core::{CartLineItem, DeliveryCycle, ProductImage, ProductRef, PurchaseMode};

use super::wire::{WireCartItem, WireOrder};
use super::{ApiError, PlacedOrder};

/// Timestamp layouts seen from the commerce API besides RFC 3339.
const TIMESTAMP_FORMATS: &[&str] = &["%Y.%m.%d %H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// Convert a JSON number to an exact decimal.
pub fn convert_amount(number: &serde_json::Number) -> Result<Decimal, ApiError> {
    let text = number.to_string();
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|e| ApiError::Decode(format!("invalid amount {text}: {e}")))
}

/// Parse an API timestamp, returning `None` for unknown layouts.
pub fn convert_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

/// Decode the `size` field. Empty or unknown codes mean "no cycle stored".
fn convert_cycle(size: Option<&str>) -> Option<DeliveryCycle> {
    let size = size?.trim();
    if size.is_empty() {
        return None;
    }
    match DeliveryCycle::from_str(size) {
        Ok(cycle) => Some(cycle),
        Err(e) => {
            warn!(error = %e, "Ignoring unknown delivery cycle");
            None
        }
    }
}

/// Convert one cart row.
pub fn convert_cart_item(item: WireCartItem) -> Result<CartLineItem, ApiError> {
    let price = convert_amount(&item.product.price)?;
    let purchase_mode = PurchaseMode::from_wire(&item.color);

    Ok(CartLineItem {
        id: item.id,
        product: ProductRef {
            id: item.product.id,
            name: item.product.name,
            price,
            stock: item.product.quantity,
            sold: item.product.buy_quantity,
            image: item.product.image.map(|img| ProductImage {
                path: img.path,
                name: img.name,
            }),
        },
        quantity: item.quantity,
        purchase_mode,
        delivery_cycle: convert_cycle(item.size.as_deref()),
        created_at: convert_timestamp(item.created_at.as_deref()),
        updated_at: convert_timestamp(item.updated_at.as_deref()),
    })
}

/// Convert a full cart listing, keeping the API's order.
pub fn convert_cart(items: Vec<WireCartItem>) -> Result<Vec<CartLineItem>, ApiError> {
    items.into_iter().map(convert_cart_item).collect()
}

/// Convert an order record.
pub fn convert_order(order: WireOrder) -> Result<PlacedOrder, ApiError> {
    let total = order.cost.total.as_ref().map(convert_amount).transpose()?;
    let discount = order
        .cost
        .discount
        .products
        .as_ref()
        .map(convert_amount)
        .transpose()?;

    Ok(PlacedOrder {
        id: order.id,
        state: order.state,
        total,
        discount,
        created_at: convert_timestamp(order.created_at.as_deref()),
    })
}
