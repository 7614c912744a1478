//! Cart line items and the enums that partition them.
//!
//! A [`CartLineItem`] is one row of a user's cart as last reported by the
//! commerce API. The embedded [`ProductRef`] is a read-only copy of catalog
//! state at fetch time; stock counts are never adjusted locally.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::id::{CartItemId, ProductId};

/// Error returned when a wire code does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} code: {code:?}")]
pub struct ParseCodeError {
    kind: &'static str,
    code: String,
}

// =============================================================================
// Purchase Mode
// =============================================================================

/// How a cart line will be purchased.
///
/// The commerce API stores this in the cart row's `color` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PurchaseMode {
    /// Single purchase.
    OneTime,
    /// Recurring delivery with the subscription discount.
    Subscription,
}

impl PurchaseMode {
    /// Wire code used by the commerce API.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::OneTime => "oneTime",
            Self::Subscription => "subscription",
        }
    }

    /// Decode the lenient wire form: anything but `subscription` is one-time.
    #[must_use]
    pub fn from_wire(code: &str) -> Self {
        if code == "subscription" {
            Self::Subscription
        } else {
            Self::OneTime
        }
    }
}

impl fmt::Display for PurchaseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for PurchaseMode {
    type Err = ParseCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "oneTime" | "one-time" | "onetime" => Ok(Self::OneTime),
            "subscription" => Ok(Self::Subscription),
            other => Err(ParseCodeError {
                kind: "purchase mode",
                code: other.to_string(),
            }),
        }
    }
}

// =============================================================================
// Delivery Cycle
// =============================================================================

/// Delivery interval of a subscription line.
///
/// The commerce API stores this in the cart row's `size` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DeliveryCycle {
    /// Every two weeks.
    #[default]
    #[serde(rename = "2w")]
    Biweekly,
    /// Every four weeks.
    #[serde(rename = "4w")]
    Monthly,
}

impl DeliveryCycle {
    /// Wire code used by the commerce API.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Biweekly => "2w",
            Self::Monthly => "4w",
        }
    }

    /// Human readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Biweekly => "every 2 weeks",
            Self::Monthly => "every 4 weeks",
        }
    }
}

impl fmt::Display for DeliveryCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for DeliveryCycle {
    type Err = ParseCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "2w" | "biweekly" => Ok(Self::Biweekly),
            "4w" | "monthly" => Ok(Self::Monthly),
            other => Err(ParseCodeError {
                kind: "delivery cycle",
                code: other.to_string(),
            }),
        }
    }
}

// =============================================================================
// Product Snapshot
// =============================================================================

/// Product image reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductImage {
    /// Path or URL of the image.
    pub path: String,
    /// Original file name.
    #[serde(default)]
    pub name: String,
}

/// Denormalized product data embedded in a cart row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRef {
    /// Catalog product ID.
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Unit price in won.
    pub price: Decimal,
    /// Units ever stocked.
    pub stock: u32,
    /// Units sold so far.
    pub sold: u32,
    /// Display image.
    pub image: Option<ProductImage>,
}

impl ProductRef {
    /// A product is sold out when every stocked unit has been sold.
    #[must_use]
    pub const fn is_sold_out(&self) -> bool {
        self.stock == self.sold
    }
}

// =============================================================================
// Cart Line Item
// =============================================================================

/// One row in a user's cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLineItem {
    /// Cart row ID, stable across fetches.
    pub id: CartItemId,
    /// Product snapshot at fetch time.
    pub product: ProductRef,
    /// Requested units.
    pub quantity: u32,
    /// One-time or subscription.
    pub purchase_mode: PurchaseMode,
    /// Delivery interval; only meaningful for subscriptions.
    pub delivery_cycle: Option<DeliveryCycle>,
    /// When the row was first added.
    pub created_at: Option<DateTime<Utc>>,
    /// When the row was last changed server-side.
    pub updated_at: Option<DateTime<Utc>>,
}

impl CartLineItem {
    /// Whether the embedded product is sold out.
    #[must_use]
    pub const fn is_sold_out(&self) -> bool {
        self.product.is_sold_out()
    }

    /// Whether this line is a subscription.
    #[must_use]
    pub fn is_subscription(&self) -> bool {
        self.purchase_mode == PurchaseMode::Subscription
    }

    /// Effective delivery cycle.
    ///
    /// `None` for one-time lines; subscriptions without a stored cycle
    /// default to [`DeliveryCycle::Biweekly`].
    #[must_use]
    pub fn effective_cycle(&self) -> Option<DeliveryCycle> {
        self.is_subscription()
            .then(|| self.delivery_cycle.unwrap_or_default())
    }

    /// Unit price times quantity, ignoring sold-out status.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.product.price * Decimal::from(self.quantity)
    }
}
