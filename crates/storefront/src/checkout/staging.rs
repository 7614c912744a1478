//! Frozen purchase intents.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;

use kibble_core::{
    CartItemId, CartLineItem, DeliveryCycle, ProductId, ProductImage, ProductRef, PurchaseMode,
};

use crate::cart::{CartTotals, compute_total};

use super::CheckoutError;

/// Stock assumed for a buy-now line; the product page already checked it.
const BUY_NOW_STOCK: u32 = 999;

/// Where a staged checkout came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutSource {
    /// Selected rows of the cart; reconciled after the order.
    Cart,
    /// A single product bought straight from its page.
    BuyNow,
}

/// Items frozen for checkout.
///
/// A copy, not a view: later cart edits do not change what the buyer
/// confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutSelection {
    source: CheckoutSource,
    mode: PurchaseMode,
    items: Vec<CartLineItem>,
}

impl CheckoutSelection {
    /// Freeze the purchasable rows of `mode` among `ids`.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::NothingPurchasable`] if every matching row is
    /// sold out or none match.
    pub fn from_cart(
        items: &[CartLineItem],
        ids: &[CartItemId],
        mode: PurchaseMode,
    ) -> Result<Self, CheckoutError> {
        let staged: Vec<CartLineItem> = items
            .iter()
            .filter(|item| item.purchase_mode == mode)
            .filter(|item| ids.contains(&item.id))
            .filter(|item| !item.is_sold_out())
            .cloned()
            .collect();

        if staged.is_empty() {
            return Err(CheckoutError::NothingPurchasable);
        }

        Ok(Self {
            source: CheckoutSource::Cart,
            mode,
            items: staged,
        })
    }

    /// Stage a single product bought without going through the cart.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::NothingPurchasable`] for a zero quantity.
    pub fn buy_now(request: &BuyNowRequest) -> Result<Self, CheckoutError> {
        if request.quantity == 0 {
            return Err(CheckoutError::NothingPurchasable);
        }

        let now = Utc::now();
        let item = CartLineItem {
            id: CartItemId::new(request.product_id.as_i64()),
            product: ProductRef {
                id: request.product_id,
                name: request.name.clone(),
                price: request.price,
                stock: BUY_NOW_STOCK,
                sold: 0,
                image: request.image.as_ref().map(|path| ProductImage {
                    path: path.clone(),
                    name: String::new(),
                }),
            },
            quantity: request.quantity,
            purchase_mode: request.mode,
            delivery_cycle: request.cycle,
            created_at: Some(now),
            updated_at: Some(now),
        };

        Ok(Self {
            source: CheckoutSource::BuyNow,
            mode: request.mode,
            items: vec![item],
        })
    }

    #[must_use]
    pub const fn source(&self) -> CheckoutSource {
        self.source
    }

    #[must_use]
    pub const fn purchase_mode(&self) -> PurchaseMode {
        self.mode
    }

    #[must_use]
    pub fn items(&self) -> &[CartLineItem] {
        &self.items
    }

    /// IDs of the staged rows.
    #[must_use]
    pub fn ids(&self) -> Vec<CartItemId> {
        self.items.iter().map(|item| item.id).collect()
    }

    /// Totals of the staged lines.
    #[must_use]
    pub fn totals(&self) -> CartTotals {
        compute_total(&self.items, Some(&self.ids()), Some(self.mode))
    }

    /// Sum of quantities over all lines.
    #[must_use]
    pub fn total_quantity(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    /// Delivery cycle shown for a subscription checkout.
    #[must_use]
    pub fn delivery_cycle(&self) -> Option<DeliveryCycle> {
        self.items.first().and_then(CartLineItem::effective_cycle)
    }

    /// Name shown on the payment sheet, e.g. `Salmon Kibble and 2 more`.
    #[must_use]
    pub fn order_name(&self) -> String {
        let Some(first) = self.items.first() else {
            return String::new();
        };
        let mut name = match self.items.len() {
            1 => first.product.name.clone(),
            n => format!("{} and {} more", first.product.name, n - 1),
        };
        if self.mode == PurchaseMode::Subscription {
            name.push_str(" (subscription)");
        }
        name
    }
}

// =============================================================================
// Buy Now
// =============================================================================

/// Product details carried by a buy-now link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuyNowRequest {
    pub product_id: ProductId,
    pub name: String,
    pub price: Decimal,
    pub image: Option<String>,
    pub quantity: u32,
    pub mode: PurchaseMode,
    pub cycle: Option<DeliveryCycle>,
}

impl BuyNowRequest {
    /// Parse a buy-now query string such as
    /// `product_id=7&name=Salmon&price=32000&quantity=2&type=subscription&cycle=4w`.
    ///
    /// `quantity` defaults to 1, a missing price to 0, and any `type` other
    /// than `subscription` means a one-time purchase.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::InvalidBuyNow`] when `product_id` is missing
    /// or a numeric field does not parse.
    pub fn from_query(query: &str) -> Result<Self, CheckoutError> {
        let query = query.strip_prefix('?').unwrap_or(query);
        let params: Vec<(String, String)> = url::form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect();
        let get = |key: &str| {
            params
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.trim())
                .filter(|v| !v.is_empty())
        };

        let product_id = get("product_id")
            .ok_or_else(|| invalid("product_id", "missing"))?
            .parse::<ProductId>()
            .map_err(|e| invalid("product_id", e))?;
        let price = get("price")
            .map(str::parse::<Decimal>)
            .transpose()
            .map_err(|e| invalid("price", e))?
            .unwrap_or(Decimal::ZERO);
        let quantity = get("quantity")
            .map(str::parse::<u32>)
            .transpose()
            .map_err(|e| invalid("quantity", e))?
            .unwrap_or(1);
        let mode = if get("type") == Some(PurchaseMode::Subscription.code()) {
            PurchaseMode::Subscription
        } else {
            PurchaseMode::OneTime
        };
        let cycle = get("cycle")
            .map(str::parse::<DeliveryCycle>)
            .transpose()
            .map_err(|e| invalid("cycle", e))?;

        Ok(Self {
            product_id,
            name: get("name").unwrap_or_default().to_string(),
            price,
            image: get("image").map(str::to_string),
            quantity,
            mode,
            cycle: cycle.filter(|_| mode == PurchaseMode::Subscription),
        })
    }
}

fn invalid(field: &'static str, reason: impl ToString) -> CheckoutError {
    CheckoutError::InvalidBuyNow {
        field,
        reason: reason.to_string(),
    }
}

// =============================================================================
// Consents
// =============================================================================

/// Agreements ticked on the checkout page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Consents {
    pub order: bool,
    pub third_party: bool,
    pub auto_pay: bool,
}

impl Consents {
    /// Every agreement given.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            order: true,
            third_party: true,
            auto_pay: true,
        }
    }

    /// Check the agreements required for `mode`.
    ///
    /// # Errors
    ///
    /// Names the first missing agreement. Auto-pay is only required for
    /// subscriptions.
    pub const fn satisfied_for(&self, mode: PurchaseMode) -> Result<(), CheckoutError> {
        if !self.order {
            return Err(CheckoutError::ConsentMissing("order"));
        }
        if !self.third_party {
            return Err(CheckoutError::ConsentMissing("third_party"));
        }
        if matches!(mode, PurchaseMode::Subscription) && !self.auto_pay {
            return Err(CheckoutError::ConsentMissing("auto_pay"));
        }
        Ok(())
    }
}
