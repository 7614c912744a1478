//! Cart totals.
//!
//! [`compute_total`] is a pure function of the items it is given: calling it
//! twice on an unchanged snapshot yields identical results. Sold-out rows
//! never contribute money or counts.

use rust_decimal::Decimal;
use serde::Serialize;

use kibble_core::{CartItemId, CartLineItem, PurchaseMode};

/// Flat discount applied to subscription subtotals (10%).
pub const SUBSCRIPTION_DISCOUNT_RATE: Decimal = Decimal::from_parts(10, 0, 0, false, 2);

/// Money amounts and counts for a subset of the cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CartTotals {
    /// Sum of `price * quantity` over purchasable rows.
    pub products_price: Decimal,
    /// Shipping is free under the standing promotion.
    pub shipping_fees: Decimal,
    /// Subscription discount; zero for one-time purchases.
    pub discount: Decimal,
    /// Pre-discount total. Shown crossed out next to [`Self::payable`].
    pub total_price: Decimal,
    /// Purchasable rows in the mode-filtered set, ignoring selection.
    pub available_count: usize,
    /// Purchasable rows within the explicit selection; zero without one.
    pub select_count: usize,
}

impl CartTotals {
    /// Amount actually charged.
    #[must_use]
    pub fn payable(&self) -> Decimal {
        self.total_price - self.discount
    }
}

/// Compute totals for `items`.
///
/// - `mode` restricts to one purchase mode and decides whether the
///   subscription discount applies.
/// - `ids`, when given, restricts money and `select_count` to those rows;
///   otherwise the whole mode-filtered set is priced.
#[must_use]
pub fn compute_total(
    items: &[CartLineItem],
    ids: Option<&[CartItemId]>,
    mode: Option<PurchaseMode>,
) -> CartTotals {
    let in_mode = |item: &&CartLineItem| mode.is_none_or(|m| item.purchase_mode == m);

    let available_count = items
        .iter()
        .filter(in_mode)
        .filter(|item| !item.is_sold_out())
        .count();

    let priced: Vec<&CartLineItem> = items
        .iter()
        .filter(in_mode)
        .filter(|item| ids.is_none_or(|ids| ids.contains(&item.id)))
        .filter(|item| !item.is_sold_out())
        .collect();

    let products_price: Decimal = priced.iter().map(|item| item.line_total()).sum();
    let discount = if mode == Some(PurchaseMode::Subscription) {
        (products_price * SUBSCRIPTION_DISCOUNT_RATE).normalize()
    } else {
        Decimal::ZERO
    };

    CartTotals {
        products_price,
        shipping_fees: Decimal::ZERO,
        discount,
        total_price: products_price,
        available_count,
        select_count: if ids.is_some() { priced.len() } else { 0 },
    }
}
