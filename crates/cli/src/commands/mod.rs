//! Command implementations.

pub mod cart;
pub mod checkout;

use serde::Serialize;

use kibble_core::{CartLineItem, format_won};
use kibble_storefront::cart::CartTotals;
use kibble_storefront::error::Result;

/// How command results are printed.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    json: bool,
}

impl Output {
    pub const fn new(json: bool) -> Self {
        Self { json }
    }

    /// Print `value` as JSON, or `text` otherwise.
    #[allow(clippy::print_stdout)]
    pub fn emit<T: Serialize>(self, value: &T, text: impl FnOnce() -> String) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            println!("{}", text());
        }
        Ok(())
    }
}

/// One cart row as a text line.
pub fn format_line(item: &CartLineItem) -> String {
    let mut line = format!(
        "#{:<6} {:<32} x{:<3} {:>12}",
        item.id,
        item.product.name,
        item.quantity,
        format_won(item.line_total()),
    );
    if let Some(cycle) = item.effective_cycle() {
        line.push_str(&format!("  subscription, {}", cycle.label()));
    }
    if item.is_sold_out() {
        line.push_str("  [sold out]");
    }
    line
}

/// Totals block as text.
pub fn format_totals(totals: &CartTotals) -> String {
    format!(
        "Products {}  Shipping {}  Discount -{}  Payable {}  ({} available)",
        format_won(totals.products_price),
        format_won(totals.shipping_fees),
        format_won(totals.discount),
        format_won(totals.payable()),
        totals.available_count,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use kibble_core::{CartItemId, DeliveryCycle, ProductId, ProductRef, PurchaseMode};
    use kibble_storefront::cart::compute_total;
    use rust_decimal::Decimal;

    fn subscription_line(sold_out: bool) -> CartLineItem {
        CartLineItem {
            id: CartItemId::new(12),
            product: ProductRef {
                id: ProductId::new(7),
                name: "Salmon Kibble".to_string(),
                price: Decimal::new(10_000, 0),
                stock: 5,
                sold: if sold_out { 5 } else { 0 },
                image: None,
            },
            quantity: 2,
            purchase_mode: PurchaseMode::Subscription,
            delivery_cycle: Some(DeliveryCycle::Monthly),
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_format_line() {
        let line = format_line(&subscription_line(false));
        assert!(line.starts_with("#12"));
        assert!(line.contains("20,000원"));
        assert!(line.contains("every 4 weeks"));
        assert!(!line.contains("sold out"));
        assert!(format_line(&subscription_line(true)).ends_with("[sold out]"));
    }

    #[test]
    fn test_format_totals() {
        let items = vec![subscription_line(false)];
        let totals = compute_total(&items, None, Some(PurchaseMode::Subscription));
        assert_eq!(
            format_totals(&totals),
            "Products 20,000원  Shipping 0원  Discount -2,000원  Payable 18,000원  (1 available)"
        );
    }
}
