//! Checkout commands.

use std::sync::Arc;

use tracing::info;

use kibble_core::{CartItemId, PurchaseMode, format_won};
use kibble_storefront::api::AccessToken;
use kibble_storefront::checkout::{
    BuyNowRequest, CheckoutAttempt, CheckoutReceipt, CheckoutSelection, Consents, RecordedPayment,
};
use kibble_storefront::error::Result;
use kibble_storefront::state::StorefrontContext;

use super::Output;

/// Buy rows of the cart. Without explicit `ids`, every row of `mode` is
/// bought.
pub async fn from_cart(
    context: &StorefrontContext,
    token: &AccessToken,
    mode: PurchaseMode,
    ids: &[CartItemId],
    transaction: &str,
    consents: &Consents,
    output: Output,
) -> Result<()> {
    let mut store = context.cart_store();
    store.fetch(token).await?;

    let ids: Vec<CartItemId> = if ids.is_empty() {
        store.items_by_mode(mode).iter().map(|item| item.id).collect()
    } else {
        ids.to_vec()
    };
    store.stage_checkout(&ids, mode)?;

    let mut attempt = CheckoutAttempt::from_store(&store)?;
    let flow = context.checkout_flow(Arc::new(RecordedPayment::new(transaction)));
    let receipt = flow.run(&mut attempt, &mut store, token, consents).await?;
    info!(orders = receipt.orders.len(), remaining = store.items().len(), "Cart checkout complete");
    print_receipt(&receipt, attempt.selection(), output)
}

/// Buy a single product without touching the cart.
pub async fn buy_now(
    context: &StorefrontContext,
    token: &AccessToken,
    query: &str,
    transaction: &str,
    consents: &Consents,
    output: Output,
) -> Result<()> {
    let request = BuyNowRequest::from_query(query)?;
    let mut attempt = CheckoutAttempt::new(CheckoutSelection::buy_now(&request)?);

    // Reconciliation is skipped for buy-now, so this store stays empty.
    let mut store = context.cart_store();
    let flow = context.checkout_flow(Arc::new(RecordedPayment::new(transaction)));
    let receipt = flow.run(&mut attempt, &mut store, token, consents).await?;
    info!(orders = receipt.orders.len(), "Buy-now checkout complete");
    print_receipt(&receipt, attempt.selection(), output)
}

fn print_receipt(
    receipt: &CheckoutReceipt,
    selection: &CheckoutSelection,
    output: Output,
) -> Result<()> {
    output.emit(receipt, || {
        let orders: Vec<String> = receipt.orders.iter().map(|o| o.id.to_string()).collect();
        format!(
            "{}: paid {} ({})\nOrders: {}",
            selection.order_name(),
            format_won(receipt.totals.payable()),
            receipt.payment_id,
            orders.join(", "),
        )
    })
}
