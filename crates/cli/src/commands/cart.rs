//! Cart commands.

use serde_json::json;
use tracing::info;

use kibble_core::{CartItemId, DeliveryCycle, ProductId, PurchaseMode};
use kibble_storefront::api::{AccessToken, NewCartItem};
use kibble_storefront::cart::{CartStore, Mutation};
use kibble_storefront::error::{AppError, Result};
use kibble_storefront::state::StorefrontContext;

use super::{Output, format_line, format_totals};

/// Fetch the cart into a fresh store.
async fn load(context: &StorefrontContext, token: &AccessToken) -> Result<CartStore> {
    let mut store = context.cart_store();
    store.fetch(token).await?;
    Ok(store)
}

/// Print the cart, grouped by purchase mode.
pub async fn show(
    context: &StorefrontContext,
    token: &AccessToken,
    mode: Option<PurchaseMode>,
    output: Output,
) -> Result<()> {
    let store = load(context, token).await?;
    render(&store, mode, output)
}

fn render(store: &CartStore, mode: Option<PurchaseMode>, output: Output) -> Result<()> {
    let modes = mode.map_or_else(
        || vec![PurchaseMode::OneTime, PurchaseMode::Subscription],
        |mode| vec![mode],
    );

    let sections: Vec<_> = modes
        .iter()
        .map(|&mode| {
            json!({
                "mode": mode,
                "items": store.items_by_mode(mode),
                "totals": store.totals(None, Some(mode)),
            })
        })
        .collect();

    output.emit(&sections, || {
        let mut text = String::new();
        for &mode in &modes {
            let items = store.items_by_mode(mode);
            text.push_str(&format!("== {mode} ({} rows) ==\n", items.len()));
            for item in items {
                text.push_str(&format_line(item));
                text.push('\n');
            }
            text.push_str(&format_totals(&store.totals(None, Some(mode))));
            text.push('\n');
        }
        text.trim_end().to_string()
    })
}

/// Add a product, then print the refreshed cart.
pub async fn add(
    context: &StorefrontContext,
    token: &AccessToken,
    product_id: ProductId,
    quantity: u32,
    mode: PurchaseMode,
    cycle: Option<DeliveryCycle>,
    output: Output,
) -> Result<()> {
    let mut store = context.cart_store();
    let cycle = match mode {
        PurchaseMode::Subscription => Some(cycle.unwrap_or_default()),
        PurchaseMode::OneTime => None,
    };
    store
        .add_item(
            token,
            &NewCartItem {
                product_id,
                quantity,
                mode,
                cycle,
            },
        )
        .await?;
    info!(%product_id, quantity, "Added to cart");
    render(&store, Some(mode), output)
}

pub async fn set_quantity(
    context: &StorefrontContext,
    token: &AccessToken,
    id: CartItemId,
    quantity: u32,
    output: Output,
) -> Result<()> {
    let mut store = load(context, token).await?;
    let outcome = store.set_quantity(token, id, quantity).await?;
    settle(outcome, output, |quantity| format!("Item {id}: quantity {quantity}"))
}

pub async fn set_cycle(
    context: &StorefrontContext,
    token: &AccessToken,
    id: CartItemId,
    cycle: DeliveryCycle,
    output: Output,
) -> Result<()> {
    let mut store = load(context, token).await?;
    let outcome = store.set_delivery_cycle(token, id, cycle).await?;
    settle(outcome, output, |cycle| {
        format!("Item {id}: delivered {}", cycle.label())
    })
}

/// Print an applied edit, or turn a rejected one into an error.
fn settle<T: serde::Serialize + Copy>(
    outcome: Mutation<T>,
    output: Output,
    text: impl FnOnce(T) -> String,
) -> Result<()> {
    match outcome {
        Mutation::Applied(value) => {
            output.emit(&json!({ "applied": value }), || text(value))
        }
        Mutation::RolledBack { failure, .. } | Mutation::Superseded { failure } => {
            Err(AppError::from(failure))
        }
        Mutation::Discarded => Ok(()),
    }
}

/// Delete rows, then print what is left.
pub async fn remove(
    context: &StorefrontContext,
    token: &AccessToken,
    ids: &[CartItemId],
    output: Output,
) -> Result<()> {
    let mut store = load(context, token).await?;
    match ids {
        [id] => store.delete_item(token, *id).await?,
        _ => store.delete_items(token, ids).await?,
    }
    info!(count = ids.len(), "Removed from cart");
    render(&store, None, output)
}
