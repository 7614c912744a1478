//! Cart store behavior against an in-memory remote cart.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::Arc;

use rust_decimal::Decimal;

use kibble_core::{CartItemId, DeliveryCycle, ProductId, PurchaseMode};
use kibble_integration_tests::{
    CartCall, FakeCartGateway, line_item, sold_out, token, with_cycle,
};
use kibble_storefront::api::{CartGateway, NewCartItem, messages};
use kibble_storefront::cart::{CartError, CartStore, Mutation, Selection, compute_total};

async fn loaded(gateway: &Arc<FakeCartGateway>) -> CartStore {
    let mut store = CartStore::new(Arc::clone(gateway) as Arc<dyn CartGateway>);
    store.fetch(&token()).await.unwrap();
    store
}

#[tokio::test]
async fn test_fetch_replaces_snapshot() {
    let gateway = Arc::new(FakeCartGateway::with_items(vec![
        line_item(1, PurchaseMode::OneTime, 5_000, 1),
        with_cycle(
            line_item(2, PurchaseMode::Subscription, 8_000, 2),
            DeliveryCycle::Monthly,
        ),
        line_item(3, PurchaseMode::Subscription, 9_000, 1),
    ]));
    let store = loaded(&gateway).await;

    assert_eq!(store.items().len(), 3);
    assert!(!store.is_loading());
    assert!(store.last_error().is_none());
    assert_eq!(
        store.delivery_cycle(CartItemId::new(2)),
        Some(DeliveryCycle::Monthly)
    );
    assert_eq!(
        store.delivery_cycle(CartItemId::new(3)),
        Some(DeliveryCycle::Biweekly)
    );
    assert_eq!(store.delivery_cycle(CartItemId::new(1)), None);
}

#[tokio::test]
async fn test_delivery_cycle_lookup_matches_embedded_field() {
    let gateway = Arc::new(FakeCartGateway::with_items(vec![
        with_cycle(
            line_item(1, PurchaseMode::Subscription, 8_000, 1),
            DeliveryCycle::Monthly,
        ),
        line_item(2, PurchaseMode::Subscription, 8_000, 1),
    ]));
    let mut store = loaded(&gateway).await;
    store
        .set_delivery_cycle(&token(), CartItemId::new(2), DeliveryCycle::Monthly)
        .await
        .unwrap();

    for item in store.items_by_mode(PurchaseMode::Subscription) {
        assert_eq!(
            store.delivery_cycle(item.id),
            Some(item.delivery_cycle.unwrap_or_default())
        );
    }
}

#[tokio::test]
async fn test_failed_fetch_keeps_items_and_records_generic_error() {
    let gateway = Arc::new(FakeCartGateway::with_items(vec![line_item(
        1,
        PurchaseMode::OneTime,
        5_000,
        1,
    )]));
    let mut store = loaded(&gateway).await;
    gateway.fail_list();

    let failure = store.fetch(&token()).await.unwrap_err();
    assert_eq!(failure.message, messages::FETCH_FAILED);
    assert_eq!(store.items().len(), 1);
    assert!(!store.is_loading());
    assert_eq!(store.last_error(), Some(&failure));
}

#[tokio::test]
async fn test_rejected_quantity_update_rolls_back() {
    let gateway = Arc::new(FakeCartGateway::with_items(vec![line_item(
        1,
        PurchaseMode::OneTime,
        5_000,
        2,
    )]));
    let mut store = loaded(&gateway).await;
    let before = store.items().to_vec();
    gateway.reject_updates("Not enough stock");

    let outcome = store
        .set_quantity(&token(), CartItemId::new(1), 40)
        .await
        .unwrap();

    match outcome {
        Mutation::RolledBack { previous, failure } => {
            assert_eq!(previous, 2);
            assert_eq!(failure.message, "Not enough stock");
        }
        other => panic!("expected rollback, got {other:?}"),
    }
    assert_eq!(store.items(), before.as_slice());
    assert_eq!(store.last_error().unwrap().message, "Not enough stock");
}

#[tokio::test]
async fn test_accepted_quantity_update_stands() {
    let gateway = Arc::new(FakeCartGateway::with_items(vec![line_item(
        1,
        PurchaseMode::OneTime,
        5_000,
        2,
    )]));
    let mut store = loaded(&gateway).await;

    let outcome = store
        .set_quantity(&token(), CartItemId::new(1), 4)
        .await
        .unwrap();
    assert_eq!(outcome, Mutation::Applied(4));
    assert_eq!(store.item(CartItemId::new(1)).unwrap().quantity, 4);
    assert_eq!(gateway.server_items()[0].quantity, 4);

    let writes = gateway.writes();
    let CartCall::Update(id, update) = &writes[0] else {
        panic!("expected an update call, got {writes:?}");
    };
    assert_eq!(*id, CartItemId::new(1));
    assert_eq!(update.cycle, None);
}

#[tokio::test]
async fn test_set_quantity_on_sold_out_item_is_a_no_op() {
    let gateway = Arc::new(FakeCartGateway::with_items(vec![
        sold_out(line_item(1, PurchaseMode::OneTime, 5_000, 2)),
        line_item(2, PurchaseMode::OneTime, 5_000, 1),
    ]));
    let mut store = loaded(&gateway).await;
    let before = store.items().to_vec();

    let err = store
        .set_quantity(&token(), CartItemId::new(1), 3)
        .await
        .unwrap_err();

    assert_eq!(err, CartError::SoldOut(CartItemId::new(1)));
    assert_eq!(store.items(), before.as_slice());
    assert!(store.last_error().is_none());
    assert!(gateway.writes().is_empty());
}

#[tokio::test]
async fn test_cycle_update_sends_quantity_and_size() {
    let gateway = Arc::new(FakeCartGateway::with_items(vec![line_item(
        4,
        PurchaseMode::Subscription,
        12_000,
        3,
    )]));
    let mut store = loaded(&gateway).await;

    let outcome = store
        .set_delivery_cycle(&token(), CartItemId::new(4), DeliveryCycle::Monthly)
        .await
        .unwrap();
    assert_eq!(outcome, Mutation::Applied(DeliveryCycle::Monthly));

    let writes = gateway.writes();
    let CartCall::Update(_, update) = &writes[0] else {
        panic!("expected an update call, got {writes:?}");
    };
    assert_eq!(update.quantity, 3);
    assert_eq!(update.cycle, Some(DeliveryCycle::Monthly));
}

#[tokio::test]
async fn test_rejected_cycle_update_rolls_back() {
    let gateway = Arc::new(FakeCartGateway::with_items(vec![with_cycle(
        line_item(4, PurchaseMode::Subscription, 12_000, 3),
        DeliveryCycle::Monthly,
    )]));
    let mut store = loaded(&gateway).await;
    gateway.reject_updates("Subscription locked");

    let outcome = store
        .set_delivery_cycle(&token(), CartItemId::new(4), DeliveryCycle::Biweekly)
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        Mutation::RolledBack {
            previous: DeliveryCycle::Monthly,
            ..
        }
    ));
    assert_eq!(
        store.delivery_cycle(CartItemId::new(4)),
        Some(DeliveryCycle::Monthly)
    );
}

#[tokio::test]
async fn test_interleaved_rejections_end_on_the_server_value() {
    let gateway = Arc::new(FakeCartGateway::with_items(vec![line_item(
        1,
        PurchaseMode::OneTime,
        5_000,
        1,
    )]));
    let mut store = loaded(&gateway).await;
    let id = CartItemId::new(1);

    let first = store.begin_set_quantity(id, 2).unwrap();
    let second = store.begin_set_quantity(id, 3).unwrap();

    gateway.reject_updates("Too many requests");
    let first_result = gateway
        .update_cart_item(&token(), id, first.request())
        .await;
    let outcome = store.complete(first, first_result);
    assert!(matches!(outcome, Mutation::Superseded { .. }));
    assert_eq!(store.item(id).unwrap().quantity, 3);

    let second_result = gateway
        .update_cart_item(&token(), id, second.request())
        .await;
    let outcome = store.complete(second, second_result);
    assert!(matches!(outcome, Mutation::RolledBack { previous: 1, .. }));
    assert_eq!(store.item(id).unwrap().quantity, 1);
    assert_eq!(store.item(id), gateway.server_items().first());
}

#[tokio::test]
async fn test_rejected_quantity_and_cycle_edits_on_one_row_both_roll_back() {
    let gateway = Arc::new(FakeCartGateway::with_items(vec![line_item(
        1,
        PurchaseMode::Subscription,
        10_000,
        2,
    )]));
    let mut store = loaded(&gateway).await;
    let id = CartItemId::new(1);

    let quantity = store.begin_set_quantity(id, 9).unwrap();
    let cycle = store
        .begin_set_delivery_cycle(id, DeliveryCycle::Monthly)
        .unwrap();

    gateway.reject_updates("Not enough stock");
    let quantity_result = gateway
        .update_cart_item(&token(), id, quantity.request())
        .await;
    let cycle_result = gateway.update_cart_item(&token(), id, cycle.request()).await;

    assert!(matches!(
        store.complete(quantity, quantity_result),
        Mutation::RolledBack { previous: 2, .. }
    ));
    assert!(matches!(
        store.complete(cycle, cycle_result),
        Mutation::RolledBack {
            previous: DeliveryCycle::Biweekly,
            ..
        }
    ));

    let item = store.item(id).unwrap();
    assert_eq!(item.quantity, 2);
    assert_eq!(item.delivery_cycle, None);
    assert_eq!(store.delivery_cycle(id), Some(DeliveryCycle::Biweekly));
    assert_eq!(store.totals(None, None).products_price, Decimal::new(20_000, 0));
}

#[tokio::test]
async fn test_completion_after_logout_is_ignored() {
    let gateway = Arc::new(FakeCartGateway::with_items(vec![line_item(
        1,
        PurchaseMode::OneTime,
        5_000,
        1,
    )]));
    let mut store = loaded(&gateway).await;
    let pending = store.begin_set_quantity(CartItemId::new(1), 9).unwrap();

    store.reset();
    gateway.reject_updates("Session expired");
    let result = gateway
        .update_cart_item(&token(), CartItemId::new(1), pending.request())
        .await;

    assert_eq!(store.complete(pending, result), Mutation::Discarded);
    assert!(store.items().is_empty());
    assert!(store.last_error().is_none());
}

#[tokio::test]
async fn test_delete_item_removes_only_after_remote_success() {
    let gateway = Arc::new(FakeCartGateway::with_items(vec![
        line_item(1, PurchaseMode::OneTime, 5_000, 1),
        line_item(2, PurchaseMode::OneTime, 5_000, 1),
    ]));
    let mut store = loaded(&gateway).await;

    gateway.reject_deletes("Try again later");
    let failure = store
        .delete_item(&token(), CartItemId::new(1))
        .await
        .unwrap_err();
    assert_eq!(failure.message, "Try again later");
    assert_eq!(store.items().len(), 2);

    let gateway = Arc::new(FakeCartGateway::with_items(gateway.server_items()));
    let mut store = loaded(&gateway).await;
    store
        .delete_items(&token(), &[CartItemId::new(1), CartItemId::new(2)])
        .await
        .unwrap();
    assert!(store.items().is_empty());
    assert!(gateway.server_items().is_empty());
}

#[tokio::test]
async fn test_add_item_refetches() {
    let gateway = Arc::new(FakeCartGateway::with_items(vec![line_item(
        1,
        PurchaseMode::OneTime,
        5_000,
        1,
    )]));
    let mut store = loaded(&gateway).await;

    let items = store
        .add_item(
            &token(),
            &NewCartItem {
                product_id: ProductId::new(77),
                quantity: 2,
                mode: PurchaseMode::Subscription,
                cycle: Some(DeliveryCycle::Monthly),
            },
        )
        .await
        .unwrap();
    assert_eq!(items.len(), 2);

    let added = store.items_by_mode(PurchaseMode::Subscription)[0].clone();
    assert_eq!(added.product.id, ProductId::new(77));
    assert_eq!(store.delivery_cycle(added.id), Some(DeliveryCycle::Monthly));
    assert_eq!(gateway.calls().last(), Some(&CartCall::List));
}

#[tokio::test]
async fn test_pricing_scenarios() {
    let gateway = Arc::new(FakeCartGateway::with_items(vec![
        line_item(1, PurchaseMode::Subscription, 10_000, 2),
        sold_out(line_item(2, PurchaseMode::OneTime, 77_777, 9)),
        line_item(3, PurchaseMode::OneTime, 5_000, 3),
    ]));
    let store = loaded(&gateway).await;

    let subscription = store.totals(None, Some(PurchaseMode::Subscription));
    assert_eq!(subscription.products_price, Decimal::new(20_000, 0));
    assert_eq!(subscription.discount, Decimal::new(2_000, 0));
    assert_eq!(subscription.total_price, Decimal::new(20_000, 0));
    assert_eq!(subscription.payable(), Decimal::new(18_000, 0));

    let one_time = store.totals(None, Some(PurchaseMode::OneTime));
    assert_eq!(one_time.products_price, Decimal::new(15_000, 0));
    assert_eq!(one_time.discount, Decimal::ZERO);
    assert_eq!(one_time.available_count, 1);

    let ids = [CartItemId::new(2), CartItemId::new(3)];
    let selected = store.totals(Some(&ids), Some(PurchaseMode::OneTime));
    assert_eq!(selected.select_count, 1);
    assert_eq!(
        selected,
        compute_total(store.items(), Some(&ids), Some(PurchaseMode::OneTime))
    );
}

#[tokio::test]
async fn test_selection_resets_when_listing_shrinks() {
    let gateway = Arc::new(FakeCartGateway::with_items(vec![
        line_item(1, PurchaseMode::OneTime, 5_000, 1),
        line_item(2, PurchaseMode::OneTime, 5_000, 1),
    ]));
    let mut store = loaded(&gateway).await;

    let mut selection = Selection::new();
    let listing: Vec<CartItemId> = store
        .items_by_mode(PurchaseMode::OneTime)
        .iter()
        .map(|item| item.id)
        .collect();
    selection.sync(listing.len());
    selection.toggle_all(&listing);
    assert!(selection.is_all_selected(listing.len()));

    store
        .delete_item(&token(), CartItemId::new(1))
        .await
        .unwrap();
    assert!(selection.sync(store.items_by_mode(PurchaseMode::OneTime).len()));
    assert!(selection.is_empty());
}
