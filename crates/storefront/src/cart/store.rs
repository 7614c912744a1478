//! Cart snapshot store.
//!
//! The store is the single mutation surface for the local cart snapshot.
//! Quantity and delivery-cycle edits are optimistic: `begin_*` applies the
//! new value immediately and hands back a [`PendingUpdate`] ticket, and
//! [`CartStore::complete`] settles the ticket once the remote call resolves.
//! `set_quantity` and `set_delivery_cycle` combine both halves.
//!
//! Every edited field of a row (quantity, delivery cycle) tracks its own
//! in-flight state: the latest revision and the last value the server is
//! known to hold. Only the latest ticket for a field rolls back, and it rolls
//! back to that confirmed value, so a slow failure never clobbers a newer
//! optimistic edit and a chain of rejected edits never leaves a rejected
//! value behind. [`CartStore::reset`] advances an epoch, and tickets from an
//! older epoch are discarded on completion.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, instrument, warn};

use kibble_core::{CartItemId, CartLineItem, DeliveryCycle, PurchaseMode};

use crate::api::{AccessToken, ApiError, CartGateway, CartItemUpdate, NewCartItem, messages};
use crate::checkout::{CheckoutError, CheckoutSelection};

use super::pricing::{CartTotals, compute_total};
use super::selection::items_by_mode;
use super::{CartError, CartFailure, Mutation};

/// Ticket for an in-flight fetch.
#[derive(Debug)]
#[must_use = "a pending fetch must be completed"]
pub struct PendingFetch {
    epoch: u64,
}

/// Ticket for an optimistic edit whose remote call has not resolved yet.
#[derive(Debug)]
#[must_use = "a pending update must be completed"]
pub struct PendingUpdate<T> {
    id: CartItemId,
    epoch: u64,
    revision: u64,
    next: T,
    applied: Restore,
    read: fn(&CartLineItem) -> T,
    request: CartItemUpdate,
}

impl<T> PendingUpdate<T> {
    /// Cart row being edited.
    #[must_use]
    pub const fn id(&self) -> CartItemId {
        self.id
    }

    /// Body of the remote update to issue for this edit.
    #[must_use]
    pub const fn request(&self) -> &CartItemUpdate {
        &self.request
    }
}

/// Row field edited optimistically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Field {
    Quantity,
    Cycle,
}

/// Stored value of one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Restore {
    Quantity(u32),
    Cycle(Option<DeliveryCycle>),
}

impl Restore {
    const fn field(self) -> Field {
        match self {
            Self::Quantity(_) => Field::Quantity,
            Self::Cycle(_) => Field::Cycle,
        }
    }

    fn apply(self, item: &mut CartLineItem) {
        match self {
            Self::Quantity(quantity) => item.quantity = quantity,
            Self::Cycle(cycle) => item.delivery_cycle = cycle,
        }
    }
}

/// Edits of one field that have not all resolved.
#[derive(Debug, Clone, Copy)]
struct InFlight {
    /// Revision of the newest ticket.
    revision: u64,
    /// Last value the server accepted, or the value before the first edit.
    confirmed: Restore,
}

const fn read_quantity(item: &CartLineItem) -> u32 {
    item.quantity
}

fn read_cycle(item: &CartLineItem) -> DeliveryCycle {
    item.delivery_cycle.unwrap_or_default()
}

/// Local view of the remote cart.
pub struct CartStore {
    gateway: Arc<dyn CartGateway>,
    items: Vec<CartLineItem>,
    in_flight: HashMap<(CartItemId, Field), InFlight>,
    next_revision: u64,
    epoch: u64,
    is_loading: bool,
    last_error: Option<CartFailure>,
    checkout: Option<CheckoutSelection>,
}

impl std::fmt::Debug for CartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartStore")
            .field("items", &self.items.len())
            .field("epoch", &self.epoch)
            .field("is_loading", &self.is_loading)
            .field("last_error", &self.last_error)
            .field("checkout", &self.checkout.is_some())
            .finish_non_exhaustive()
    }
}

impl CartStore {
    /// Create an empty store backed by `gateway`.
    #[must_use]
    pub fn new(gateway: Arc<dyn CartGateway>) -> Self {
        Self {
            gateway,
            items: Vec::new(),
            in_flight: HashMap::new(),
            next_revision: 0,
            epoch: 0,
            is_loading: false,
            last_error: None,
            checkout: None,
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    #[must_use]
    pub fn items(&self) -> &[CartLineItem] {
        &self.items
    }

    #[must_use]
    pub fn item(&self, id: CartItemId) -> Option<&CartLineItem> {
        self.items.iter().find(|item| item.id == id)
    }

    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.is_loading
    }

    #[must_use]
    pub const fn last_error(&self) -> Option<&CartFailure> {
        self.last_error.as_ref()
    }

    /// Delivery cycle of a subscription row, defaulting to biweekly.
    ///
    /// `None` for unknown IDs and one-time rows.
    #[must_use]
    pub fn delivery_cycle(&self, id: CartItemId) -> Option<DeliveryCycle> {
        self.item(id).and_then(CartLineItem::effective_cycle)
    }

    /// Whether the row's product is sold out. Unknown IDs are not.
    #[must_use]
    pub fn is_sold_out(&self, id: CartItemId) -> bool {
        self.item(id).is_some_and(CartLineItem::is_sold_out)
    }

    #[must_use]
    pub fn items_by_mode(&self, mode: PurchaseMode) -> Vec<&CartLineItem> {
        items_by_mode(&self.items, mode)
    }

    /// Totals over the snapshot; see [`compute_total`].
    #[must_use]
    pub fn totals(&self, ids: Option<&[CartItemId]>, mode: Option<PurchaseMode>) -> CartTotals {
        compute_total(&self.items, ids, mode)
    }

    // =========================================================================
    // Fetch
    // =========================================================================

    /// Mark the store as loading and hand out a fetch ticket.
    pub fn begin_fetch(&mut self) -> PendingFetch {
        self.is_loading = true;
        self.last_error = None;
        PendingFetch { epoch: self.epoch }
    }

    /// Settle a fetch.
    ///
    /// On success the snapshot is replaced wholesale and every pending
    /// optimistic edit is superseded. On failure the items stay as they
    /// were. A fetch issued before the last [`reset`](Self::reset) changes
    /// nothing.
    ///
    /// # Errors
    ///
    /// Returns the recorded failure if the remote call failed.
    pub fn complete_fetch(
        &mut self,
        pending: PendingFetch,
        result: Result<Vec<CartLineItem>, ApiError>,
    ) -> Result<&[CartLineItem], CartFailure> {
        if pending.epoch != self.epoch {
            debug!("Dropping cart fetch issued before reset");
            return Ok(&self.items);
        }
        self.is_loading = false;

        match result {
            Ok(items) => {
                self.items = dedup_by_id(items);
                self.in_flight.clear();
                debug!(count = self.items.len(), "Cart snapshot replaced");
                Ok(&self.items)
            }
            Err(e) => {
                warn!(error = %e, "Cart fetch failed");
                let failure = e.into_failure(messages::FETCH_FAILED);
                self.last_error = Some(failure.clone());
                Err(failure)
            }
        }
    }

    /// Load the full cart of the signed-in user.
    ///
    /// # Errors
    ///
    /// Returns the recorded failure if the remote call failed.
    #[instrument(skip_all)]
    pub async fn fetch(&mut self, token: &AccessToken) -> Result<&[CartLineItem], CartFailure> {
        let pending = self.begin_fetch();
        let gateway = Arc::clone(&self.gateway);
        let result = gateway.list_cart(token).await;
        self.complete_fetch(pending, result)
    }

    // =========================================================================
    // Optimistic Edits
    // =========================================================================

    /// Apply a quantity change locally and return its ticket.
    ///
    /// # Errors
    ///
    /// Rejects unknown and sold-out rows without touching the snapshot.
    pub fn begin_set_quantity(
        &mut self,
        id: CartItemId,
        quantity: u32,
    ) -> Result<PendingUpdate<u32>, CartError> {
        let previous = self.guard(id)?.quantity;
        let revision = self.track(id, Restore::Quantity(previous));
        self.item_mut(id)?.quantity = quantity;
        debug!(%id, previous, quantity, "Optimistic quantity applied");

        Ok(PendingUpdate {
            id,
            epoch: self.epoch,
            revision,
            next: quantity,
            applied: Restore::Quantity(quantity),
            read: read_quantity,
            request: CartItemUpdate {
                quantity,
                cycle: None,
            },
        })
    }

    /// Apply a delivery-cycle change locally and return its ticket.
    ///
    /// # Errors
    ///
    /// Rejects unknown, sold-out and one-time rows without touching the
    /// snapshot.
    pub fn begin_set_delivery_cycle(
        &mut self,
        id: CartItemId,
        cycle: DeliveryCycle,
    ) -> Result<PendingUpdate<DeliveryCycle>, CartError> {
        let item = self.guard(id)?;
        if !item.is_subscription() {
            return Err(CartError::NotSubscription(id));
        }
        let (stored, quantity) = (item.delivery_cycle, item.quantity);
        let revision = self.track(id, Restore::Cycle(stored));
        self.item_mut(id)?.delivery_cycle = Some(cycle);
        debug!(%id, cycle = cycle.code(), "Optimistic delivery cycle applied");

        Ok(PendingUpdate {
            id,
            epoch: self.epoch,
            revision,
            next: cycle,
            applied: Restore::Cycle(Some(cycle)),
            read: read_cycle,
            request: CartItemUpdate {
                quantity,
                cycle: Some(cycle),
            },
        })
    }

    /// Settle an optimistic edit with the outcome of its remote call.
    ///
    /// A rejected edit restores the last value the server accepted for the
    /// field, unless a newer edit of the same field is still in flight; that
    /// newer edit then owns the rollback.
    pub fn complete<T>(
        &mut self,
        pending: PendingUpdate<T>,
        result: Result<(), ApiError>,
    ) -> Mutation<T> {
        if pending.epoch != self.epoch {
            debug!(id = %pending.id, "Dropping completion issued before reset");
            return Mutation::Discarded;
        }

        let key = (pending.id, pending.applied.field());
        let tracked = self.in_flight.get(&key).copied();
        let is_latest = tracked.is_some_and(|state| state.revision == pending.revision);

        let error = match result {
            Ok(()) => {
                self.last_error = None;
                if is_latest {
                    self.in_flight.remove(&key);
                } else if let Some(state) = self.in_flight.get_mut(&key) {
                    state.confirmed = pending.applied;
                }
                debug!(id = %pending.id, "Optimistic edit committed");
                return Mutation::Applied(pending.next);
            }
            Err(e) => e,
        };

        warn!(id = %pending.id, error = %error, "Cart update rejected");
        let failure = error.into_failure(messages::UPDATE_FAILED);
        self.last_error = Some(failure.clone());

        let Some(state) = tracked.filter(|_| is_latest) else {
            debug!(id = %pending.id, "Newer state owns the field; rollback skipped");
            return Mutation::Superseded { failure };
        };
        self.in_flight.remove(&key);
        match self.items.iter_mut().find(|item| item.id == pending.id) {
            Some(item) => {
                state.confirmed.apply(item);
                Mutation::RolledBack {
                    previous: (pending.read)(item),
                    failure,
                }
            }
            None => Mutation::Superseded { failure },
        }
    }

    /// Change a row's quantity and sync it to the server.
    ///
    /// # Errors
    ///
    /// Guard rejections are returned before any network call.
    #[instrument(skip(self, token))]
    pub async fn set_quantity(
        &mut self,
        token: &AccessToken,
        id: CartItemId,
        quantity: u32,
    ) -> Result<Mutation<u32>, CartError> {
        let pending = self.begin_set_quantity(id, quantity)?;
        let gateway = Arc::clone(&self.gateway);
        let result = gateway.update_cart_item(token, id, pending.request()).await;
        Ok(self.complete(pending, result))
    }

    /// Change a subscription row's delivery cycle and sync it to the server.
    ///
    /// # Errors
    ///
    /// Guard rejections are returned before any network call.
    #[instrument(skip(self, token))]
    pub async fn set_delivery_cycle(
        &mut self,
        token: &AccessToken,
        id: CartItemId,
        cycle: DeliveryCycle,
    ) -> Result<Mutation<DeliveryCycle>, CartError> {
        let pending = self.begin_set_delivery_cycle(id, cycle)?;
        let gateway = Arc::clone(&self.gateway);
        let result = gateway.update_cart_item(token, id, pending.request()).await;
        Ok(self.complete(pending, result))
    }

    // =========================================================================
    // Removal
    // =========================================================================

    /// Drop a row the server has already deleted.
    pub fn remove_item(&mut self, id: CartItemId) -> Option<CartLineItem> {
        let index = self.items.iter().position(|item| item.id == id)?;
        self.in_flight.retain(|(tracked, _), _| *tracked != id);
        Some(self.items.remove(index))
    }

    /// Drop rows the server has already deleted. Returns how many were
    /// present.
    pub fn remove_items(&mut self, ids: &[CartItemId]) -> usize {
        let before = self.items.len();
        self.items.retain(|item| !ids.contains(&item.id));
        self.in_flight.retain(|(tracked, _), _| !ids.contains(tracked));
        before - self.items.len()
    }

    /// Drop purchased rows and the staged checkout after a confirmed order.
    pub fn clear_purchased(&mut self, ids: &[CartItemId]) -> usize {
        self.checkout = None;
        self.remove_items(ids)
    }

    /// Delete one row remotely, then locally.
    ///
    /// # Errors
    ///
    /// On remote failure nothing is removed and the failure is recorded.
    #[instrument(skip(self, token))]
    pub async fn delete_item(
        &mut self,
        token: &AccessToken,
        id: CartItemId,
    ) -> Result<(), CartFailure> {
        let epoch = self.epoch;
        let gateway = Arc::clone(&self.gateway);
        let result = gateway.delete_cart_item(token, id).await;
        self.settle_delete(epoch, result, &[id])
    }

    /// Delete several rows in one remote call, then locally.
    ///
    /// # Errors
    ///
    /// On remote failure nothing is removed and the failure is recorded.
    #[instrument(skip(self, token), fields(count = ids.len()))]
    pub async fn delete_items(
        &mut self,
        token: &AccessToken,
        ids: &[CartItemId],
    ) -> Result<(), CartFailure> {
        if ids.is_empty() {
            return Ok(());
        }
        let epoch = self.epoch;
        let gateway = Arc::clone(&self.gateway);
        let result = gateway.delete_cart_items(token, ids).await;
        self.settle_delete(epoch, result, ids)
    }

    fn settle_delete(
        &mut self,
        epoch: u64,
        result: Result<(), ApiError>,
        ids: &[CartItemId],
    ) -> Result<(), CartFailure> {
        if epoch != self.epoch {
            return Ok(());
        }
        match result {
            Ok(()) => {
                let removed = self.remove_items(ids);
                debug!(removed, "Cart rows deleted");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Cart delete failed");
                let failure = e.into_failure(messages::DELETE_FAILED);
                self.last_error = Some(failure.clone());
                Err(failure)
            }
        }
    }

    /// Put a product into the cart, then re-fetch.
    ///
    /// # Errors
    ///
    /// Returns the recorded failure of the add or the re-fetch.
    #[instrument(skip(self, token), fields(product_id = %item.product_id))]
    pub async fn add_item(
        &mut self,
        token: &AccessToken,
        item: &NewCartItem,
    ) -> Result<&[CartLineItem], CartFailure> {
        let gateway = Arc::clone(&self.gateway);
        if let Err(e) = gateway.add_cart_item(token, item).await {
            warn!(error = %e, "Adding to cart failed");
            let failure = e.into_failure(messages::ADD_FAILED);
            self.last_error = Some(failure.clone());
            return Err(failure);
        }
        self.fetch(token).await
    }

    /// Post-purchase cleanup: delete purchased rows remotely, drop them
    /// locally with the staged checkout, then resynchronize.
    ///
    /// Remote failures are logged and otherwise ignored; the order has
    /// already been placed.
    #[instrument(skip(self, token), fields(count = ids.len()))]
    pub async fn reconcile_purchased(&mut self, token: &AccessToken, ids: &[CartItemId]) {
        let gateway = Arc::clone(&self.gateway);
        if let Err(e) = gateway.delete_cart_items(token, ids).await {
            warn!(error = %e, "Removing purchased rows from the remote cart failed");
        }
        let removed = self.clear_purchased(ids);
        debug!(removed, "Purchased rows cleared");
        if let Err(failure) = self.fetch(token).await {
            warn!(error = %failure, "Re-fetch after purchase failed");
        }
    }

    // =========================================================================
    // Checkout Staging
    // =========================================================================

    /// Freeze the purchasable rows among `ids` for checkout.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::NothingPurchasable`] if no selected row of
    /// `mode` can be bought.
    pub fn stage_checkout(
        &mut self,
        ids: &[CartItemId],
        mode: PurchaseMode,
    ) -> Result<&CheckoutSelection, CheckoutError> {
        let selection = CheckoutSelection::from_cart(&self.items, ids, mode)?;
        Ok(self.checkout.insert(selection))
    }

    #[must_use]
    pub const fn staged_checkout(&self) -> Option<&CheckoutSelection> {
        self.checkout.as_ref()
    }

    /// Forget the staged checkout, e.g. when the buyer navigates away.
    pub fn clear_checkout(&mut self) {
        self.checkout = None;
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    /// Logout hook: empty the snapshot and invalidate in-flight tickets.
    pub fn reset(&mut self) {
        self.items.clear();
        self.in_flight.clear();
        self.is_loading = false;
        self.last_error = None;
        self.checkout = None;
        self.epoch += 1;
        debug!(epoch = self.epoch, "Cart store reset");
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Reject unknown and sold-out rows.
    fn guard(&self, id: CartItemId) -> Result<&CartLineItem, CartError> {
        let item = self.item(id).ok_or(CartError::ItemNotFound(id))?;
        if item.is_sold_out() {
            return Err(CartError::SoldOut(id));
        }
        Ok(item)
    }

    fn item_mut(&mut self, id: CartItemId) -> Result<&mut CartLineItem, CartError> {
        self.items
            .iter_mut()
            .find(|item| item.id == id)
            .ok_or(CartError::ItemNotFound(id))
    }

    /// Register a new edit of a field whose current value is `current`.
    ///
    /// The first edit in a chain records `current` as the confirmed value;
    /// later edits keep the confirmed value of the chain.
    fn track(&mut self, id: CartItemId, current: Restore) -> u64 {
        self.next_revision += 1;
        let revision = self.next_revision;
        self.in_flight
            .entry((id, current.field()))
            .and_modify(|state| state.revision = revision)
            .or_insert(InFlight {
                revision,
                confirmed: current,
            });
        revision
    }
}

/// Keep the first row for each ID.
fn dedup_by_id(items: Vec<CartLineItem>) -> Vec<CartLineItem> {
    let mut seen = std::collections::HashSet::with_capacity(items.len());
    let total = items.len();
    let unique: Vec<CartLineItem> = items
        .into_iter()
        .filter(|item| seen.insert(item.id))
        .collect();
    if unique.len() != total {
        warn!(dropped = total - unique.len(), "Cart response contained duplicate rows");
    }
    unique
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kibble_core::{ProductId, ProductRef};
    use rust_decimal::Decimal;

    use crate::api::ApiFailure;

    /// Gateway that is never called; tests drive the ticket API directly.
    struct Offline;

    #[async_trait]
    impl CartGateway for Offline {
        async fn list_cart(&self, _: &AccessToken) -> Result<Vec<CartLineItem>, ApiError> {
            Ok(Vec::new())
        }
        async fn add_cart_item(&self, _: &AccessToken, _: &NewCartItem) -> Result<(), ApiError> {
            Ok(())
        }
        async fn update_cart_item(
            &self,
            _: &AccessToken,
            _: CartItemId,
            _: &CartItemUpdate,
        ) -> Result<(), ApiError> {
            Ok(())
        }
        async fn delete_cart_item(&self, _: &AccessToken, _: CartItemId) -> Result<(), ApiError> {
            Ok(())
        }
        async fn delete_cart_items(
            &self,
            _: &AccessToken,
            _: &[CartItemId],
        ) -> Result<(), ApiError> {
            Ok(())
        }
    }

    fn line(id: i64, mode: PurchaseMode, sold_out: bool) -> CartLineItem {
        CartLineItem {
            id: CartItemId::new(id),
            product: ProductRef {
                id: ProductId::new(id * 10),
                name: format!("Product {id}"),
                price: Decimal::new(10_000, 0),
                stock: 20,
                sold: if sold_out { 20 } else { 3 },
                image: None,
            },
            quantity: 2,
            purchase_mode: mode,
            delivery_cycle: None,
            created_at: None,
            updated_at: None,
        }
    }

    fn loaded(items: Vec<CartLineItem>) -> CartStore {
        let mut store = CartStore::new(Arc::new(Offline));
        let pending = store.begin_fetch();
        store.complete_fetch(pending, Ok(items)).unwrap();
        store
    }

    fn rejected() -> Result<(), ApiError> {
        Err(ApiError::Remote(ApiFailure::message("Not enough stock")))
    }

    #[test]
    fn test_optimistic_value_visible_before_completion() {
        let mut store = loaded(vec![line(1, PurchaseMode::OneTime, false)]);
        let pending = store.begin_set_quantity(CartItemId::new(1), 5).unwrap();
        assert_eq!(store.item(CartItemId::new(1)).unwrap().quantity, 5);
        assert_eq!(pending.request().quantity, 5);
        assert_eq!(store.complete(pending, Ok(())), Mutation::Applied(5));
        assert_eq!(store.item(CartItemId::new(1)).unwrap().quantity, 5);
    }

    #[test]
    fn test_rejected_quantity_rolls_back() {
        let mut store = loaded(vec![line(1, PurchaseMode::OneTime, false)]);
        let pending = store.begin_set_quantity(CartItemId::new(1), 9).unwrap();
        let outcome = store.complete(pending, rejected());

        assert!(matches!(outcome, Mutation::RolledBack { previous: 2, .. }));
        assert_eq!(store.item(CartItemId::new(1)).unwrap().quantity, 2);
        assert_eq!(store.last_error().unwrap().message, "Not enough stock");
    }

    #[test]
    fn test_transport_failure_uses_generic_message() {
        let mut store = loaded(vec![line(1, PurchaseMode::OneTime, false)]);
        let pending = store.begin_set_quantity(CartItemId::new(1), 3).unwrap();
        store.complete(pending, Err(ApiError::Decode("eof".to_string())));
        assert_eq!(store.last_error().unwrap().message, messages::UPDATE_FAILED);
    }

    #[test]
    fn test_sold_out_guard_leaves_store_untouched() {
        let mut store = loaded(vec![line(1, PurchaseMode::OneTime, true)]);
        let before = store.items().to_vec();

        let err = store.begin_set_quantity(CartItemId::new(1), 7).unwrap_err();
        assert_eq!(err, CartError::SoldOut(CartItemId::new(1)));
        assert_eq!(store.items(), before.as_slice());
        assert!(store.last_error().is_none());
    }

    #[test]
    fn test_cycle_guards() {
        let mut store = loaded(vec![
            line(1, PurchaseMode::OneTime, false),
            line(2, PurchaseMode::Subscription, true),
        ]);
        assert_eq!(
            store
                .begin_set_delivery_cycle(CartItemId::new(1), DeliveryCycle::Monthly)
                .unwrap_err(),
            CartError::NotSubscription(CartItemId::new(1))
        );
        assert_eq!(
            store
                .begin_set_delivery_cycle(CartItemId::new(2), DeliveryCycle::Monthly)
                .unwrap_err(),
            CartError::SoldOut(CartItemId::new(2))
        );
        assert_eq!(
            store
                .begin_set_delivery_cycle(CartItemId::new(3), DeliveryCycle::Monthly)
                .unwrap_err(),
            CartError::ItemNotFound(CartItemId::new(3))
        );
    }

    #[test]
    fn test_cycle_rollback_restores_absent_cycle() {
        let mut store = loaded(vec![line(1, PurchaseMode::Subscription, false)]);
        assert_eq!(
            store.delivery_cycle(CartItemId::new(1)),
            Some(DeliveryCycle::Biweekly)
        );

        let pending = store
            .begin_set_delivery_cycle(CartItemId::new(1), DeliveryCycle::Monthly)
            .unwrap();
        assert_eq!(pending.request().cycle, Some(DeliveryCycle::Monthly));
        assert_eq!(pending.request().quantity, 2);
        assert_eq!(
            store.delivery_cycle(CartItemId::new(1)),
            Some(DeliveryCycle::Monthly)
        );

        let outcome = store.complete(pending, rejected());
        assert!(matches!(
            outcome,
            Mutation::RolledBack {
                previous: DeliveryCycle::Biweekly,
                ..
            }
        ));
        assert_eq!(store.item(CartItemId::new(1)).unwrap().delivery_cycle, None);
    }

    #[test]
    fn test_stale_rollback_keeps_newer_value() {
        let mut store = loaded(vec![line(1, PurchaseMode::OneTime, false)]);
        let first = store.begin_set_quantity(CartItemId::new(1), 3).unwrap();
        let second = store.begin_set_quantity(CartItemId::new(1), 4).unwrap();

        let outcome = store.complete(first, rejected());
        assert!(matches!(outcome, Mutation::Superseded { .. }));
        assert_eq!(store.item(CartItemId::new(1)).unwrap().quantity, 4);
        assert!(store.last_error().is_some());

        assert_eq!(store.complete(second, Ok(())), Mutation::Applied(4));
        assert!(store.last_error().is_none());
    }

    #[test]
    fn test_chain_of_rejections_restores_confirmed_value() {
        let mut store = loaded(vec![line(1, PurchaseMode::OneTime, false)]);
        let first = store.begin_set_quantity(CartItemId::new(1), 3).unwrap();
        let second = store.begin_set_quantity(CartItemId::new(1), 4).unwrap();

        assert!(matches!(
            store.complete(first, rejected()),
            Mutation::Superseded { .. }
        ));
        assert!(matches!(
            store.complete(second, rejected()),
            Mutation::RolledBack { previous: 2, .. }
        ));
        assert_eq!(store.item(CartItemId::new(1)).unwrap().quantity, 2);
    }

    #[test]
    fn test_older_success_becomes_rollback_target() {
        let mut store = loaded(vec![line(1, PurchaseMode::OneTime, false)]);
        let first = store.begin_set_quantity(CartItemId::new(1), 3).unwrap();
        let second = store.begin_set_quantity(CartItemId::new(1), 4).unwrap();

        assert_eq!(store.complete(first, Ok(())), Mutation::Applied(3));
        assert!(matches!(
            store.complete(second, rejected()),
            Mutation::RolledBack { previous: 3, .. }
        ));
        assert_eq!(store.item(CartItemId::new(1)).unwrap().quantity, 3);
    }

    #[test]
    fn test_fields_roll_back_independently() {
        let mut store = loaded(vec![line(1, PurchaseMode::Subscription, false)]);
        let quantity = store.begin_set_quantity(CartItemId::new(1), 9).unwrap();
        let cycle = store
            .begin_set_delivery_cycle(CartItemId::new(1), DeliveryCycle::Monthly)
            .unwrap();
        assert_eq!(cycle.request().quantity, 9);

        assert!(matches!(
            store.complete(quantity, rejected()),
            Mutation::RolledBack { previous: 2, .. }
        ));
        assert!(matches!(
            store.complete(cycle, rejected()),
            Mutation::RolledBack {
                previous: DeliveryCycle::Biweekly,
                ..
            }
        ));
        let item = store.item(CartItemId::new(1)).unwrap();
        assert_eq!(item.quantity, 2);
        assert_eq!(item.delivery_cycle, None);
    }

    #[test]
    fn test_late_failure_after_newer_success_keeps_value() {
        let mut store = loaded(vec![line(1, PurchaseMode::OneTime, false)]);
        let first = store.begin_set_quantity(CartItemId::new(1), 3).unwrap();
        let second = store.begin_set_quantity(CartItemId::new(1), 4).unwrap();

        assert_eq!(store.complete(second, Ok(())), Mutation::Applied(4));
        assert!(matches!(
            store.complete(first, rejected()),
            Mutation::Superseded { .. }
        ));
        assert_eq!(store.item(CartItemId::new(1)).unwrap().quantity, 4);
    }

    #[test]
    fn test_completion_after_reset_is_discarded() {
        let mut store = loaded(vec![line(1, PurchaseMode::OneTime, false)]);
        let pending = store.begin_set_quantity(CartItemId::new(1), 8).unwrap();
        store.reset();

        assert_eq!(store.complete(pending, rejected()), Mutation::Discarded);
        assert!(store.items().is_empty());
        assert!(store.last_error().is_none());
    }

    #[test]
    fn test_fetch_after_reset_is_dropped() {
        let mut store = CartStore::new(Arc::new(Offline));
        let pending = store.begin_fetch();
        store.reset();
        store
            .complete_fetch(pending, Ok(vec![line(1, PurchaseMode::OneTime, false)]))
            .unwrap();
        assert!(store.items().is_empty());
    }

    #[test]
    fn test_failed_fetch_keeps_items() {
        let mut store = loaded(vec![line(1, PurchaseMode::OneTime, false)]);
        let pending = store.begin_fetch();
        assert!(store.is_loading());

        let failure = store
            .complete_fetch(pending, Err(ApiError::Decode("bad".to_string())))
            .unwrap_err();
        assert_eq!(failure.message, messages::FETCH_FAILED);
        assert!(!store.is_loading());
        assert_eq!(store.items().len(), 1);
    }

    #[test]
    fn test_fetch_drops_duplicate_ids() {
        let store = loaded(vec![
            line(1, PurchaseMode::OneTime, false),
            line(1, PurchaseMode::Subscription, false),
            line(2, PurchaseMode::OneTime, false),
        ]);
        assert_eq!(store.items().len(), 2);
        assert_eq!(store.items()[0].purchase_mode, PurchaseMode::OneTime);
    }

    #[test]
    fn test_clear_purchased_removes_ids_and_checkout() {
        let mut store = loaded(vec![
            line(5, PurchaseMode::OneTime, false),
            line(6, PurchaseMode::OneTime, false),
            line(7, PurchaseMode::OneTime, false),
        ]);
        store
            .stage_checkout(&[CartItemId::new(5), CartItemId::new(6)], PurchaseMode::OneTime)
            .unwrap();
        assert!(store.staged_checkout().is_some());

        let removed = store.clear_purchased(&[CartItemId::new(5), CartItemId::new(6)]);
        assert_eq!(removed, 2);
        let left: Vec<i64> = store.items().iter().map(|i| i.id.as_i64()).collect();
        assert_eq!(left, vec![7]);
        assert!(store.staged_checkout().is_none());
    }

    #[test]
    fn test_remove_item_unknown_id() {
        let mut store = loaded(vec![line(1, PurchaseMode::OneTime, false)]);
        assert!(store.remove_item(CartItemId::new(2)).is_none());
        assert!(store.remove_item(CartItemId::new(1)).is_some());
        assert!(store.items().is_empty());
    }

    #[test]
    fn test_lookups() {
        let store = loaded(vec![
            line(1, PurchaseMode::OneTime, true),
            line(2, PurchaseMode::Subscription, false),
        ]);
        assert!(store.is_sold_out(CartItemId::new(1)));
        assert!(!store.is_sold_out(CartItemId::new(2)));
        assert!(!store.is_sold_out(CartItemId::new(99)));
        assert_eq!(store.delivery_cycle(CartItemId::new(1)), None);
        assert_eq!(store.items_by_mode(PurchaseMode::Subscription).len(), 1);
        assert_eq!(
            store.totals(None, Some(PurchaseMode::Subscription)).payable(),
            Decimal::new(18_000, 0)
        );
    }
}
