//! Integration tests for the Kibble cart engine.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p kibble-integration-tests
//! ```
//!
//! # Fixtures
//!
//! - [`FakeCartGateway`] - in-memory remote cart with scripted failures
//! - [`FakeOrders`] - order gateway that can fail per product
//! - [`FakePayments`] - payment gateway that approves or declines
//!
//! Every fake records the calls it receives so tests can assert that a
//! guarded operation never reached the network.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use rust_decimal::Decimal;

use kibble_core::{
    CartItemId, CartLineItem, DeliveryCycle, OrderId, ProductId, ProductRef, PurchaseMode,
};
use kibble_storefront::api::{
    AccessToken, ApiError, ApiFailure, CartGateway, CartItemUpdate, NewCartItem, OrderGateway,
    OrderLine, PlacedOrder,
};
use kibble_storefront::checkout::{
    PaymentFailure, PaymentGateway, PaymentReceipt, PaymentRequest,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Token accepted by every fake.
#[must_use]
pub fn token() -> AccessToken {
    AccessToken::new("test-bearer-token")
}

/// Build a cart row priced in won.
#[must_use]
pub fn line_item(id: i64, mode: PurchaseMode, price: i64, quantity: u32) -> CartLineItem {
    CartLineItem {
        id: CartItemId::new(id),
        product: ProductRef {
            id: ProductId::new(1000 + id),
            name: format!("Kibble {id}"),
            price: Decimal::new(price, 0),
            stock: 50,
            sold: 10,
            image: None,
        },
        quantity,
        purchase_mode: mode,
        delivery_cycle: None,
        created_at: None,
        updated_at: None,
    }
}

/// Mark a row's product as sold out.
#[must_use]
pub fn sold_out(mut item: CartLineItem) -> CartLineItem {
    item.product.sold = item.product.stock;
    item
}

/// Set a row's stored delivery cycle.
#[must_use]
pub fn with_cycle(mut item: CartLineItem, cycle: DeliveryCycle) -> CartLineItem {
    item.delivery_cycle = Some(cycle);
    item
}

// =============================================================================
// Cart Gateway
// =============================================================================

/// A call received by [`FakeCartGateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartCall {
    List,
    Add(NewCartItem),
    Update(CartItemId, CartItemUpdate),
    Delete(CartItemId),
    DeleteMany(Vec<CartItemId>),
}

/// In-memory remote cart.
#[derive(Debug, Default)]
pub struct FakeCartGateway {
    items: Mutex<Vec<CartLineItem>>,
    calls: Mutex<Vec<CartCall>>,
    reject_updates: Mutex<Option<ApiFailure>>,
    reject_deletes: Mutex<Option<ApiFailure>>,
    fail_list: Mutex<bool>,
    next_id: Mutex<i64>,
}

impl FakeCartGateway {
    #[must_use]
    pub fn with_items(items: Vec<CartLineItem>) -> Self {
        let next_id = items.iter().map(|item| item.id.as_i64()).max().unwrap_or(0) + 1;
        Self {
            items: Mutex::new(items),
            next_id: Mutex::new(next_id),
            ..Self::default()
        }
    }

    /// Reject every following update with `message`.
    pub fn reject_updates(&self, message: &str) {
        *lock(&self.reject_updates) = Some(ApiFailure::message(message));
    }

    /// Reject every following delete with `message`.
    pub fn reject_deletes(&self, message: &str) {
        *lock(&self.reject_deletes) = Some(ApiFailure::message(message));
    }

    /// Make every following list call fail at the transport level.
    pub fn fail_list(&self) {
        *lock(&self.fail_list) = true;
    }

    /// Rows currently stored server-side.
    #[must_use]
    pub fn server_items(&self) -> Vec<CartLineItem> {
        lock(&self.items).clone()
    }

    #[must_use]
    pub fn calls(&self) -> Vec<CartCall> {
        lock(&self.calls).clone()
    }

    /// Calls other than listing the cart.
    #[must_use]
    pub fn writes(&self) -> Vec<CartCall> {
        self.calls()
            .into_iter()
            .filter(|call| *call != CartCall::List)
            .collect()
    }

    fn record(&self, call: CartCall) {
        lock(&self.calls).push(call);
    }
}

#[async_trait]
impl CartGateway for FakeCartGateway {
    async fn list_cart(&self, _token: &AccessToken) -> Result<Vec<CartLineItem>, ApiError> {
        self.record(CartCall::List);
        if *lock(&self.fail_list) {
            return Err(ApiError::Decode("connection reset".to_string()));
        }
        Ok(self.server_items())
    }

    async fn add_cart_item(
        &self,
        _token: &AccessToken,
        item: &NewCartItem,
    ) -> Result<(), ApiError> {
        self.record(CartCall::Add(*item));
        let id = {
            let mut next = lock(&self.next_id);
            let id = *next;
            *next += 1;
            id
        };
        let mut row = line_item(id, item.mode, 10_000, item.quantity);
        row.product.id = item.product_id;
        row.delivery_cycle = item.cycle;
        lock(&self.items).push(row);
        Ok(())
    }

    async fn update_cart_item(
        &self,
        _token: &AccessToken,
        id: CartItemId,
        update: &CartItemUpdate,
    ) -> Result<(), ApiError> {
        self.record(CartCall::Update(id, *update));
        if let Some(failure) = lock(&self.reject_updates).clone() {
            return Err(ApiError::Remote(failure));
        }
        let mut items = lock(&self.items);
        let Some(item) = items.iter_mut().find(|item| item.id == id) else {
            return Err(ApiError::Remote(ApiFailure::message("Cart item not found")));
        };
        item.quantity = update.quantity;
        if update.cycle.is_some() {
            item.delivery_cycle = update.cycle;
        }
        Ok(())
    }

    async fn delete_cart_item(&self, _token: &AccessToken, id: CartItemId) -> Result<(), ApiError> {
        self.record(CartCall::Delete(id));
        if let Some(failure) = lock(&self.reject_deletes).clone() {
            return Err(ApiError::Remote(failure));
        }
        lock(&self.items).retain(|item| item.id != id);
        Ok(())
    }

    async fn delete_cart_items(
        &self,
        _token: &AccessToken,
        ids: &[CartItemId],
    ) -> Result<(), ApiError> {
        self.record(CartCall::DeleteMany(ids.to_vec()));
        if let Some(failure) = lock(&self.reject_deletes).clone() {
            return Err(ApiError::Remote(failure));
        }
        lock(&self.items).retain(|item| !ids.contains(&item.id));
        Ok(())
    }
}

// =============================================================================
// Orders
// =============================================================================

/// Order gateway failing for chosen products.
#[derive(Debug, Default)]
pub struct FakeOrders {
    failing: Mutex<HashSet<ProductId>>,
    received: Mutex<Vec<Vec<OrderLine>>>,
    next_id: Mutex<i64>,
}

impl FakeOrders {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject orders containing `product_id`.
    pub fn fail_for(&self, product_id: ProductId) {
        lock(&self.failing).insert(product_id);
    }

    /// Line batches received, one entry per order call.
    #[must_use]
    pub fn received(&self) -> Vec<Vec<OrderLine>> {
        lock(&self.received).clone()
    }
}

#[async_trait]
impl OrderGateway for FakeOrders {
    async fn create_order(
        &self,
        _token: &AccessToken,
        lines: &[OrderLine],
    ) -> Result<PlacedOrder, ApiError> {
        lock(&self.received).push(lines.to_vec());
        let failing = lock(&self.failing).clone();
        if lines.iter().any(|line| failing.contains(&line.product_id)) {
            return Err(ApiError::Remote(ApiFailure::message("Out of stock")));
        }
        let id = {
            let mut next = lock(&self.next_id);
            *next += 1;
            *next
        };
        Ok(PlacedOrder {
            id: OrderId::new(id),
            state: Some("OS010".to_string()),
            total: None,
            discount: None,
            created_at: None,
        })
    }
}

// =============================================================================
// Payments
// =============================================================================

/// Payment gateway that approves unless told to decline.
#[derive(Debug, Default)]
pub struct FakePayments {
    decline: Mutex<Option<PaymentFailure>>,
    requests: Mutex<Vec<PaymentRequest>>,
}

impl FakePayments {
    #[must_use]
    pub fn approving() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn declining(message: &str) -> Self {
        Self {
            decline: Mutex::new(Some(PaymentFailure {
                code: Some("FAILURE_TYPE_PG".to_string()),
                message: message.to_string(),
            })),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn requests(&self) -> Vec<PaymentRequest> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl PaymentGateway for FakePayments {
    async fn request_payment(
        &self,
        request: &PaymentRequest,
    ) -> Result<PaymentReceipt, PaymentFailure> {
        lock(&self.requests).push(request.clone());
        if let Some(failure) = lock(&self.decline).clone() {
            return Err(failure);
        }
        Ok(PaymentReceipt {
            payment_id: request.payment_id.clone(),
            transaction_id: Some(format!("tx-{}", lock(&self.requests).len())),
        })
    }
}
