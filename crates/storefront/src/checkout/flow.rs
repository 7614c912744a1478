//! Checkout state machine.

use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use kibble_core::CheckoutPhase;

use crate::api::{AccessToken, OrderGateway, OrderLine, PlacedOrder, messages};
use crate::cart::{CartStore, CartTotals};
use crate::error::add_breadcrumb;

use super::payment::{PaymentGateway, PaymentReceipt, PaymentRequest};
use super::staging::{CheckoutSelection, CheckoutSource, Consents};
use super::CheckoutError;

/// One attempt at buying a staged selection.
#[derive(Debug, Clone)]
pub struct CheckoutAttempt {
    selection: CheckoutSelection,
    phase: CheckoutPhase,
    payment: Option<PaymentReceipt>,
    placed: Vec<PlacedOrder>,
}

impl CheckoutAttempt {
    #[must_use]
    pub const fn new(selection: CheckoutSelection) -> Self {
        Self {
            selection,
            phase: CheckoutPhase::Staged,
            payment: None,
            placed: Vec::new(),
        }
    }

    /// Start an attempt for the checkout staged in `store`.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::NotStaged`] if nothing is staged.
    pub fn from_store(store: &CartStore) -> Result<Self, CheckoutError> {
        store
            .staged_checkout()
            .cloned()
            .map(Self::new)
            .ok_or(CheckoutError::NotStaged)
    }

    #[must_use]
    pub const fn phase(&self) -> CheckoutPhase {
        self.phase
    }

    #[must_use]
    pub const fn selection(&self) -> &CheckoutSelection {
        &self.selection
    }

    #[must_use]
    pub const fn payment(&self) -> Option<&PaymentReceipt> {
        self.payment.as_ref()
    }

    /// Orders created so far, including those of a partially failed batch.
    #[must_use]
    pub fn placed_orders(&self) -> &[PlacedOrder] {
        &self.placed
    }

    fn advance(&mut self, next: CheckoutPhase) -> Result<(), CheckoutError> {
        if !self.phase.can_transition_to(next) {
            return Err(CheckoutError::InvalidTransition {
                from: self.phase,
                to: next,
            });
        }
        tracing::debug!(from = ?self.phase, to = ?next, "Checkout phase changed");
        self.phase = next;
        Ok(())
    }
}

/// Summary of a completed checkout.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutReceipt {
    pub phase: CheckoutPhase,
    pub totals: CartTotals,
    pub payment_id: String,
    pub orders: Vec<PlacedOrder>,
}

/// Drives [`CheckoutAttempt`]s through payment, order creation and cart
/// reconciliation.
#[derive(Clone)]
pub struct CheckoutFlow {
    orders: Arc<dyn OrderGateway>,
    payments: Arc<dyn PaymentGateway>,
}

impl CheckoutFlow {
    #[must_use]
    pub fn new(orders: Arc<dyn OrderGateway>, payments: Arc<dyn PaymentGateway>) -> Self {
        Self { orders, payments }
    }

    /// Collect payment for the attempt's payable total.
    ///
    /// # Errors
    ///
    /// Missing consents and an empty or free selection are rejected before
    /// the payment gateway is called. A declined payment moves the attempt to
    /// [`CheckoutPhase::PaymentFailed`].
    #[instrument(skip_all, fields(source = ?attempt.selection.source()))]
    pub async fn pay(
        &self,
        attempt: &mut CheckoutAttempt,
        consents: &Consents,
    ) -> Result<(), CheckoutError> {
        consents.satisfied_for(attempt.selection.purchase_mode())?;
        if attempt.phase != CheckoutPhase::Staged {
            return Err(CheckoutError::InvalidTransition {
                from: attempt.phase,
                to: CheckoutPhase::PaymentPending,
            });
        }
        if attempt.selection.totals().payable().is_zero() {
            return Err(CheckoutError::NothingPurchasable);
        }

        let request = PaymentRequest::for_selection(&attempt.selection);
        attempt.advance(CheckoutPhase::PaymentPending)?;
        add_breadcrumb(
            "checkout",
            "Payment requested",
            Some(&[("payment_id", request.payment_id.as_str())]),
        );

        match self.payments.request_payment(&request).await {
            Ok(receipt) => {
                info!(payment_id = %receipt.payment_id, amount = %request.amount, "Payment confirmed");
                attempt.advance(CheckoutPhase::PaymentConfirmed)?;
                attempt.payment = Some(receipt);
                Ok(())
            }
            Err(failure) => {
                warn!(payment_id = %request.payment_id, error = %failure, "Payment failed");
                attempt.advance(CheckoutPhase::PaymentFailed)?;
                Err(CheckoutError::Payment(failure))
            }
        }
    }

    /// Create one order per staged line, concurrently.
    ///
    /// # Errors
    ///
    /// If any line fails the attempt moves to
    /// [`CheckoutPhase::OrderSubmitFailed`]; orders that were created are
    /// kept on the attempt and reported in the error, not cancelled.
    #[instrument(skip_all, fields(lines = attempt.selection.items().len()))]
    pub async fn submit_orders(
        &self,
        attempt: &mut CheckoutAttempt,
        token: &AccessToken,
    ) -> Result<(), CheckoutError> {
        attempt.advance(CheckoutPhase::OrderSubmitting)?;

        let lines: Vec<OrderLine> = attempt
            .selection
            .items()
            .iter()
            .map(OrderLine::for_item)
            .collect();
        let results = join_all(
            lines
                .iter()
                .map(|line| self.orders.create_order(token, std::slice::from_ref(line))),
        )
        .await;

        let mut failures = Vec::new();
        for (line, result) in lines.iter().zip(results) {
            match result {
                Ok(order) => attempt.placed.push(order),
                Err(e) => {
                    warn!(product_id = %line.product_id, error = %e, "Order line failed");
                    failures.push(e.into_failure(messages::ORDER_FAILED));
                }
            }
        }

        let Some(failure) = failures.first().cloned() else {
            attempt.advance(CheckoutPhase::OrderConfirmed)?;
            add_breadcrumb("checkout", "Orders placed", None);
            info!(orders = attempt.placed.len(), "All orders placed");
            return Ok(());
        };

        attempt.advance(CheckoutPhase::OrderSubmitFailed)?;
        error!(
            failed = failures.len(),
            placed = attempt.placed.len(),
            placed_ids = ?attempt.placed.iter().map(|o| o.id.as_i64()).collect::<Vec<_>>(),
            "Order batch partially failed"
        );
        Err(CheckoutError::OrdersFailed {
            placed: attempt.placed.clone(),
            failed: failures.len(),
            failure,
        })
    }

    /// Remove purchased rows from the cart and re-fetch it.
    ///
    /// Buy-now attempts have no cart rows and stay at
    /// [`CheckoutPhase::OrderConfirmed`].
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::InvalidTransition`] unless every order was
    /// placed.
    #[instrument(skip_all)]
    pub async fn reconcile(
        &self,
        attempt: &mut CheckoutAttempt,
        store: &mut CartStore,
        token: &AccessToken,
    ) -> Result<(), CheckoutError> {
        if attempt.phase != CheckoutPhase::OrderConfirmed {
            return Err(CheckoutError::InvalidTransition {
                from: attempt.phase,
                to: CheckoutPhase::Reconciled,
            });
        }
        if attempt.selection.source() == CheckoutSource::BuyNow {
            return Ok(());
        }

        store
            .reconcile_purchased(token, &attempt.selection.ids())
            .await;
        attempt.advance(CheckoutPhase::Reconciled)
    }

    /// Pay, place the orders and reconcile the cart.
    ///
    /// # Errors
    ///
    /// Any failing step ends the attempt; the cart is only touched after
    /// every order was placed.
    pub async fn run(
        &self,
        attempt: &mut CheckoutAttempt,
        store: &mut CartStore,
        token: &AccessToken,
        consents: &Consents,
    ) -> Result<CheckoutReceipt, CheckoutError> {
        self.pay(attempt, consents).await?;
        self.submit_orders(attempt, token).await?;
        self.reconcile(attempt, store, token).await?;

        Ok(CheckoutReceipt {
            phase: attempt.phase,
            totals: attempt.selection.totals(),
            payment_id: attempt
                .payment
                .as_ref()
                .map(|receipt| receipt.payment_id.clone())
                .unwrap_or_default(),
            orders: attempt.placed.clone(),
        })
    }
}
