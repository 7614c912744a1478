//! Checkout: staging a purchase, paying for it, placing the orders and
//! reconciling the cart.
//!
//! # Flow
//!
//! 1. [`CheckoutSelection`] freezes what is being bought, either from the
//!    cart ([`CartStore::stage_checkout`](crate::cart::CartStore::stage_checkout))
//!    or from a buy-now link ([`BuyNowRequest`])
//! 2. [`CheckoutFlow::run`] requests payment through a [`PaymentGateway`]
//! 3. One order is created per staged line, all concurrently
//! 4. Cart-sourced checkouts remove the purchased rows and re-fetch

mod flow;
mod payment;
mod staging;

pub use flow::{CheckoutAttempt, CheckoutFlow, CheckoutReceipt};
pub use payment::{
    PayMethod, PaymentFailure, PaymentGateway, PaymentReceipt, PaymentRequest, RecordedPayment,
};
pub use staging::{BuyNowRequest, CheckoutSelection, CheckoutSource, Consents};

use thiserror::Error;

use kibble_core::CheckoutPhase;

use crate::api::{ApiFailure, PlacedOrder};

/// Errors that end a checkout attempt.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Nothing in the selection can be bought.
    #[error("No purchasable items selected")]
    NothingPurchasable,

    /// No checkout has been staged.
    #[error("No checkout staged")]
    NotStaged,

    /// A buy-now link is missing or has a malformed parameter.
    #[error("Invalid buy-now parameter {field}: {reason}")]
    InvalidBuyNow { field: &'static str, reason: String },

    /// A required agreement was not given.
    #[error("Required agreement missing: {0}")]
    ConsentMissing(&'static str),

    /// The attempt is not in a phase that allows this step.
    #[error("Cannot move checkout from {from:?} to {to:?}")]
    InvalidTransition {
        from: CheckoutPhase,
        to: CheckoutPhase,
    },

    /// Payment was cancelled or declined.
    #[error("Payment failed: {0}")]
    Payment(PaymentFailure),

    /// At least one per-line order could not be created.
    ///
    /// Orders in `placed` exist server-side and are not cancelled.
    #[error("{} of {} orders failed: {}", .failed, .failed + .placed.len(), .failure)]
    OrdersFailed {
        placed: Vec<PlacedOrder>,
        failed: usize,
        failure: ApiFailure,
    },
}
