//! Payment seam.
//!
//! The payment provider's window runs outside this crate. A
//! [`PaymentGateway`] turns a [`PaymentRequest`] into either a receipt or a
//! failure; cancellation by the buyer is a failure like any other.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use kibble_core::Price;

use super::CheckoutSelection;

/// Payment method offered at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayMethod {
    #[default]
    Card,
}

/// One payment to collect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentRequest {
    /// Unique per attempt: `payment-<uuid>`.
    pub payment_id: String,
    pub order_name: String,
    /// Payable amount after discount, in won.
    pub amount: Price,
    pub method: PayMethod,
}

impl PaymentRequest {
    /// Build the request for a staged checkout, charging its payable total.
    #[must_use]
    pub fn for_selection(selection: &CheckoutSelection) -> Self {
        Self {
            payment_id: format!("payment-{}", Uuid::new_v4()),
            order_name: selection.order_name(),
            amount: Price::won(selection.totals().payable()),
            method: PayMethod::Card,
        }
    }
}

/// Proof that a payment went through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub payment_id: String,
    /// Provider-side transaction reference, when reported.
    pub transaction_id: Option<String>,
}

/// Cancelled or declined payment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct PaymentFailure {
    /// Provider error code; absent for plain cancellation.
    pub code: Option<String>,
    pub message: String,
}

impl fmt::Display for PaymentFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{} ({code})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Collects payment for a checkout.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Request payment and wait for the buyer to finish or abandon it.
    async fn request_payment(
        &self,
        request: &PaymentRequest,
    ) -> Result<PaymentReceipt, PaymentFailure>;
}

/// A payment the buyer already completed in the provider's window,
/// identified by its transaction reference.
#[derive(Debug, Clone)]
pub struct RecordedPayment {
    transaction_id: String,
}

impl RecordedPayment {
    #[must_use]
    pub fn new(transaction_id: impl Into<String>) -> Self {
        Self {
            transaction_id: transaction_id.into(),
        }
    }
}

#[async_trait]
impl PaymentGateway for RecordedPayment {
    async fn request_payment(
        &self,
        request: &PaymentRequest,
    ) -> Result<PaymentReceipt, PaymentFailure> {
        if self.transaction_id.trim().is_empty() {
            return Err(PaymentFailure {
                code: None,
                message: "Payment was cancelled".to_string(),
            });
        }
        tracing::info!(
            payment_id = %request.payment_id,
            amount = %request.amount,
            "Recorded external payment"
        );
        Ok(PaymentReceipt {
            payment_id: request.payment_id.clone(),
            transaction_id: Some(self.transaction_id.clone()),
        })
    }
}
