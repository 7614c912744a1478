//! Status enums for the checkout lifecycle.

use serde::{Deserialize, Serialize};

/// Phase of a single checkout attempt.
///
/// ```text
/// Staged -> PaymentPending -> PaymentConfirmed -> OrderSubmitting -> OrderConfirmed -> Reconciled
///                          \-> PaymentFailed                      \-> OrderSubmitFailed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutPhase {
    #[default]
    Staged,
    PaymentPending,
    PaymentConfirmed,
    PaymentFailed,
    OrderSubmitting,
    OrderConfirmed,
    OrderSubmitFailed,
    Reconciled,
}

impl CheckoutPhase {
    /// Whether moving from `self` to `next` is a legal transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Staged, Self::PaymentPending)
                | (
                    Self::PaymentPending,
                    Self::PaymentConfirmed | Self::PaymentFailed
                )
                | (Self::PaymentConfirmed, Self::OrderSubmitting)
                | (
                    Self::OrderSubmitting,
                    Self::OrderConfirmed | Self::OrderSubmitFailed
                )
                | (Self::OrderConfirmed, Self::Reconciled)
        )
    }

    /// Whether no further transition can happen.
    ///
    /// `OrderConfirmed` is terminal only for checkouts that have no cart to
    /// reconcile, so it is not listed here.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::PaymentFailed | Self::OrderSubmitFailed | Self::Reconciled
        )
    }

    /// Whether the attempt ended in failure.
    #[must_use]
    pub const fn is_failure(self) -> bool {
        matches!(self, Self::PaymentFailed | Self::OrderSubmitFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        let path = [
            CheckoutPhase::Staged,
            CheckoutPhase::PaymentPending,
            CheckoutPhase::PaymentConfirmed,
            CheckoutPhase::OrderSubmitting,
            CheckoutPhase::OrderConfirmed,
            CheckoutPhase::Reconciled,
        ];
        for pair in path.windows(2) {
            if let [from, to] = pair {
                assert!(from.can_transition_to(*to), "{from:?} -> {to:?}");
            }
        }
    }

    #[test]
    fn test_failure_branches() {
        assert!(CheckoutPhase::PaymentPending.can_transition_to(CheckoutPhase::PaymentFailed));
        assert!(
            CheckoutPhase::OrderSubmitting.can_transition_to(CheckoutPhase::OrderSubmitFailed)
        );
        assert!(CheckoutPhase::PaymentFailed.is_failure());
        assert!(CheckoutPhase::OrderSubmitFailed.is_terminal());
    }

    #[test]
    fn test_illegal_transitions() {
        assert!(!CheckoutPhase::Staged.can_transition_to(CheckoutPhase::OrderSubmitting));
        assert!(!CheckoutPhase::PaymentFailed.can_transition_to(CheckoutPhase::PaymentPending));
        assert!(!CheckoutPhase::OrderSubmitFailed.can_transition_to(CheckoutPhase::Reconciled));
        assert!(!CheckoutPhase::Reconciled.can_transition_to(CheckoutPhase::Staged));
    }

    #[test]
    fn test_serde_snake_case() {
        assert_eq!(
            serde_json::to_string(&CheckoutPhase::OrderSubmitFailed).ok(),
            Some("\"order_submit_failed\"".to_string())
        );
    }
}
