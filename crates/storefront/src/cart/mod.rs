//! Client-held cart engine.
//!
//! - [`store`] - the snapshot of the remote cart and its only mutation surface
//! - [`selection`] - purchase-mode filtering and view-owned checkbox state
//! - [`pricing`] - totals for a subset of the snapshot
//!
//! Mutations that touch the network are applied optimistically and reported
//! as a [`Mutation`], so callers never need to remember the value they
//! replaced.

pub mod pricing;
pub mod selection;
pub mod store;

pub use pricing::{CartTotals, SUBSCRIPTION_DISCOUNT_RATE, compute_total};
pub use selection::{Selection, items_by_mode};
pub use store::{CartStore, PendingFetch, PendingUpdate};

use thiserror::Error;

use kibble_core::CartItemId;

use crate::api::ApiFailure;

/// Structured failure recorded in [`CartStore::last_error`].
pub type CartFailure = ApiFailure;

/// Local guard rejections. Raised before any network call, leaving the
/// snapshot untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    /// No cart row with this ID in the snapshot.
    #[error("Cart item {0} not found")]
    ItemNotFound(CartItemId),

    /// The product of this row is sold out.
    #[error("Cart item {0} is sold out")]
    SoldOut(CartItemId),

    /// Delivery cycles only apply to subscription rows.
    #[error("Cart item {0} is not a subscription")]
    NotSubscription(CartItemId),
}

/// Outcome of an optimistic mutation once the remote call has resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation<T> {
    /// The remote accepted the change; the optimistic value stands.
    Applied(T),
    /// The remote rejected the change and the previous value was restored.
    RolledBack { previous: T, failure: CartFailure },
    /// The remote rejected the change, but a newer local edit or a re-fetch
    /// already replaced the optimistic value, so nothing was restored.
    Superseded { failure: CartFailure },
    /// The snapshot was torn down before the remote call resolved.
    Discarded,
}

impl<T> Mutation<T> {
    /// Whether the remote accepted the change.
    #[must_use]
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }

    /// The remote failure, if any.
    #[must_use]
    pub const fn failure(&self) -> Option<&CartFailure> {
        match self {
            Self::RolledBack { failure, .. } | Self::Superseded { failure } => Some(failure),
            Self::Applied(_) | Self::Discarded => None,
        }
    }
}
