//! Purchase-mode filtering and checkbox selection.
//!
//! Selection state belongs to the view rendering a mode's listing, not to
//! the store. It is thrown away whenever the listing changes length.

use std::collections::BTreeSet;

use kibble_core::{CartItemId, CartLineItem, PurchaseMode};

/// Items of one purchase mode, in snapshot order.
#[must_use]
pub fn items_by_mode(items: &[CartLineItem], mode: PurchaseMode) -> Vec<&CartLineItem> {
    items
        .iter()
        .filter(|item| item.purchase_mode == mode)
        .collect()
}

/// Set of checked cart rows for one listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    ids: BTreeSet<CartItemId>,
    observed_len: Option<usize>,
}

impl Selection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the current listing length, clearing the selection if it
    /// changed since the last call.
    ///
    /// Returns `true` when the selection was reset.
    pub fn sync(&mut self, len: usize) -> bool {
        let changed = self.observed_len.is_some_and(|seen| seen != len);
        self.observed_len = Some(len);
        if changed {
            self.ids.clear();
        }
        changed
    }

    /// Check or uncheck one row.
    pub fn toggle(&mut self, id: CartItemId) {
        if !self.ids.remove(&id) {
            self.ids.insert(id);
        }
    }

    /// Select-all checkbox: clears a full selection, otherwise selects
    /// every row of `filtered`.
    pub fn toggle_all(&mut self, filtered: &[CartItemId]) {
        if self.ids.len() == filtered.len() {
            self.ids.clear();
        } else {
            self.ids = filtered.iter().copied().collect();
        }
    }

    /// Whether every row of a listing of `len` rows is checked.
    #[must_use]
    pub fn is_all_selected(&self, len: usize) -> bool {
        len > 0 && self.ids.len() == len
    }

    #[must_use]
    pub fn contains(&self, id: CartItemId) -> bool {
        self.ids.contains(&id)
    }

    /// Checked IDs in ascending order.
    #[must_use]
    pub fn ids(&self) -> Vec<CartItemId> {
        self.ids.iter().copied().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }
}
