//! Key-set and ordering deltas between two snapshots.

use std::collections::BTreeSet;

use crate::snapshot::Snapshot;

/// Difference between two property lists.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Diff {
    pub added: BTreeSet<String>,
    pub removed: BTreeSet<String>,
    /// True only for a non-identical permutation of the same key set.
    pub order_changed: bool,
}

impl Diff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && !self.order_changed
    }

    pub fn has_key_changes(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }

    /// Drop `key` from both sides, e.g. the discriminator, whose changes are
    /// handled by the category protocol instead.
    pub fn without_key(mut self, key: &str) -> Self {
        self.added.remove(key);
        self.removed.remove(key);
        self
    }
}

/// Diff the header order of two snapshots of the same document. Reserved
/// revision properties are never part of a snapshot's order.
pub fn compute_diff(prev: &Snapshot, next: &Snapshot) -> Diff {
    diff_orders(&prev.order, &next.order)
}

/// Diff two ordered key lists. Duplicates are ignored for set membership.
pub fn diff_orders(prev: &[String], next: &[String]) -> Diff {
    let prev_set: BTreeSet<String> = prev.iter().cloned().collect();
    let next_set: BTreeSet<String> = next.iter().cloned().collect();

    let added: BTreeSet<String> = next_set.difference(&prev_set).cloned().collect();
    let removed: BTreeSet<String> = prev_set.difference(&next_set).cloned().collect();

    let order_changed = if prev == next {
        false
    } else {
        added.is_empty() && removed.is_empty() && prev.len() == next.len()
    };

    Diff {
        added,
        removed,
        order_changed,
    }
}
