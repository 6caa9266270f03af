//! Explicit last-write-wins resolution.
//!
//! Every candidate carries a [`Priority`]; for each key the highest priority
//! survives. The outcome depends only on the priorities, never on the order
//! in which candidates are offered.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// Rank of a candidate. Batches are ranked up front (historical first, then
/// incremental batches by creation date and label); within a batch later
/// rows outrank earlier ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct Priority {
    pub batch_rank: usize,
    pub row: usize,
}

/// Keeps the highest-priority value per key.
#[derive(Debug)]
pub(crate) struct Resolver<K, V> {
    winners: BTreeMap<K, (Priority, V)>,
    superseded: usize,
}

impl<K: Ord, V> Resolver<K, V> {
    pub fn new() -> Self {
        Self {
            winners: BTreeMap::new(),
            superseded: 0,
        }
    }

    /// Offer a candidate. Returns the value it displaced, if any.
    pub fn offer(&mut self, key: K, priority: Priority, value: V) -> Option<V> {
        match self.winners.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert((priority, value));
                None
            }
            Entry::Occupied(mut slot) => {
                self.superseded += 1;
                if priority > slot.get().0 {
                    let (_, old) = slot.insert((priority, value));
                    Some(old)
                } else {
                    Some(value)
                }
            }
        }
    }

    /// Candidates that lost to another candidate for the same key.
    pub fn superseded(&self) -> usize {
        self.superseded
    }

    /// Winners in key order.
    pub fn into_values(self) -> impl Iterator<Item = V> {
        self.winners.into_values().map(|(_, v)| v)
    }
}
