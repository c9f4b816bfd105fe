use std::collections::BTreeSet;

use crate::cache::FeedCache;
use crate::item::{Item, ItemId, StatusUpdate};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    pub settled: Vec<ItemId>,
    pub pending: BTreeSet<ItemId>,
}

pub fn partition<'a>(items: impl IntoIterator<Item = &'a Item>) -> Partition {
    let mut out = Partition::default();
    for item in items {
        if item.ingestion.is_settled() {
            out.settled.push(item.id);
        } else {
            out.pending.insert(item.id);
        }
    }
    out
}

/// Tracks which displayed items still wait on processing.
#[derive(Debug, Clone, Default)]
pub struct IngestionGate {
    pending: BTreeSet<ItemId>,
}

impl IngestionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute the pending set from the displayed items. Returns the new
    /// partition when its pending set differs from the one the poller
    /// currently watches.
    pub fn sync<'a>(&mut self, items: impl IntoIterator<Item = &'a Item>) -> Option<Partition> {
        let next = partition(items);
        if next.pending == self.pending {
            return None;
        }
        self.pending = next.pending.clone();
        Some(next)
    }

    /// Apply a poller report. Updates outside the pending set are ignored;
    /// an id leaves the set once its status is settled.
    pub fn apply(&mut self, update: StatusUpdate, cache: &mut FeedCache) -> bool {
        if !self.pending.contains(&update.id) {
            return false;
        }
        let changed = cache.set_status(update.id, update.ingestion);
        if update.ingestion.is_settled() {
            self.pending.remove(&update.id);
        }
        changed
    }

    pub fn pending(&self) -> &BTreeSet<ItemId> {
        &self.pending
    }
}
