//! Slot ancestry index built from slot notifications.
//!
//! Vote payloads carry only the slots of their own transaction. The index
//! remembers the parent of every recently created slot above the latest root
//! so the pipeline can extend a vote's history back along its fork.

use crate::core::Slot;
use crate::vote::decoder::SlotUpdate;
use std::collections::BTreeMap;

/// Maximum number of slots whose parent is remembered.
pub const MAX_TRACKED_SLOTS: usize = 10 * 1_024;

/// Maximum number of ancestors returned for a single slot.
pub const MAX_TRACKED_ANCESTORS: usize = 10 * 1_024;

/// Outcome of recording a slot notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Recorded {
    /// The slot was new
    Inserted,
    /// The slot was already known; the notification was ignored
    Duplicate,
}

/// Parent links for recently observed slots.
#[derive(Debug)]
pub struct AncestryIndex {
    parents: BTreeMap<Slot, Slot>,
    capacity: usize,
    latest_root: Option<Slot>,
}

impl AncestryIndex {
    /// Create an index bounded to `capacity` slots.
    pub fn new(capacity: usize) -> Self {
        Self {
            parents: BTreeMap::new(),
            capacity: capacity.max(1),
            latest_root: None,
        }
    }

    /// Record a slot notification, evicting the oldest slots beyond capacity.
    ///
    /// A root advance prunes every parent link below the new root.
    pub fn record(&mut self, update: SlotUpdate) -> Recorded {
        if self.latest_root.map_or(true, |root| update.root > root) {
            self.latest_root = Some(update.root);
            self.parents = self.parents.split_off(&update.root);
        }
        if self.parents.contains_key(&update.slot) {
            return Recorded::Duplicate;
        }
        self.parents.insert(update.slot, update.parent);
        while self.parents.len() > self.capacity {
            self.parents.pop_first();
        }
        Recorded::Inserted
    }

    /// Whether the parent of `slot` is known.
    pub fn contains(&self, slot: Slot) -> bool {
        self.parents.contains_key(&slot)
    }

    /// Ancestors of `slot`, nearest first, up to `limit` entries. The walk
    /// ends at the latest root.
    ///
    /// Returns `None` when the slot itself was never observed.
    pub fn ancestors(&self, slot: Slot, limit: usize) -> Option<Vec<Slot>> {
        let mut current = *self.parents.get(&slot)?;
        let floor = self.latest_root.unwrap_or(0);
        let mut out = Vec::new();
        while out.len() < limit {
            out.push(current);
            if current <= floor {
                break;
            }
            match self.parents.get(&current) {
                Some(parent) => current = *parent,
                None => break,
            }
        }
        Some(out)
    }

    /// Highest root reported by the data source.
    pub fn latest_root(&self) -> Option<Slot> {
        self.latest_root
    }

    /// Number of tracked slots.
    pub fn len(&self) -> usize {
        self.parents.len()
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }
}

impl Default for AncestryIndex {
    fn default() -> Self {
        Self::new(MAX_TRACKED_SLOTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(slot: Slot, parent: Slot) -> SlotUpdate {
        SlotUpdate { slot, parent, root: 0 }
    }

    #[test]
    fn test_ancestors_walk_parent_links() {
        let mut index = AncestryIndex::default();
        index.record(update(2, 1));
        index.record(update(3, 2));
        index.record(update(5, 3));
        assert_eq!(index.ancestors(5, 10), Some(vec![3, 2, 1]));
        assert_eq!(index.ancestors(5, 2), Some(vec![3, 2]));
        assert_eq!(index.ancestors(4, 10), None);
    }

    #[test]
    fn test_duplicate_is_ignored() {
        let mut index = AncestryIndex::default();
        assert_eq!(index.record(update(2, 1)), Recorded::Inserted);
        assert_eq!(index.record(update(2, 0)), Recorded::Duplicate);
        assert_eq!(index.ancestors(2, 10), Some(vec![1]));
    }

    #[test]
    fn test_walk_stops_at_root() {
        let mut index = AncestryIndex::default();
        for slot in 1..=2_000u64 {
            index.record(SlotUpdate {
                slot,
                parent: slot - 1,
                root: slot.saturating_sub(32),
            });
        }
        assert_eq!(index.latest_root(), Some(1_968));
        assert!(!index.contains(1_967));

        let ancestors = index.ancestors(2_000, MAX_TRACKED_ANCESTORS).unwrap();
        assert_eq!(ancestors.len(), 32);
        assert_eq!(ancestors.first(), Some(&1_999));
        assert_eq!(ancestors.last(), Some(&1_968));
    }

    #[test]
    fn test_stale_root_does_not_regress() {
        let mut index = AncestryIndex::default();
        index.record(SlotUpdate { slot: 10, parent: 9, root: 5 });
        index.record(SlotUpdate { slot: 11, parent: 10, root: 3 });
        assert_eq!(index.latest_root(), Some(5));
        assert_eq!(index.ancestors(11, 10), Some(vec![10, 9]));
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut index = AncestryIndex::new(2);
        index.record(update(2, 1));
        index.record(update(3, 2));
        index.record(update(4, 3));
        assert_eq!(index.len(), 2);
        assert!(!index.contains(2));
        assert_eq!(index.ancestors(4, 10), Some(vec![3, 2]));
    }
}
