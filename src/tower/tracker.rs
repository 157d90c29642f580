//! Keyed store of validator towers.
//!
//! Each validator's tower sits behind its own mutex, so updates for different
//! validators never contend. The outer map is write-locked only to insert a
//! tower on a validator's first vote or to evict idle ones.

use crate::core::{now, Timestamp, ValidatorId};
use crate::tower::outcome::UpdateOutcome;
use crate::tower::state::{Tower, TowerSnapshot};
use crate::vote::Vote;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

type TowerCell = Arc<Mutex<Tower>>;

/// Authoritative tower state for every observed validator.
#[derive(Default)]
pub struct TowerTracker {
    towers: RwLock<HashMap<ValidatorId, TowerCell>>,
}

impl TowerTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    fn cell(&self, validator_id: &ValidatorId) -> TowerCell {
        if let Some(cell) = self.towers.read().get(validator_id) {
            return cell.clone();
        }
        self.towers
            .write()
            .entry(*validator_id)
            .or_insert_with(|| Arc::new(Mutex::new(Tower::new(*validator_id))))
            .clone()
    }

    /// Apply a vote to its validator's tower, creating the tower if needed.
    pub fn apply(&self, vote: &Vote) -> UpdateOutcome {
        let cell = self.cell(&vote.validator_id);
        let mut tower = cell.lock();
        tower.apply(vote)
    }

    /// Copy of a validator's tower, if one exists.
    pub fn snapshot(&self, validator_id: &ValidatorId) -> Option<TowerSnapshot> {
        let cell = self.towers.read().get(validator_id).cloned()?;
        let tower = cell.lock();
        Some(tower.snapshot())
    }

    /// Number of validators with a tower.
    pub fn validator_count(&self) -> usize {
        self.towers.read().len()
    }

    /// Drop towers whose last accepted vote is older than `max_idle`.
    ///
    /// Returns the number of towers evicted.
    pub fn evict_idle(&self, max_idle: chrono::Duration) -> usize {
        self.evict_idle_at(now(), max_idle)
    }

    fn evict_idle_at(&self, at: Timestamp, max_idle: chrono::Duration) -> usize {
        let mut towers = self.towers.write();
        let before = towers.len();
        towers.retain(|_, cell| {
            // A tower mid-update is in use and therefore not idle
            match cell.try_lock() {
                Some(tower) => tower.last_vote_at().map_or(true, |t| at - t <= max_idle),
                None => true,
            }
        });
        before - towers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vote::types::fixtures::vote;
    use std::thread;

    #[test]
    fn test_tower_created_lazily() {
        let tracker = TowerTracker::new();
        let id = ValidatorId::new([1; 32]);
        assert!(tracker.snapshot(&id).is_none());
        assert!(tracker.apply(&vote(1, 10, 0, 1, &[])).is_accepted());
        assert_eq!(tracker.validator_count(), 1);
        assert_eq!(tracker.snapshot(&id).unwrap().entries.len(), 1);
    }

    #[test]
    fn test_validators_are_independent() {
        let tracker = TowerTracker::new();
        tracker.apply(&vote(1, 10, 0, 1, &[8]));
        // Validator 2 voting an unrelated fork is not judged against validator 1
        assert!(tracker.apply(&vote(2, 9, 1, 1, &[5, 6])).is_accepted());
        assert_eq!(tracker.validator_count(), 2);
    }

    #[test]
    fn test_concurrent_updates_for_distinct_validators() {
        let tracker = Arc::new(TowerTracker::new());
        let handles: Vec<_> = (1..=8u8)
            .map(|validator| {
                let tracker = tracker.clone();
                thread::spawn(move || {
                    let mut history = Vec::new();
                    for slot in 1..=50u64 {
                        assert!(tracker.apply(&vote(validator, slot, 0, 1, &history)).is_accepted());
                        history.push(slot);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(tracker.validator_count(), 8);
        for validator in 1..=8u8 {
            let snapshot = tracker.snapshot(&ValidatorId::new([validator; 32])).unwrap();
            assert_eq!(snapshot.top().unwrap().slot, 50);
        }
    }

    #[test]
    fn test_evict_idle() {
        let tracker = TowerTracker::new();
        tracker.apply(&vote(1, 10, 0, 1, &[]));
        let later = now() + chrono::Duration::hours(2);
        assert_eq!(tracker.evict_idle_at(later, chrono::Duration::hours(1)), 1);
        assert_eq!(tracker.validator_count(), 0);
    }
}
