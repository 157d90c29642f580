//! Per-validator lockout stack and its update rule.
//!
//! [`Tower::outcome_of`] is a pure function of the current stack and a new vote.
//! [`Tower::apply`] evaluates first and only mutates on acceptance, so a
//! violating or rejected vote leaves the tower exactly as it was.

use crate::core::{Slot, Timestamp, TxSignature, ValidatorId};
use crate::tower::entry::{TowerEntry, MAX_LOCKOUT_HISTORY};
use crate::tower::outcome::{RejectReason, UpdateOutcome, Violation};
use crate::vote::Vote;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};

/// Maximum number of slots kept in a tower's lineage.
pub const MAX_LINEAGE: usize = 10 * 1_024;

/// Maximum number of accepted vote transactions remembered for reports.
pub const MAX_RECENT_VOTES: usize = 64;

/// An accepted vote transaction, kept for incident reports.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentVote {
    pub slot: Slot,
    pub signature: TxSignature,
}

/// Immutable copy of a tower, attached to incidents as evidence.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TowerSnapshot {
    /// Owning validator
    pub validator_id: ValidatorId,
    /// Stack entries, bottom first
    pub entries: Vec<TowerEntry>,
    /// Highest slot rooted out of the stack
    pub root: Option<Slot>,
    /// Known ancestors of the top entry, ascending
    pub lineage: Vec<Slot>,
    /// Recently accepted vote transactions, oldest first
    pub recent_votes: Vec<RecentVote>,
}

impl TowerSnapshot {
    /// Topmost entry.
    pub fn top(&self) -> Option<&TowerEntry> {
        self.entries.last()
    }
}

/// Result of evaluating a vote before any mutation.
enum Evaluation {
    Accept { keep: usize },
    Violate { conflicting: Vec<TowerEntry> },
    Reject(RejectReason),
}

/// A validator's stack of lockout-protected votes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tower {
    validator_id: ValidatorId,
    /// Entries ordered by strictly increasing slot, bottom first
    entries: Vec<TowerEntry>,
    root: Option<Slot>,
    lineage: BTreeSet<Slot>,
    recent_votes: VecDeque<RecentVote>,
    last_vote_at: Option<Timestamp>,
}

impl Tower {
    /// Create an empty tower.
    pub fn new(validator_id: ValidatorId) -> Self {
        Self {
            validator_id,
            entries: Vec::new(),
            root: None,
            lineage: BTreeSet::new(),
            recent_votes: VecDeque::new(),
            last_vote_at: None,
        }
    }

    /// Owning validator.
    pub fn validator_id(&self) -> &ValidatorId {
        &self.validator_id
    }

    /// Stack entries, bottom first.
    pub fn entries(&self) -> &[TowerEntry] {
        &self.entries
    }

    /// Topmost entry.
    pub fn top(&self) -> Option<&TowerEntry> {
        self.entries.last()
    }

    /// Slot of the topmost entry.
    pub fn last_voted_slot(&self) -> Option<Slot> {
        self.top().map(|e| e.slot)
    }

    /// Highest slot rooted out of the stack.
    pub fn root(&self) -> Option<Slot> {
        self.root
    }

    /// Receipt time of the last accepted vote.
    pub fn last_vote_at(&self) -> Option<Timestamp> {
        self.last_vote_at
    }

    /// Copy the tower for evidence or diagnostics.
    pub fn snapshot(&self) -> TowerSnapshot {
        TowerSnapshot {
            validator_id: self.validator_id,
            entries: self.entries.clone(),
            root: self.root,
            lineage: self.lineage.iter().copied().collect(),
            recent_votes: self.recent_votes.iter().cloned().collect(),
        }
    }

    /// Decide what `vote` would do to this tower without changing it.
    pub fn outcome_of(&self, vote: &Vote) -> UpdateOutcome {
        match self.evaluate(vote) {
            Evaluation::Accept { keep } => UpdateOutcome::Accepted {
                expired: self.entries[keep..].iter().rev().cloned().collect(),
                rooted: (keep + 1 > MAX_LOCKOUT_HISTORY).then(|| self.entries[0].clone()),
            },
            Evaluation::Violate { conflicting } => self.violation(vote, conflicting),
            Evaluation::Reject(reason) => UpdateOutcome::Rejected(reason),
        }
    }

    /// Apply `vote`, pushing it when legal.
    pub fn apply(&mut self, vote: &Vote) -> UpdateOutcome {
        match self.evaluate(vote) {
            Evaluation::Accept { keep } => self.commit(vote, keep),
            Evaluation::Violate { conflicting } => self.violation(vote, conflicting),
            Evaluation::Reject(reason) => UpdateOutcome::Rejected(reason),
        }
    }

    fn violation(&self, vote: &Vote, conflicting: Vec<TowerEntry>) -> UpdateOutcome {
        UpdateOutcome::Violated(Box::new(Violation {
            violating_vote: vote.clone(),
            conflicting_entries: conflicting,
            prior_tower: self.snapshot(),
        }))
    }

    fn evaluate(&self, vote: &Vote) -> Evaluation {
        match self.top() {
            Some(top) if vote.slot <= top.slot => self.evaluate_non_advancing(vote, top.slot),
            _ => self.evaluate_advancing(vote),
        }
    }

    /// Walk from the top, popping expired entries until the first live
    /// entry the vote confirms. Live entries the vote does not confirm are
    /// conflicting when its history covers their slot, unknown otherwise.
    fn evaluate_advancing(&self, vote: &Vote) -> Evaluation {
        let floor = vote.history_floor();
        let mut conflicting = Vec::new();
        let mut unreconciled = Vec::new();
        let mut keep = 0;

        for (index, entry) in self.entries.iter().enumerate().rev() {
            if entry.is_expired_at(vote.slot) {
                continue;
            }
            if vote.builds_on(entry.slot) {
                keep = index + 1;
                break;
            }
            match floor {
                Some(floor) if entry.slot >= floor => conflicting.push(entry.clone()),
                _ => unreconciled.push(entry.slot),
            }
        }

        if !conflicting.is_empty() {
            Evaluation::Violate { conflicting }
        } else if !unreconciled.is_empty() {
            Evaluation::Reject(RejectReason::UnknownAncestry { unreconciled })
        } else {
            Evaluation::Accept { keep }
        }
    }

    /// A vote at or below the top slot is stale unless the tower can prove
    /// it sits on a different fork than the locked entries above it.
    fn evaluate_non_advancing(&self, vote: &Vote, top_slot: Slot) -> Evaluation {
        let stale = Evaluation::Reject(RejectReason::StaleVote { top_slot });

        if let Some(same_slot) = self.entries.iter().find(|e| e.slot == vote.slot) {
            if same_slot.hash == vote.hash {
                return stale;
            }
            // Two different blocks voted at one slot
            return Evaluation::Violate {
                conflicting: self.live_entries_from(vote.slot),
            };
        }

        if self.lineage.contains(&vote.slot) {
            return stale;
        }

        match self.lineage.first() {
            Some(floor) if vote.slot >= *floor => Evaluation::Violate {
                conflicting: self.live_entries_from(vote.slot),
            },
            _ => stale,
        }
    }

    /// Entries at or above `slot` still locked at `slot`, top first.
    fn live_entries_from(&self, slot: Slot) -> Vec<TowerEntry> {
        self.entries
            .iter()
            .rev()
            .take_while(|e| e.slot >= slot)
            .filter(|e| !e.is_expired_at(slot))
            .cloned()
            .collect()
    }

    fn commit(&mut self, vote: &Vote, keep: usize) -> UpdateOutcome {
        let previous_top = self.last_voted_slot();
        let expired: Vec<TowerEntry> = self.entries.drain(keep..).rev().collect();

        // Ancestors of the old top stay valid only up to the newest retained entry
        match self.top().map(|e| e.slot) {
            Some(retained) if previous_top == Some(retained) => {}
            Some(retained) => {
                let _ = self.lineage.split_off(&(retained + 1));
            }
            None => self.lineage.clear(),
        }

        for entry in self.entries.iter_mut() {
            if let Some(reported) = vote.reported_lockouts.iter().find(|l| l.slot == entry.slot) {
                entry.confirmation_count = reported.confirmation_count;
            }
        }

        self.entries
            .push(TowerEntry::new(vote.slot, vote.hash, vote.confirmation_count));

        let rooted = if self.entries.len() > MAX_LOCKOUT_HISTORY {
            let bottom = self.entries.remove(0);
            self.root = Some(self.root.map_or(bottom.slot, |r| r.max(bottom.slot)));
            Some(bottom)
        } else {
            None
        };
        if !vote.confirmations_reported {
            self.double_lockouts();
        }

        self.lineage.extend(vote.slot_history.iter().copied());
        self.lineage.extend(self.entries.iter().map(|e| e.slot));
        while self.lineage.len() > MAX_LINEAGE {
            self.lineage.pop_first();
        }

        self.recent_votes.push_back(RecentVote {
            slot: vote.slot,
            signature: vote.transaction_signature,
        });
        let bottom = self.entries.first().map(|e| e.slot).unwrap_or(vote.slot);
        while self.recent_votes.len() > MAX_RECENT_VOTES
            || self.recent_votes.front().is_some_and(|v| v.slot < bottom)
        {
            self.recent_votes.pop_front();
        }

        self.last_vote_at = Some(vote.observed_at);

        UpdateOutcome::Accepted { expired, rooted }
    }

    /// Raise the confirmation count of every entry with more votes stacked
    /// on top of it than it has confirmations.
    fn double_lockouts(&mut self) {
        let depth = self.entries.len();
        for (index, entry) in self.entries.iter_mut().enumerate() {
            if depth > index + entry.confirmation_count as usize {
                entry.confirmation_count += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{now, BlockHash};
    use crate::vote::types::fixtures::vote;
    use crate::vote::{decode_vote, ReportedLockout};
    use serde_json::json;

    fn plain_vote(slots: &[Slot], fork: u8) -> Vote {
        let top = slots.iter().max().copied().unwrap_or_default();
        let mut signature = [fork; 64];
        signature[..8].copy_from_slice(&top.to_le_bytes());
        let payload = json!({
            "votePubkey": ValidatorId::new([1; 32]).to_string(),
            "slots": slots,
            "hash": BlockHash::new([fork; 32]).to_string(),
            "signature": TxSignature::new(signature).to_string(),
        });
        decode_vote(&payload.to_string(), now()).unwrap()
    }

    fn tower_with(votes: &[Vote]) -> Tower {
        let mut tower = Tower::new(votes[0].validator_id);
        for v in votes {
            assert!(tower.apply(v).is_accepted(), "setup vote {} rejected", v.slot);
        }
        tower
    }

    fn slots(tower: &Tower) -> Vec<Slot> {
        tower.entries().iter().map(|e| e.slot).collect()
    }

    #[test]
    fn test_first_vote_accepted() {
        let mut tower = Tower::new(ValidatorId::new([1; 32]));
        let outcome = tower.apply(&vote(1, 10, 0, 1, &[]));
        assert!(outcome.is_accepted());
        assert_eq!(slots(&tower), vec![10]);
        assert_eq!(tower.top().unwrap().lockout_expiration_slot(), 12);
    }

    #[test]
    fn test_same_fork_vote_confirms() {
        // Builds on the live top entry
        let mut tower = tower_with(&[vote(1, 10, 0, 1, &[8])]);
        let outcome = tower.apply(&vote(1, 11, 0, 1, &[8, 10]));
        assert_eq!(
            outcome,
            UpdateOutcome::Accepted {
                expired: vec![],
                rooted: None
            }
        );
        assert_eq!(slots(&tower), vec![10, 11]);
    }

    #[test]
    fn test_lower_slot_on_conflicting_fork_violates() {
        // Below the top slot, on a fork whose history excludes slot 10
        let mut tower = tower_with(&[vote(1, 10, 0, 1, &[8])]);
        let before = tower.clone();
        let outcome = tower.apply(&vote(1, 9, 1, 1, &[5, 6]));
        match outcome {
            UpdateOutcome::Violated(violation) => {
                assert_eq!(violation.violating_vote.slot, 9);
                assert_eq!(violation.conflicting_entries.len(), 1);
                assert_eq!(violation.conflicting_entries[0].slot, 10);
                assert_eq!(violation.prior_tower, before.snapshot());
            }
            other => panic!("expected violation, got {:?}", other),
        }
        assert_eq!(tower, before);
    }

    #[test]
    fn test_expired_entry_dropped_on_fork_switch() {
        // Slot 10 expires at 12, so the fork switch at 13 is legal
        let mut tower = tower_with(&[vote(1, 10, 0, 1, &[8])]);
        let outcome = tower.apply(&vote(1, 13, 1, 1, &[9, 11]));
        match outcome {
            UpdateOutcome::Accepted { expired, rooted } => {
                assert_eq!(expired.len(), 1);
                assert_eq!(expired[0].slot, 10);
                assert!(rooted.is_none());
            }
            other => panic!("expected acceptance, got {:?}", other),
        }
        assert_eq!(slots(&tower), vec![13]);
    }

    #[test]
    fn test_higher_slot_conflicting_fork_violates() {
        let mut tower = tower_with(&[vote(1, 10, 0, 3, &[8])]);
        let before = tower.clone();
        // Expires at 18; vote at 14 builds on 9 and 12 but not 10
        let outcome = tower.apply(&vote(1, 14, 1, 1, &[9, 12]));
        assert!(outcome.is_violation());
        assert_eq!(tower, before);
    }

    #[test]
    fn test_unknown_ancestry_rejected_without_mutation() {
        let mut tower = tower_with(&[vote(1, 10, 0, 3, &[8])]);
        let before = tower.clone();
        // History starts above the live entry, so fork membership is unknown
        let outcome = tower.apply(&vote(1, 14, 1, 1, &[12, 13]));
        assert_eq!(
            outcome,
            UpdateOutcome::Rejected(RejectReason::UnknownAncestry {
                unreconciled: vec![10]
            })
        );
        assert_eq!(tower, before);
    }

    #[test]
    fn test_redelivered_vote_is_stale() {
        let first = vote(1, 10, 0, 1, &[8]);
        let mut tower = tower_with(&[first.clone()]);
        let before = tower.clone();
        assert_eq!(
            tower.apply(&first),
            UpdateOutcome::Rejected(RejectReason::StaleVote { top_slot: 10 })
        );
        assert_eq!(tower, before);
        assert_eq!(tower.entries().len(), 1);
    }

    #[test]
    fn test_late_vote_on_same_fork_is_stale() {
        let mut tower = tower_with(&[vote(1, 10, 0, 1, &[7, 8, 9])]);
        let outcome = tower.apply(&vote(1, 9, 0, 1, &[7, 8]));
        assert_eq!(
            outcome,
            UpdateOutcome::Rejected(RejectReason::StaleVote { top_slot: 10 })
        );
    }

    #[test]
    fn test_vote_below_lineage_is_stale() {
        let mut tower = tower_with(&[vote(1, 10, 0, 1, &[8])]);
        let outcome = tower.apply(&vote(1, 4, 1, 1, &[]));
        assert!(matches!(
            outcome,
            UpdateOutcome::Rejected(RejectReason::StaleVote { .. })
        ));
    }

    #[test]
    fn test_equivocation_at_same_slot_violates() {
        let mut tower = tower_with(&[vote(1, 10, 0, 1, &[8]), vote(1, 11, 0, 1, &[8, 10])]);
        let outcome = tower.apply(&vote(1, 10, 1, 1, &[8]));
        match outcome {
            UpdateOutcome::Violated(violation) => {
                let conflicting: Vec<Slot> =
                    violation.conflicting_entries.iter().map(|e| e.slot).collect();
                assert_eq!(conflicting, vec![11, 10]);
            }
            other => panic!("expected violation, got {:?}", other),
        }
    }

    #[test]
    fn test_depth_cap_roots_bottom_entry() {
        let mut tower = Tower::new(ValidatorId::new([1; 32]));
        let mut history = Vec::new();
        for slot in 1..=(MAX_LOCKOUT_HISTORY as u64) {
            assert!(tower.apply(&vote(1, slot, 0, 40, &history)).is_accepted());
            history.push(slot);
        }
        let outcome = tower.apply(&vote(1, 32, 0, 40, &history));
        match outcome {
            UpdateOutcome::Accepted { rooted, .. } => assert_eq!(rooted.map(|e| e.slot), Some(1)),
            other => panic!("expected acceptance, got {:?}", other),
        }
        assert_eq!(tower.entries().len(), MAX_LOCKOUT_HISTORY);
        assert_eq!(tower.root(), Some(1));
    }

    #[test]
    fn test_reported_lockouts_refresh_confirmations() {
        let mut tower = tower_with(&[vote(1, 10, 0, 1, &[8])]);
        let mut next = vote(1, 11, 0, 1, &[8, 10]);
        next.reported_lockouts = vec![ReportedLockout {
            slot: 10,
            confirmation_count: 2,
        }];
        assert!(tower.apply(&next).is_accepted());
        assert_eq!(tower.entries()[0].confirmation_count, 2);
        assert_eq!(tower.entries()[0].lockout_expiration_slot(), 14);
    }

    #[test]
    fn test_unreported_confirmations_grow_with_depth() {
        let mut tower = Tower::new(ValidatorId::new([1; 32]));
        for slot in 100..=110u64 {
            let slots: Vec<Slot> = (100..=slot).collect();
            assert!(tower.apply(&plain_vote(&slots, 0)).is_accepted());
        }
        let counts: Vec<u32> = tower.entries().iter().map(|e| e.confirmation_count).collect();
        assert_eq!(counts, (1..=11).rev().collect::<Vec<u32>>());
        assert_eq!(tower.entries()[8].slot, 108);
        assert_eq!(tower.entries()[8].lockout_expiration_slot(), 116);

        let before = tower.clone();
        let mut fork: Vec<Slot> = (100..=105).collect();
        fork.push(112);
        match tower.apply(&plain_vote(&fork, 1)) {
            UpdateOutcome::Violated(violation) => {
                let conflicting: Vec<Slot> =
                    violation.conflicting_entries.iter().map(|e| e.slot).collect();
                assert_eq!(conflicting, vec![109, 108, 107, 106]);
            }
            other => panic!("expected violation, got {:?}", other),
        }
        assert_eq!(tower, before);
    }

    #[test]
    fn test_reported_confirmations_are_not_doubled() {
        let mut tower = tower_with(&[vote(1, 10, 0, 1, &[8]), vote(1, 11, 0, 1, &[8, 10])]);
        assert!(tower.apply(&vote(1, 12, 0, 1, &[8, 10, 11])).is_accepted());
        assert!(tower.entries().iter().all(|e| e.confirmation_count == 1));
    }

    #[test]
    fn test_outcome_of_does_not_mutate() {
        let tower = tower_with(&[vote(1, 10, 0, 1, &[8])]);
        let before = tower.clone();
        assert!(tower.outcome_of(&vote(1, 13, 1, 1, &[9])).is_accepted());
        assert_eq!(tower, before);
    }

    #[test]
    fn test_replay_is_deterministic() {
        let script = vec![
            vote(1, 10, 0, 1, &[8]),
            vote(1, 11, 0, 1, &[8, 10]),
            vote(1, 9, 1, 1, &[5, 6]),
            vote(1, 11, 0, 1, &[8, 10]),
            vote(1, 20, 2, 1, &[19]),
        ];
        let run = || {
            let mut tower = Tower::new(ValidatorId::new([1; 32]));
            script.iter().map(|v| tower.apply(v)).collect::<Vec<_>>()
        };
        let first = run();
        let second = run();
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            match (a, b) {
                (UpdateOutcome::Violated(x), UpdateOutcome::Violated(y)) => {
                    assert_eq!(x.conflicting_entries, y.conflicting_entries);
                    assert_eq!(x.prior_tower, y.prior_tower);
                }
                _ => assert_eq!(a, b),
            }
        }
    }

    #[test]
    fn test_accepted_sequences_keep_slots_increasing() {
        let mut tower = Tower::new(ValidatorId::new([1; 32]));
        let mut history: Vec<Slot> = Vec::new();
        for slot in [3u64, 4, 6, 9, 10, 15, 40, 41, 70] {
            let outcome = tower.apply(&vote(1, slot, 0, 1, &history));
            if outcome.is_accepted() {
                history.push(slot);
            }
            let entries = tower.entries();
            assert!(entries.windows(2).all(|w| w[0].slot < w[1].slot));
        }
    }
}
