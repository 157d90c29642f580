//! Normalized vote records.

use crate::core::{BlockHash, Slot, Timestamp, TxSignature, ValidatorId};
use serde::{Deserialize, Serialize};

/// A lockout reported by the validator itself as part of a signed vote.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportedLockout {
    /// Slot of the reported vote
    pub slot: Slot,
    /// Confirmation count the validator holds for it
    pub confirmation_count: u32,
}

/// One observed vote event.
///
/// Constructed by the decoder, consumed by the tower tracker. A vote is only
/// retained beyond that when it becomes evidence in an incident.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    /// Voting validator
    pub validator_id: ValidatorId,
    /// Voted-for slot
    pub slot: Slot,
    /// Bank hash of the voted block
    pub hash: BlockHash,
    /// Confirmation count assigned by the validator
    pub confirmation_count: u32,
    /// Whether the payload carried confirmation counts; otherwise the tower
    /// derives them from stack depth
    #[serde(default)]
    pub confirmations_reported: bool,
    /// Ancestor slots this vote builds on, ascending
    pub slot_history: Vec<Slot>,
    /// Lockouts the validator reported alongside the vote, if any
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reported_lockouts: Vec<ReportedLockout>,
    /// Validator-reported unix timestamp, if published
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validator_timestamp: Option<i64>,
    /// Local receipt time (not protocol time)
    pub observed_at: Timestamp,
    /// Vote transaction signature; the transaction may never finalize
    pub transaction_signature: TxSignature,
}

impl Vote {
    /// Lowest slot covered by this vote's ancestry, if it has any.
    pub fn history_floor(&self) -> Option<Slot> {
        self.slot_history.first().copied()
    }

    /// Whether `slot` is a known ancestor of this vote.
    pub fn builds_on(&self, slot: Slot) -> bool {
        self.slot_history.binary_search(&slot).is_ok()
    }

    /// Merge additional ancestor slots, keeping the history sorted and
    /// deduplicated. Slots at or above the vote slot are ignored.
    pub fn extend_history<I: IntoIterator<Item = Slot>>(&mut self, ancestors: I) {
        let vote_slot = self.slot;
        self.slot_history
            .extend(ancestors.into_iter().filter(|s| *s < vote_slot));
        self.slot_history.sort_unstable();
        self.slot_history.dedup();
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::core::now;

    /// Build a vote for tests with a deterministic signature derived from the slot.
    pub fn vote(validator: u8, slot: Slot, fork: u8, confirmation_count: u32, history: &[Slot]) -> Vote {
        let mut signature = [0u8; 64];
        signature[..8].copy_from_slice(&slot.to_le_bytes());
        signature[8] = fork;
        signature[9] = validator;
        let mut hash = [fork; 32];
        hash[..8].copy_from_slice(&slot.to_le_bytes());
        let mut v = Vote {
            validator_id: ValidatorId::new([validator; 32]),
            slot,
            hash: BlockHash::new(hash),
            confirmation_count,
            confirmations_reported: true,
            slot_history: Vec::new(),
            reported_lockouts: Vec::new(),
            validator_timestamp: None,
            observed_at: now(),
            transaction_signature: TxSignature::new(signature),
        };
        v.extend_history(history.iter().copied());
        v
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::vote;

    #[test]
    fn test_extend_history_sorts_and_filters() {
        let mut v = vote(1, 10, 0, 1, &[7]);
        v.extend_history([9, 3, 7, 10, 12]);
        assert_eq!(v.slot_history, vec![3, 7, 9]);
        assert_eq!(v.history_floor(), Some(3));
    }

    #[test]
    fn test_builds_on() {
        let v = vote(1, 10, 0, 1, &[4, 8]);
        assert!(v.builds_on(8));
        assert!(!v.builds_on(6));
    }
}
