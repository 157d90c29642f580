//! Lockout-protected tower entries and lockout arithmetic.

use crate::core::{BlockHash, Slot};
use serde::{Deserialize, Serialize};

/// Maximum number of entries a tower holds before the bottom one is rooted.
pub const MAX_LOCKOUT_HISTORY: usize = 31;

/// Number of slots a vote with `confirmation_count` is locked for (`2^c`).
///
/// Saturates at `u64::MAX` for counts of 64 and above.
pub fn lockout(confirmation_count: u32) -> u64 {
    1u64.checked_shl(confirmation_count).unwrap_or(u64::MAX)
}

/// First slot at which a vote for `slot` is no longer locked out.
pub fn expiration(slot: Slot, confirmation_count: u32) -> Slot {
    slot.saturating_add(lockout(confirmation_count))
}

/// One lockout-protected vote held in a validator's tower.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TowerEntry {
    /// Voted slot
    pub slot: Slot,
    /// Bank hash of the voted block
    pub hash: BlockHash,
    /// Confirmation count reported with the vote
    pub confirmation_count: u32,
}

impl TowerEntry {
    /// Create a new entry.
    pub fn new(slot: Slot, hash: BlockHash, confirmation_count: u32) -> Self {
        Self {
            slot,
            hash,
            confirmation_count,
        }
    }

    /// Lockout length in slots.
    pub fn lockout(&self) -> u64 {
        lockout(self.confirmation_count)
    }

    /// Slot at which this entry's lockout expires.
    pub fn lockout_expiration_slot(&self) -> Slot {
        expiration(self.slot, self.confirmation_count)
    }

    /// Whether a vote at `slot` may abandon this entry regardless of fork.
    pub fn is_expired_at(&self, slot: Slot) -> bool {
        slot >= self.lockout_expiration_slot()
    }
}
