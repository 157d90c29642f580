//! Results of applying a vote to a tower.

use crate::core::Slot;
use crate::tower::entry::TowerEntry;
use crate::tower::state::TowerSnapshot;
use crate::vote::Vote;
use serde::{Deserialize, Serialize};

/// Why a vote was rejected without being treated as a violation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    /// The vote does not advance past the top of the tower and cannot be
    /// shown to conflict with it: a duplicate, a late vote on the same fork,
    /// or a vote older than the tracked lineage.
    StaleVote { top_slot: Slot },
    /// Live entries could not be placed relative to the vote's fork.
    UnknownAncestry { unreconciled: Vec<Slot> },
}

/// Evidence of a broken lockout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// The vote that abandoned locked entries
    pub violating_vote: Vote,
    /// Live entries the vote abandoned, top first
    pub conflicting_entries: Vec<TowerEntry>,
    /// Tower state immediately before the vote
    pub prior_tower: TowerSnapshot,
}

/// Outcome of [`Tower::apply`](crate::tower::Tower::apply).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The vote was pushed.
    Accepted {
        /// Entries removed because their lockout had expired
        expired: Vec<TowerEntry>,
        /// Bottom entry rooted because the tower was full
        rooted: Option<TowerEntry>,
    },
    /// The vote broke a lockout; the tower is unchanged.
    Violated(Box<Violation>),
    /// The vote was not applied; the tower is unchanged.
    Rejected(RejectReason),
}

impl UpdateOutcome {
    /// Whether the vote was pushed.
    pub fn is_accepted(&self) -> bool {
        matches!(self, UpdateOutcome::Accepted { .. })
    }

    /// Whether the vote broke a lockout.
    pub fn is_violation(&self) -> bool {
        matches!(self, UpdateOutcome::Violated(_))
    }
}
