//! Classification of violated tower updates.

use crate::tower::{UpdateOutcome, Violation};
use serde::{Deserialize, Serialize};

/// Kind of safety violation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViolationKind {
    /// A live entry was abandoned for a conflicting fork
    LockoutViolation,
    /// The vote reaches back to or below a slot already rooted out of the tower
    RetroactiveVote,
}

impl std::fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViolationKind::LockoutViolation => write!(f, "lockout violation"),
            ViolationKind::RetroactiveVote => write!(f, "retroactive vote"),
        }
    }
}

/// A classified violation, ready to become an incident.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DetectedViolation {
    pub kind: ViolationKind,
    pub violation: Box<Violation>,
}

/// Classify the kind of a violation from its evidence.
pub fn classify(violation: &Violation) -> ViolationKind {
    match violation.prior_tower.root {
        Some(root) if violation.violating_vote.slot <= root => ViolationKind::RetroactiveVote,
        _ => ViolationKind::LockoutViolation,
    }
}

/// Turn an update outcome into a detected violation, if it is one.
pub fn detect(outcome: UpdateOutcome) -> Option<DetectedViolation> {
    match outcome {
        UpdateOutcome::Violated(violation) => Some(DetectedViolation {
            kind: classify(&violation),
            violation,
        }),
        UpdateOutcome::Accepted { .. } | UpdateOutcome::Rejected(_) => None,
    }
}
