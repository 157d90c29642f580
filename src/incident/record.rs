//! Incident records.
//!
//! An incident is created once from a detected violation and never mutated.

use crate::core::{now, Hash256, Slot, Timestamp, TxSignature, ValidatorId};
use crate::detector::{explain, DetectedViolation, ViolationKind};
use crate::tower::{TowerEntry, TowerSnapshot};
use crate::vote::Vote;
use serde::{Deserialize, Serialize};

/// Unique incident identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IncidentId(pub String);

impl IncidentId {
    /// Generate a unique ID.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Get the ID string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for IncidentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Immutable record of a detected violation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Incident {
    /// Unique incident ID
    pub id: IncidentId,
    /// Digest of the violating vote; equal for re-deliveries of the same vote
    pub fingerprint: Hash256,
    /// Offending validator
    pub validator_id: ValidatorId,
    /// Violation kind
    pub kind: ViolationKind,
    /// The vote that triggered detection
    pub violating_vote: Vote,
    /// Entries whose lockout was broken, top first
    pub conflicting_entries: Vec<TowerEntry>,
    /// Tower state before the vote
    pub prior_tower: TowerSnapshot,
    /// Detection time
    pub detected_at: Timestamp,
    /// Signature of the violating vote transaction
    pub transaction_signature: TxSignature,
    /// Human-readable report
    pub explanation: String,
}

impl Incident {
    /// Freeze a detected violation into an incident.
    pub fn from_detection(detected: DetectedViolation) -> Self {
        let DetectedViolation { kind, violation } = detected;
        let explanation = explain(kind, &violation);
        let vote = violation.violating_vote;
        Self {
            id: IncidentId::generate(),
            fingerprint: Self::fingerprint_of(&vote),
            validator_id: vote.validator_id,
            kind,
            transaction_signature: vote.transaction_signature,
            conflicting_entries: violation.conflicting_entries,
            prior_tower: violation.prior_tower,
            detected_at: now(),
            explanation,
            violating_vote: vote,
        }
    }

    /// Fingerprint identifying a violating vote independent of receipt time.
    pub fn fingerprint_of(vote: &Vote) -> Hash256 {
        Hash256::digest([
            vote.validator_id.as_bytes().as_slice(),
            vote.transaction_signature.as_bytes().as_slice(),
            vote.slot.to_le_bytes().as_slice(),
            vote.hash.as_bytes().as_slice(),
        ])
    }

    /// Slots involved: the vote slot followed by the abandoned entries.
    pub fn slots(&self) -> Vec<Slot> {
        std::iter::once(self.violating_vote.slot)
            .chain(self.conflicting_entries.iter().map(|e| e.slot))
            .collect()
    }

    /// One-line summary used by chat notifiers.
    pub fn summary(&self) -> String {
        format!(
            "{}: {} detected at slot {} [{}]",
            self.validator_id, self.kind, self.violating_vote.slot, self.transaction_signature
        )
    }
}
