//! Human-readable incident reports.
//!
//! Lays out the evidence an operator needs to verify a violation by hand:
//! the tower before the vote, where the two forks diverge, and the vote
//! transactions that built the tower.

use crate::core::Slot;
use crate::detector::classify::ViolationKind;
use crate::tower::Violation;
use std::collections::BTreeSet;
use std::fmt::Write;

fn join_desc<'a, I: IntoIterator<Item = &'a Slot>>(slots: I) -> String
where
    I::IntoIter: DoubleEndedIterator,
{
    slots
        .into_iter()
        .rev()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Render the explanation attached to an incident.
pub fn explain(kind: ViolationKind, violation: &Violation) -> String {
    let vote = &violation.violating_vote;
    let tower = &violation.prior_tower;
    let floor = tower.root.unwrap_or(0);
    let conflicting: BTreeSet<Slot> = violation.conflicting_entries.iter().map(|e| e.slot).collect();

    let mut out = String::new();
    let _ = writeln!(out, "{}: {}", kind, vote.validator_id);
    let _ = writeln!(out, "signature: {}", vote.transaction_signature);
    let _ = writeln!(out, "vote slot: {} (hash {})", vote.slot, vote.hash);
    match tower.root {
        Some(root) => {
            let _ = writeln!(out, "root slot: {}", root);
        }
        None => {
            let _ = writeln!(out, "root slot: none");
        }
    }
    if let Some(top) = tower.top() {
        let _ = writeln!(out, "last lockout slot: {}", top.lockout_expiration_slot());
    }

    let _ = writeln!(out, "tower:");
    for entry in tower.entries.iter().rev() {
        let _ = writeln!(
            out,
            "  - {} (conf: {}), locked out until slot {}{}",
            entry.slot,
            entry.confirmation_count,
            entry.lockout_expiration_slot(),
            if conflicting.contains(&entry.slot) {
                " [abandoned]"
            } else {
                ""
            }
        );
    }

    // Compare the vote's fork with the fork of the highest abandoned entry
    if let Some(lockout_slot) = violation.conflicting_entries.first().map(|e| e.slot) {
        let vote_ancestors: BTreeSet<Slot> = vote
            .slot_history
            .iter()
            .copied()
            .filter(|s| *s >= floor)
            .collect();
        let lockout_ancestors: BTreeSet<Slot> = tower
            .lineage
            .iter()
            .copied()
            .filter(|s| *s >= floor && *s < lockout_slot)
            .collect();
        let common: BTreeSet<Slot> = vote_ancestors.intersection(&lockout_ancestors).copied().collect();

        let _ = writeln!(out, "fork at vote slot {} to common ancestor:", vote.slot);
        let _ = writeln!(out, "  - {}", join_desc(vote_ancestors.difference(&common).collect::<Vec<_>>()));
        let _ = writeln!(out, "fork at lockout slot {} to common ancestor:", lockout_slot);
        let _ = writeln!(
            out,
            "  - {}",
            join_desc(lockout_ancestors.difference(&common).collect::<Vec<_>>())
        );
        let _ = writeln!(out, "common fork ancestors:");
        let _ = writeln!(out, "  - {}", join_desc(common.iter().collect::<Vec<_>>()));
    }

    let _ = writeln!(out, "vote transaction history:");
    for recent in &tower.recent_votes {
        let _ = writeln!(out, " - {} [{}]", recent.slot, recent.signature);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ValidatorId;
    use crate::detector::classify::detect;
    use crate::tower::Tower;
    use crate::vote::types::fixtures::vote;

    #[test]
    fn test_explanation_lists_forks() {
        let mut tower = Tower::new(ValidatorId::new([1; 32]));
        tower.apply(&vote(1, 10, 0, 1, &[4, 5, 8]));
        let detected = detect(tower.apply(&vote(1, 9, 1, 1, &[4, 5, 6]))).unwrap();
        let text = explain(detected.kind, &detected.violation);

        assert!(text.starts_with("lockout violation: "));
        assert!(text.contains("vote slot: 9"));
        assert!(text.contains("root slot: none"));
        assert!(text.contains("  - 10 (conf: 1), locked out until slot 12 [abandoned]"));
        assert!(text.contains("fork at vote slot 9 to common ancestor:\n  - 6\n"));
        assert!(text.contains("fork at lockout slot 10 to common ancestor:\n  - 8\n"));
        assert!(text.contains("common fork ancestors:\n  - 5, 4\n"));
        assert!(text.contains("vote transaction history:\n - 10 ["));
    }
}
