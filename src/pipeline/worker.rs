//! Tower workers.

use crate::detector::detect;
use crate::incident::Incident;
use crate::monitoring::PipelineMetrics;
use crate::tower::{RejectReason, TowerTracker, UpdateOutcome};
use crate::vote::Vote;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

/// Applies routed votes to their towers and forwards incidents.
pub struct Worker {
    id: usize,
    tracker: Arc<TowerTracker>,
    metrics: Arc<PipelineMetrics>,
}

impl Worker {
    pub fn new(id: usize, tracker: Arc<TowerTracker>, metrics: Arc<PipelineMetrics>) -> Self {
        Self {
            id,
            tracker,
            metrics,
        }
    }

    /// Process votes until the queue closes.
    pub async fn run(self, mut votes: mpsc::Receiver<Vote>, incidents: mpsc::Sender<Incident>) {
        while let Some(vote) = votes.recv().await {
            if let Some(incident) = self.process(&vote) {
                if incidents.send(incident).await.is_err() {
                    warn!(worker = self.id, "incident channel closed");
                    return;
                }
            }
        }
        trace!(worker = self.id, "vote queue closed");
    }

    /// Apply one vote; returns the incident it produced, if any.
    pub fn process(&self, vote: &Vote) -> Option<Incident> {
        self.metrics.votes_processed.inc();
        let outcome = self.tracker.apply(vote);

        match &outcome {
            UpdateOutcome::Accepted { expired, rooted } => {
                self.metrics.votes_accepted.inc();
                trace!(
                    validator = %vote.validator_id,
                    slot = vote.slot,
                    expired = expired.len(),
                    rooted = ?rooted.as_ref().map(|e| e.slot),
                    "vote accepted"
                );
            }
            UpdateOutcome::Rejected(RejectReason::StaleVote { top_slot }) => {
                self.metrics.stale_votes.inc();
                debug!(
                    validator = %vote.validator_id,
                    slot = vote.slot,
                    top_slot,
                    "stale vote ignored"
                );
            }
            UpdateOutcome::Rejected(RejectReason::UnknownAncestry { unreconciled }) => {
                self.metrics.unknown_ancestry.inc();
                warn!(
                    validator = %vote.validator_id,
                    slot = vote.slot,
                    unreconciled = ?unreconciled,
                    "cannot place vote relative to tower, ignoring"
                );
            }
            UpdateOutcome::Violated(_) => {
                self.metrics.violations.inc();
            }
        }

        detect(outcome).map(Incident::from_detection)
    }
}
