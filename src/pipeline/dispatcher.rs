//! Decode and route.
//!
//! The single consumer of the feed. Slot notifications update the ancestry
//! index; votes are enriched from it and routed to a worker chosen by
//! validator, so each validator's votes are applied in arrival order.

use crate::core::ValidatorId;
use crate::feed::{FeedEvent, NotificationKind, RawNotification};
use crate::monitoring::PipelineMetrics;
use crate::vote::ancestry::MAX_TRACKED_ANCESTORS;
use crate::vote::{decode_slot_update, decode_vote, AncestryIndex, Recorded, Vote};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

/// Worker index for a validator.
pub fn route_for(validator_id: &ValidatorId, workers: usize) -> usize {
    if workers <= 1 {
        return 0;
    }
    let mut hasher = DefaultHasher::new();
    validator_id.hash(&mut hasher);
    (hasher.finish() % workers as u64) as usize
}

/// Routes decoded votes to per-worker queues.
pub struct Dispatcher {
    index: AncestryIndex,
    routes: Vec<mpsc::Sender<Vote>>,
    metrics: Arc<PipelineMetrics>,
}

impl Dispatcher {
    pub fn new(routes: Vec<mpsc::Sender<Vote>>, metrics: Arc<PipelineMetrics>) -> Self {
        Self {
            index: AncestryIndex::default(),
            routes,
            metrics,
        }
    }

    /// Slots currently known to the ancestry index.
    pub fn index(&self) -> &AncestryIndex {
        &self.index
    }

    /// Consume the feed until it closes; dropping `self` then closes the
    /// worker queues.
    pub async fn run(mut self, mut feed: mpsc::Receiver<FeedEvent>) {
        while let Some(event) = feed.recv().await {
            let Some(vote) = self.handle(event) else {
                continue;
            };
            let worker = route_for(&vote.validator_id, self.routes.len());
            let Some(route) = self.routes.get(worker) else {
                continue;
            };
            if route.send(vote).await.is_err() {
                warn!(worker, "worker queue closed, stopping dispatch");
                return;
            }
        }
        debug!(slots = self.index.len(), "feed closed, dispatcher draining");
    }

    /// Process one feed event, returning a vote to route.
    pub fn handle(&mut self, event: FeedEvent) -> Option<Vote> {
        match event {
            FeedEvent::Notification(notification) => match notification.kind {
                NotificationKind::Slot => {
                    self.record_slot(&notification);
                    None
                }
                NotificationKind::Vote => self.decode(notification),
            },
            FeedEvent::Reconnected { attempt } => {
                info!(attempt, "feed reconnected; votes during the gap were not observed");
                None
            }
        }
    }

    fn record_slot(&mut self, notification: &RawNotification) {
        match decode_slot_update(&notification.payload) {
            Ok(update) => {
                self.metrics.slot_updates.inc();
                if self.index.record(update) == Recorded::Duplicate {
                    warn!(slot = update.slot, "duplicate slot notification ignored");
                }
            }
            Err(e) => {
                self.metrics.decode_failures.inc();
                warn!(error = %e, "discarding slot notification");
            }
        }
    }

    fn decode(&self, notification: RawNotification) -> Option<Vote> {
        let mut vote = match decode_vote(&notification.payload, notification.received_at) {
            Ok(vote) => vote,
            Err(e) => {
                self.metrics.decode_failures.inc();
                warn!(error = %e, "discarding vote notification");
                return None;
            }
        };

        if vote.validator_timestamp.is_none() {
            debug!(validator = %vote.validator_id, slot = vote.slot, "vote carries no timestamp");
        }
        if let Some(ancestors) = self.index.ancestors(vote.slot, MAX_TRACKED_ANCESTORS) {
            vote.extend_history(ancestors);
        }
        trace!(
            validator = %vote.validator_id,
            slot = vote.slot,
            history = vote.slot_history.len(),
            "vote decoded"
        );
        Some(vote)
    }
}
