//! Pipeline counters.
//!
//! Lock-free counters shared by the feeder, dispatcher, workers and emitter,
//! plus a point-in-time status report.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// A counter metric (monotonically increasing).
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    /// Create a new counter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment by 1.
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment by amount.
    pub fn add(&self, amount: u64) {
        self.value.fetch_add(amount, Ordering::Relaxed);
    }

    /// Get current value.
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Counters for every stage of the monitor.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    /// Notifications received from the feed
    pub notifications: Counter,
    /// Notifications dropped on a full channel
    pub notifications_dropped: Counter,
    /// Payloads that failed to decode
    pub decode_failures: Counter,
    /// Slot notifications recorded in the ancestry index
    pub slot_updates: Counter,
    /// Votes applied to a tower
    pub votes_processed: Counter,
    /// Votes accepted onto a tower
    pub votes_accepted: Counter,
    /// Votes rejected as stale
    pub stale_votes: Counter,
    /// Votes rejected for unknown ancestry
    pub unknown_ancestry: Counter,
    /// Violations detected
    pub violations: Counter,
    /// Incidents published
    pub incidents: Counter,
    /// Failed sink deliveries
    pub delivery_failures: Counter,
    /// Feed reconnects
    pub reconnects: Counter,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture the current values.
    pub fn report(&self, validators_tracked: usize) -> StatusReport {
        StatusReport {
            validators_tracked,
            notifications: self.notifications.get(),
            notifications_dropped: self.notifications_dropped.get(),
            decode_failures: self.decode_failures.get(),
            votes_processed: self.votes_processed.get(),
            stale_votes: self.stale_votes.get(),
            unknown_ancestry: self.unknown_ancestry.get(),
            incidents: self.incidents.get(),
            delivery_failures: self.delivery_failures.get(),
            reconnects: self.reconnects.get(),
        }
    }
}

/// Point-in-time monitor status.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub validators_tracked: usize,
    pub notifications: u64,
    pub notifications_dropped: u64,
    pub decode_failures: u64,
    pub votes_processed: u64,
    pub stale_votes: u64,
    pub unknown_ancestry: u64,
    pub incidents: u64,
    pub delivery_failures: u64,
    pub reconnects: u64,
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} validators tracked, {} votes processed, {} incidents, {} decode failures, {} dropped, {} reconnects",
            self.validators_tracked,
            self.votes_processed,
            self.incidents,
            self.decode_failures,
            self.notifications_dropped,
            self.reconnects
        )
    }
}
