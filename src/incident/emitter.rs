//! Incident emitter.
//!
//! Publishes each incident once to every registered sink. In the pipeline
//! every sink is driven by its own task behind a bounded queue, so a slow or
//! hung webhook never holds up the other sinks or the tower workers.

use crate::core::Hash256;
use crate::incident::record::Incident;
use crate::incident::sink::IncidentSink;
use crate::monitoring::PipelineMetrics;
use futures::future::join_all;
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Incidents buffered per sink before new ones are dropped for that sink.
pub const SINK_QUEUE_CAPACITY: usize = 64;

/// Fingerprints remembered for duplicate suppression.
pub const MAX_PUBLISHED_FINGERPRINTS: usize = 4_096;

/// Time sinks get to drain their queues on shutdown.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(15);

/// Result of publishing one incident.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Sinks that accepted the incident
    pub delivered: usize,
    /// Sinks that failed
    pub failed: usize,
    /// Whether the incident was suppressed as already published
    pub duplicate: bool,
}

/// Most recently published fingerprints, oldest evicted first.
#[derive(Debug)]
struct Fingerprints {
    seen: HashSet<Hash256>,
    order: VecDeque<Hash256>,
    capacity: usize,
}

impl Fingerprints {
    fn new(capacity: usize) -> Self {
        Self {
            seen: HashSet::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Remember `fingerprint`; false when it is already remembered.
    fn insert(&mut self, fingerprint: Hash256) -> bool {
        if !self.seen.insert(fingerprint) {
            return false;
        }
        self.order.push_back(fingerprint);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        true
    }

    fn len(&self) -> usize {
        self.order.len()
    }
}

/// Fans incidents out to sinks.
pub struct IncidentEmitter {
    sinks: Vec<Arc<dyn IncidentSink>>,
    published: Mutex<Fingerprints>,
    metrics: Arc<PipelineMetrics>,
    queue_capacity: usize,
    drain_timeout: Duration,
}

impl IncidentEmitter {
    /// Create an emitter with no sinks.
    pub fn new(metrics: Arc<PipelineMetrics>) -> Self {
        Self {
            sinks: Vec::new(),
            published: Mutex::new(Fingerprints::new(MAX_PUBLISHED_FINGERPRINTS)),
            metrics,
            queue_capacity: SINK_QUEUE_CAPACITY,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }

    /// Register a sink.
    pub fn with_sink(mut self, sink: Arc<dyn IncidentSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Register several sinks.
    pub fn with_sinks<I: IntoIterator<Item = Arc<dyn IncidentSink>>>(mut self, sinks: I) -> Self {
        self.sinks.extend(sinks);
        self
    }

    /// Set the per-sink queue capacity.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Set how long sinks may take to drain on shutdown.
    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Number of registered sinks.
    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Record the incident as published and log it. Returns false for a
    /// fingerprint already published.
    fn admit(&self, incident: &Incident) -> bool {
        if !self.published.lock().insert(incident.fingerprint) {
            info!(
                validator = %incident.validator_id,
                signature = %incident.transaction_signature,
                "incident already published, suppressing"
            );
            return false;
        }

        self.metrics.incidents.inc();
        error!(
            validator = %incident.validator_id,
            kind = %incident.kind,
            slot = incident.violating_vote.slot,
            signature = %incident.transaction_signature,
            incident = %incident.id,
            "{}: {} detected\n{}",
            incident.validator_id,
            incident.kind,
            incident.explanation
        );
        true
    }

    /// Publish an incident to all sinks and wait for every delivery.
    pub async fn publish(&self, incident: &Incident) -> PublishReport {
        if !self.admit(incident) {
            return PublishReport {
                duplicate: true,
                ..Default::default()
            };
        }

        let results = join_all(self.sinks.iter().map(|sink| sink.deliver(incident))).await;

        let mut report = PublishReport::default();
        for (sink, result) in self.sinks.iter().zip(results) {
            match result {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    self.metrics.delivery_failures.inc();
                    warn!(sink = %sink.sink_type(), error = %e, incident = %incident.id, "incident delivery failed");
                }
            }
        }
        report
    }

    /// Send a status message to every sink that supports one.
    pub async fn announce(&self, message: &str) {
        let results = join_all(self.sinks.iter().map(|sink| sink.announce(message))).await;
        for (sink, result) in self.sinks.iter().zip(results) {
            if let Err(e) = result {
                warn!(sink = %sink.sink_type(), error = %e, "announcement failed");
            }
        }
    }

    /// Publish incidents until every sender is dropped, then give the sinks
    /// up to the drain timeout to finish their queues.
    pub async fn run(self: Arc<Self>, mut incidents: mpsc::Receiver<Incident>) {
        let mut deliveries = JoinSet::new();
        let mut queues = Vec::with_capacity(self.sinks.len());
        for sink in &self.sinks {
            let (tx, rx) = mpsc::channel(self.queue_capacity);
            deliveries.spawn(drive_sink(sink.clone(), rx, self.metrics.clone()));
            queues.push((sink.sink_type(), tx));
        }

        while let Some(incident) = incidents.recv().await {
            if !self.admit(&incident) {
                continue;
            }
            let incident = Arc::new(incident);
            for (sink_type, queue) in &queues {
                if let Err(e) = queue.try_send(incident.clone()) {
                    self.metrics.delivery_failures.inc();
                    warn!(sink = %sink_type, incident = %incident.id, error = %e, "sink queue unavailable, incident dropped");
                }
            }
        }

        drop(queues);
        let drained = tokio::time::timeout(self.drain_timeout, async {
            while deliveries.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!(
                pending = deliveries.len(),
                timeout_ms = self.drain_timeout.as_millis() as u64,
                "sinks did not drain in time, aborting"
            );
            deliveries.abort_all();
        }
    }
}

async fn drive_sink(
    sink: Arc<dyn IncidentSink>,
    mut queue: mpsc::Receiver<Arc<Incident>>,
    metrics: Arc<PipelineMetrics>,
) {
    while let Some(incident) = queue.recv().await {
        match sink.deliver(&incident).await {
            Ok(()) => debug!(sink = %sink.sink_type(), incident = %incident.id, "incident delivered"),
            Err(e) => {
                metrics.delivery_failures.inc();
                warn!(sink = %sink.sink_type(), error = %e, incident = %incident.id, "incident delivery failed");
            }
        }
    }
}
