//! Pipeline assembly.
//!
//! Wires feeder → dispatcher → workers → emitter and tears them down in that
//! order. A periodic task reports status and evicts idle towers.

use crate::config::MonitorConfig;
use crate::core::{Error, Result};
use crate::feed::{NotificationSource, SubscriptionFeeder};
use crate::incident::{IncidentEmitter, IncidentSink};
use crate::monitoring::{PipelineMetrics, StatusReport};
use crate::pipeline::dispatcher::Dispatcher;
use crate::pipeline::worker::Worker;
use crate::tower::TowerTracker;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::info;

/// Message sent to every notifier when monitoring starts.
pub const STARTUP_ANNOUNCEMENT: &str = "lockout-sentinel active";

/// A configured monitor, ready to run against a notification source.
pub struct Monitor {
    config: MonitorConfig,
    tracker: Arc<TowerTracker>,
    metrics: Arc<PipelineMetrics>,
    emitter: Arc<IncidentEmitter>,
}

impl Monitor {
    pub fn new(config: MonitorConfig, sinks: Vec<Arc<dyn IncidentSink>>) -> Self {
        let metrics = Arc::new(PipelineMetrics::new());
        let emitter = Arc::new(IncidentEmitter::new(metrics.clone()).with_sinks(sinks));
        Self {
            config,
            tracker: Arc::new(TowerTracker::new()),
            metrics,
            emitter,
        }
    }

    pub fn tracker(&self) -> Arc<TowerTracker> {
        self.tracker.clone()
    }

    pub fn metrics(&self) -> Arc<PipelineMetrics> {
        self.metrics.clone()
    }

    pub fn emitter(&self) -> Arc<IncidentEmitter> {
        self.emitter.clone()
    }

    /// Current status.
    pub fn status(&self) -> StatusReport {
        self.metrics.report(self.tracker.validator_count())
    }

    /// Run until `shutdown` is signalled or the source is exhausted, then
    /// drain every in-flight vote and incident.
    pub async fn run<S>(&self, source: S, shutdown: watch::Receiver<bool>) -> Result<StatusReport>
    where
        S: NotificationSource + 'static,
    {
        self.config.pipeline.validate()?;
        let workers = self.config.pipeline.workers.max(1);
        let queue = self.config.pipeline.worker_queue.max(1);

        let (feed_tx, feed_rx) = mpsc::channel(self.config.feeder.channel_capacity.max(1));
        let (incident_tx, incident_rx) = mpsc::channel(queue);

        let emitter_task = tokio::spawn(self.emitter.clone().run(incident_rx));

        let mut routes = Vec::with_capacity(workers);
        let mut worker_tasks = Vec::with_capacity(workers);
        for id in 0..workers {
            let (vote_tx, vote_rx) = mpsc::channel(queue);
            routes.push(vote_tx);
            let worker = Worker::new(id, self.tracker.clone(), self.metrics.clone());
            worker_tasks.push(tokio::spawn(worker.run(vote_rx, incident_tx.clone())));
        }
        drop(incident_tx);

        let dispatcher_task = tokio::spawn(Dispatcher::new(routes, self.metrics.clone()).run(feed_rx));
        let status_task = self.spawn_status(shutdown.clone());

        info!(
            endpoint = source.endpoint(),
            workers,
            sinks = self.emitter.sink_count(),
            "monitor started"
        );
        self.emitter.announce(STARTUP_ANNOUNCEMENT).await;

        let feeder = SubscriptionFeeder::new(source, self.config.feeder.clone(), self.metrics.clone());
        let fed = feeder.run(feed_tx, shutdown).await;

        join("dispatcher", dispatcher_task).await?;
        for task in worker_tasks {
            join("worker", task).await?;
        }
        join("emitter", emitter_task).await?;
        status_task.abort();

        let status = self.status();
        info!(%status, "monitor stopped");
        fed.map(|()| status)
    }

    fn spawn_status(&self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let tracker = self.tracker.clone();
        let metrics = self.metrics.clone();
        let interval = self.config.pipeline.status_interval();
        let max_idle = self.config.pipeline.max_idle();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = shutdown.changed() => return,
                }
                if let Some(max_idle) = max_idle {
                    let evicted = tracker.evict_idle(max_idle);
                    if evicted > 0 {
                        info!(evicted, "evicted idle towers");
                    }
                }
                let status = metrics.report(tracker.validator_count());
                info!(%status, "status");
            }
        })
    }
}

async fn join(stage: &str, task: JoinHandle<()>) -> Result<()> {
    task.await
        .map_err(|e| Error::Internal(format!("{} task failed: {}", stage, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{RawNotification, ScriptStep, ScriptedSource};
    use crate::incident::MemorySink;

    #[tokio::test]
    async fn test_run_drains_and_announces() {
        let sink = MemorySink::new();
        let monitor = Monitor::new(MonitorConfig::default(), vec![Arc::new(sink.clone())]);
        let (_stop, shutdown) = watch::channel(false);

        let source = ScriptedSource::single(vec![RawNotification::vote("not json")]);
        let status = monitor.run(source, shutdown).await.unwrap();

        assert_eq!(status.notifications, 1);
        assert_eq!(status.decode_failures, 1);
        assert_eq!(sink.messages(), vec![STARTUP_ANNOUNCEMENT.to_string()]);
    }

    #[tokio::test]
    async fn test_zero_status_interval_rejected() {
        let mut config = MonitorConfig::default();
        config.pipeline.status_interval_seconds = 0;
        let monitor = Monitor::new(config, Vec::new());
        let (_stop, shutdown) = watch::channel(false);

        let source = ScriptedSource::single(vec![RawNotification::vote("not json")]);
        let result = monitor.run(source, shutdown).await;
        assert!(matches!(result, Err(Error::Config(_))));
        assert_eq!(monitor.metrics().notifications.get(), 0);
    }

    #[tokio::test]
    async fn test_startup_rejection_surfaces() {
        let monitor = Monitor::new(MonitorConfig::default(), Vec::new());
        let (_stop, shutdown) = watch::channel(false);

        let source = ScriptedSource::new([ScriptStep::Reject("disabled".to_string())]);
        let result = monitor.run(source, shutdown).await;
        assert!(matches!(result, Err(Error::SubscriptionRejected { .. })));
    }
}
