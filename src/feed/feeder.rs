//! Subscription feeder.
//!
//! Owns the connection lifecycle: connect, forward notifications in order onto
//! a bounded channel, recycle idle connections, reconnect with backoff.

use crate::config::FeederConfig;
use crate::core::{Error, Result};
use crate::feed::backoff::Backoff;
use crate::feed::event::FeedEvent;
use crate::feed::source::{NotificationSource, NotificationStream};
use crate::monitoring::PipelineMetrics;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, trace, warn};

/// Why a connection stopped being read.
enum Pump {
    Shutdown,
    ChannelClosed,
    Disconnected(Error),
}

/// Drives a [`NotificationSource`] into a bounded channel.
pub struct SubscriptionFeeder<S> {
    source: S,
    config: FeederConfig,
    metrics: Arc<PipelineMetrics>,
}

impl<S: NotificationSource> SubscriptionFeeder<S> {
    pub fn new(source: S, config: FeederConfig, metrics: Arc<PipelineMetrics>) -> Self {
        Self {
            source,
            config,
            metrics,
        }
    }

    /// Run until shutdown, until the receiver is dropped, or until the source
    /// is exhausted.
    ///
    /// Fails only when the vote subscription is rejected before any
    /// connection has succeeded.
    pub async fn run(
        self,
        output: mpsc::Sender<FeedEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        let endpoint = self.source.endpoint().to_string();
        let mut backoff = Backoff::from_config(&self.config);
        let mut connections: u32 = 0;

        loop {
            if *shutdown.borrow() {
                return Ok(());
            }

            let connected = tokio::select! {
                result = self.source.connect() => result,
                _ = shutdown.changed() => return Ok(()),
            };

            match connected {
                Ok(mut stream) => {
                    if connections == 0 {
                        info!(endpoint = %endpoint, "subscribed to vote notifications");
                    } else {
                        self.metrics.reconnects.inc();
                        warn!(endpoint = %endpoint, attempt = connections, "resubscribed after connection loss");
                        let event = FeedEvent::Reconnected {
                            attempt: connections,
                        };
                        if output.send(event).await.is_err() {
                            return Ok(());
                        }
                    }
                    connections = connections.saturating_add(1);
                    backoff.reset();

                    match self.pump(&mut stream, &output, &mut shutdown).await {
                        Pump::Shutdown | Pump::ChannelClosed => return Ok(()),
                        Pump::Disconnected(reason) => {
                            warn!(endpoint = %endpoint, reason = %reason, "subscription lost");
                        }
                    }
                }
                Err(Error::SourceExhausted) => {
                    info!(endpoint = %endpoint, "notification source exhausted");
                    return Ok(());
                }
                Err(e @ Error::SubscriptionRejected { .. }) if connections == 0 => {
                    error!(endpoint = %endpoint, error = %e, "vote subscription unavailable");
                    return Err(e);
                }
                Err(e) => {
                    warn!(endpoint = %endpoint, error = %e, attempt = backoff.attempt(), "failed to subscribe");
                }
            }

            let delay = backoff.next_delay();
            debug!(retry_in_ms = delay.as_millis() as u64, "waiting before reconnect");
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => return Ok(()),
            }
        }
    }

    async fn pump(
        &self,
        stream: &mut NotificationStream,
        output: &mpsc::Sender<FeedEvent>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Pump {
        let idle = self.config.idle_timeout();
        loop {
            let next = tokio::select! {
                next = tokio::time::timeout(idle, stream.next()) => next,
                _ = shutdown.changed() => return Pump::Shutdown,
            };

            let notification = match next {
                Err(_) => return Pump::Disconnected(Error::IdleTimeout(idle.as_secs())),
                Ok(None) => return Pump::Disconnected(Error::StreamClosed),
                Ok(Some(Err(e))) => {
                    self.metrics.decode_failures.inc();
                    warn!(error = %e, "unreadable notification");
                    continue;
                }
                Ok(Some(Ok(notification))) => notification,
            };

            self.metrics.notifications.inc();
            trace!(kind = %notification.kind, "notification received");
            match output.try_send(FeedEvent::Notification(notification)) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    self.metrics.notifications_dropped.inc();
                    debug!(
                        dropped = self.metrics.notifications_dropped.get(),
                        "notification channel full, dropping"
                    );
                }
                Err(TrySendError::Closed(_)) => return Pump::ChannelClosed,
            }
        }
    }
}
