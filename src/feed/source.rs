//! Notification sources.
//!
//! A [`NotificationSource`] opens one logical connection at a time and yields
//! its notifications in arrival order. Two implementations are provided:
//!
//! - [`WsNotificationSource`]: JSON-RPC pubsub over WebSocket.
//! - [`ScriptedSource`]: a fixed sequence of connections, for tests and replay.

use crate::core::{Error, Result};
use crate::feed::event::{NotificationKind, RawNotification};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use jsonrpsee::core::client::{Subscription, SubscriptionClientT};
use jsonrpsee::core::ClientError;
use jsonrpsee::rpc_params;
use jsonrpsee::ws_client::{WsClient, WsClientBuilder};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Notifications from one connection.
pub type NotificationStream = BoxStream<'static, Result<RawNotification>>;

/// Something the feeder can subscribe to.
///
/// `connect` fails with [`Error::SubscriptionRejected`] when the endpoint
/// refuses the vote subscription, and with [`Error::SourceExhausted`] when no
/// further connections will ever be offered.
#[async_trait]
pub trait NotificationSource: Send + Sync {
    /// Open a connection and subscribe.
    async fn connect(&self) -> Result<NotificationStream>;

    /// Endpoint description for logs.
    fn endpoint(&self) -> &str;
}

/// WebSocket pubsub source subscribing to vote and slot notifications.
pub struct WsNotificationSource {
    url: String,
    connect_timeout: Duration,
}

impl WsNotificationSource {
    pub fn new(url: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            url: url.into(),
            connect_timeout,
        }
    }

    async fn subscribe(
        &self,
        client: &WsClient,
        method: &str,
        unsubscribe: &str,
    ) -> Result<Subscription<serde_json::Value>> {
        client
            .subscribe(method, rpc_params![], unsubscribe)
            .await
            .map_err(|e| match e {
                ClientError::Call(err) => Error::SubscriptionRejected {
                    endpoint: self.url.clone(),
                    reason: format!("{}: {}", method, err.message()),
                },
                other => Error::from(other),
            })
    }
}

fn into_notifications(
    subscription: Subscription<serde_json::Value>,
    kind: NotificationKind,
) -> BoxStream<'static, Result<RawNotification>> {
    subscription
        .map(move |item| {
            item.map(|value| RawNotification::new(kind, value.to_string()))
                .map_err(Error::from)
        })
        .boxed()
}

#[async_trait]
impl NotificationSource for WsNotificationSource {
    async fn connect(&self) -> Result<NotificationStream> {
        let client = WsClientBuilder::default()
            .connection_timeout(self.connect_timeout)
            .build(&self.url)
            .await?;
        let client = Arc::new(client);

        let votes = self.subscribe(&client, "voteSubscribe", "voteUnsubscribe").await?;
        let slots = self.subscribe(&client, "slotSubscribe", "slotUnsubscribe").await?;
        debug!(endpoint = %self.url, "subscribed to vote and slot notifications");

        let merged = stream::select(
            into_notifications(votes, NotificationKind::Vote),
            into_notifications(slots, NotificationKind::Slot),
        );

        // The client owns the background connection task; it lives as long
        // as the stream does.
        Ok(stream::unfold((client, merged), |(client, mut merged)| async move {
            let item = merged.next().await?;
            Some((item, (client, merged)))
        })
        .boxed())
    }

    fn endpoint(&self) -> &str {
        &self.url
    }
}

/// One scripted connection attempt.
#[derive(Clone, Debug)]
pub enum ScriptStep {
    /// Connect, deliver the notifications, then close.
    Deliver(Vec<RawNotification>),
    /// Connect, deliver the notifications, then go silent.
    Stall(Vec<RawNotification>),
    /// Refuse the vote subscription.
    Reject(String),
    /// Fail to connect.
    Fail(String),
}

/// Source that replays a fixed sequence of connection attempts.
pub struct ScriptedSource {
    steps: Mutex<VecDeque<ScriptStep>>,
}

impl ScriptedSource {
    pub fn new<I: IntoIterator<Item = ScriptStep>>(steps: I) -> Self {
        Self {
            steps: Mutex::new(steps.into_iter().collect()),
        }
    }

    /// A single connection delivering `notifications`.
    pub fn single(notifications: Vec<RawNotification>) -> Self {
        Self::new([ScriptStep::Deliver(notifications)])
    }

    /// Connection attempts not yet made.
    pub fn remaining(&self) -> usize {
        self.steps.lock().len()
    }
}

#[async_trait]
impl NotificationSource for ScriptedSource {
    async fn connect(&self) -> Result<NotificationStream> {
        let step = self.steps.lock().pop_front();
        match step {
            Some(ScriptStep::Deliver(items)) => Ok(stream::iter(items.into_iter().map(Ok)).boxed()),
            Some(ScriptStep::Stall(items)) => Ok(stream::iter(items.into_iter().map(Ok))
                .chain(stream::pending())
                .boxed()),
            Some(ScriptStep::Reject(reason)) => Err(Error::SubscriptionRejected {
                endpoint: self.endpoint().to_string(),
                reason,
            }),
            Some(ScriptStep::Fail(reason)) => Err(Error::Connection(reason)),
            None => Err(Error::SourceExhausted),
        }
    }

    fn endpoint(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_source_replays_steps() {
        let source = ScriptedSource::new([
            ScriptStep::Fail("refused".to_string()),
            ScriptStep::Deliver(vec![RawNotification::vote("{}"), RawNotification::slot("{}")]),
        ]);

        assert!(matches!(source.connect().await, Err(Error::Connection(_))));

        let items: Vec<_> = source.connect().await.unwrap().collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap().kind, NotificationKind::Vote);
        assert_eq!(items[1].as_ref().unwrap().kind, NotificationKind::Slot);

        assert!(matches!(source.connect().await, Err(Error::SourceExhausted)));
        assert_eq!(source.remaining(), 0);
    }

    #[tokio::test]
    async fn test_scripted_rejection() {
        let source = ScriptedSource::new([ScriptStep::Reject("method not found".to_string())]);
        match source.connect().await {
            Err(Error::SubscriptionRejected { endpoint, reason }) => {
                assert_eq!(endpoint, "scripted");
                assert_eq!(reason, "method not found");
            }
            _ => panic!("expected rejection"),
        }
    }

    #[tokio::test]
    async fn test_ws_source_unreachable() {
        let source = WsNotificationSource::new("ws://127.0.0.1:9", Duration::from_secs(2));
        assert!(matches!(source.connect().await, Err(Error::Connection(_))));
    }
}
