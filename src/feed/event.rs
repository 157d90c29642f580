//! Events produced by the subscription feeder.

use crate::core::{now, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Subscription a notification arrived on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationKind {
    Vote,
    Slot,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationKind::Vote => write!(f, "vote"),
            NotificationKind::Slot => write!(f, "slot"),
        }
    }
}

/// An undecoded notification payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawNotification {
    /// Originating subscription
    pub kind: NotificationKind,
    /// JSON payload as received
    pub payload: String,
    /// Local receive time
    pub received_at: Timestamp,
}

impl RawNotification {
    /// Create a notification stamped with the current time.
    pub fn new(kind: NotificationKind, payload: impl Into<String>) -> Self {
        Self {
            kind,
            payload: payload.into(),
            received_at: now(),
        }
    }

    pub fn vote(payload: impl Into<String>) -> Self {
        Self::new(NotificationKind::Vote, payload)
    }

    pub fn slot(payload: impl Into<String>) -> Self {
        Self::new(NotificationKind::Slot, payload)
    }
}

/// Item on the feeder's output channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FeedEvent {
    /// A notification from the current connection.
    Notification(RawNotification),
    /// A new connection replaced a lost one; notifications in between were
    /// never observed.
    Reconnected { attempt: u32 },
}
