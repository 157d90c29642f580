//! Feed Module
//!
//! Inbound notification path:
//! - Vote and slot subscriptions over JSON-RPC pubsub
//! - Reconnect with bounded exponential backoff
//! - Bounded, ordered hand-off to the pipeline

pub mod backoff;
pub mod event;
pub mod feeder;
pub mod source;

pub use backoff::Backoff;
pub use event::{FeedEvent, NotificationKind, RawNotification};
pub use feeder::SubscriptionFeeder;
pub use source::{NotificationSource, NotificationStream, ScriptStep, ScriptedSource, WsNotificationSource};
