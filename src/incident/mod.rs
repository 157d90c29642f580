//! Incident Layer
//!
//! Frozen violation records and their delivery:
//! - Durable JSON records
//! - Slack and Discord webhooks
//! - Once-per-run publication to every sink

pub mod emitter;
pub mod factory;
pub mod notifier;
pub mod record;
pub mod sink;

pub use emitter::{IncidentEmitter, PublishReport};
pub use factory::create_sinks;
pub use notifier::{Channel, WebhookNotifier};
pub use record::{Incident, IncidentId};
pub use sink::{FileIncidentSink, IncidentSink, MemorySink, SinkType};
