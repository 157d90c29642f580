//! Sink factory.
//!
//! Creates incident sinks based on configuration.

use crate::config::MonitorConfig;
use crate::core::{Error, Result};
use crate::incident::notifier::WebhookNotifier;
use crate::incident::sink::{FileIncidentSink, IncidentSink};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

/// Upper bound on a single webhook request.
pub const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Create the durable record sink plus every configured notifier.
pub fn create_sinks(config: &MonitorConfig) -> Result<Vec<Arc<dyn IncidentSink>>> {
    let client = Client::builder()
        .timeout(WEBHOOK_TIMEOUT)
        .build()
        .map_err(|e| Error::Config(format!("cannot build webhook client: {}", e)))?;
    let mut sinks: Vec<Arc<dyn IncidentSink>> =
        vec![Arc::new(FileIncidentSink::new(config.incident_dir.clone()))];

    if let Some(slack) = &config.notifier.slack {
        sinks.push(Arc::new(WebhookNotifier::slack(client.clone(), slack)));
    }
    if let Some(discord) = &config.notifier.discord {
        sinks.push(Arc::new(WebhookNotifier::discord(client, discord)));
    }
    Ok(sinks)
}
