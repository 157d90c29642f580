//! Chat webhook notifiers.

use crate::config::{DiscordConfig, SlackConfig};
use crate::core::{Error, Result};
use crate::incident::record::Incident;
use crate::incident::sink::{IncidentSink, SinkType};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

/// Discord rejects message content longer than this.
const DISCORD_CONTENT_LIMIT: usize = 2_000;

/// Webhook destination and its payload format.
#[derive(Clone, Debug)]
pub enum Channel {
    Slack { webhook: String },
    Discord { webhook: String, username: String },
}

/// Posts incidents to a Slack or Discord webhook.
pub struct WebhookNotifier {
    client: Client,
    channel: Channel,
}

impl WebhookNotifier {
    /// Create a notifier for a channel.
    pub fn new(client: Client, channel: Channel) -> Self {
        Self { client, channel }
    }

    /// Slack notifier.
    pub fn slack(client: Client, config: &SlackConfig) -> Self {
        Self::new(
            client,
            Channel::Slack {
                webhook: config.webhook.clone(),
            },
        )
    }

    /// Discord notifier.
    pub fn discord(client: Client, config: &DiscordConfig) -> Self {
        Self::new(
            client,
            Channel::Discord {
                webhook: config.webhook.clone(),
                username: config.username.clone(),
            },
        )
    }

    /// Render a message body in this channel's format.
    pub fn render(&self, message: &str) -> Value {
        match &self.channel {
            Channel::Slack { .. } => json!({ "text": message }),
            Channel::Discord { username, .. } => json!({
                "username": username,
                "content": truncate(message, DISCORD_CONTENT_LIMIT),
            }),
        }
    }

    /// Render an incident as a chat message.
    pub fn render_incident(&self, incident: &Incident) -> Value {
        self.render(&format!(
            "{}\n```\n{}```",
            incident.summary(),
            incident.explanation
        ))
    }

    fn webhook(&self) -> &str {
        match &self.channel {
            Channel::Slack { webhook } | Channel::Discord { webhook, .. } => webhook,
        }
    }

    async fn post(&self, body: Value) -> Result<()> {
        let response = self.client.post(self.webhook()).json(&body).send().await?;
        response.error_for_status().map_err(|e| Error::Delivery {
            sink: self.sink_type().to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }
}

fn truncate(message: &str, limit: usize) -> String {
    if message.chars().count() <= limit {
        return message.to_string();
    }
    let mut out: String = message.chars().take(limit.saturating_sub(1)).collect();
    out.push('…');
    out
}

#[async_trait]
impl IncidentSink for WebhookNotifier {
    async fn deliver(&self, incident: &Incident) -> Result<()> {
        self.post(self.render_incident(incident)).await
    }

    fn sink_type(&self) -> SinkType {
        match self.channel {
            Channel::Slack { .. } => SinkType::Slack,
            Channel::Discord { .. } => SinkType::Discord,
        }
    }

    async fn announce(&self, message: &str) -> Result<()> {
        self.post(self.render(message)).await
    }
}
