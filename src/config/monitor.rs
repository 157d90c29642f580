//! Monitor configuration.
//!
//! Resolved values consumed by the feeder, the pipeline and the sinks.
//! Notification channels are configured from the environment.

use crate::config::rpc::{compute_websocket_url, normalize_to_url_if_moniker};
use crate::core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default Discord display name.
pub const DEFAULT_DISCORD_USERNAME: &str = "lockout-sentinel";

/// Top-level monitor configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// RPC endpoint
    pub rpc: RpcConfig,
    /// Subscription feeder
    pub feeder: FeederConfig,
    /// Processing pipeline
    pub pipeline: PipelineConfig,
    /// Notification channels
    pub notifier: NotifierConfig,
    /// Directory for incident records
    pub incident_dir: PathBuf,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            rpc: RpcConfig::default(),
            feeder: FeederConfig::default(),
            pipeline: PipelineConfig::default(),
            notifier: NotifierConfig::default(),
            incident_dir: PathBuf::from("."),
        }
    }
}

impl MonitorConfig {
    /// Default configuration with notifiers taken from the environment.
    pub fn from_env() -> Self {
        Self {
            notifier: NotifierConfig::from_env(),
            ..Default::default()
        }
    }
}

/// RPC endpoint configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcConfig {
    /// JSON RPC URL or cluster moniker
    pub json_rpc_url: String,
    /// Explicit WebSocket URL; derived from the RPC URL when absent
    pub websocket_url: Option<String>,
}

impl RpcConfig {
    /// WebSocket URL used for subscriptions.
    pub fn resolved_websocket_url(&self) -> Result<String> {
        match &self.websocket_url {
            Some(url) => Ok(url.clone()),
            None => compute_websocket_url(&normalize_to_url_if_moniker(&self.json_rpc_url)),
        }
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            json_rpc_url: "localhost".to_string(),
            websocket_url: None,
        }
    }
}

/// Subscription feeder configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FeederConfig {
    /// Capacity of the notification channel
    pub channel_capacity: usize,
    /// Connection establishment timeout
    pub connect_timeout_seconds: u64,
    /// Silence after which the connection is recycled
    pub idle_timeout_seconds: u64,
    /// First reconnect delay
    pub backoff_base_ms: u64,
    /// Reconnect delay ceiling
    pub backoff_max_ms: u64,
}

impl FeederConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_seconds)
    }
}

impl Default for FeederConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 4_096,
            connect_timeout_seconds: 30,
            idle_timeout_seconds: 60,
            backoff_base_ms: 500,
            backoff_max_ms: 30_000,
        }
    }
}

/// Processing pipeline configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Number of tower workers
    pub workers: usize,
    /// Queue depth per worker
    pub worker_queue: usize,
    /// Interval between status reports
    pub status_interval_seconds: u64,
    /// Towers idle longer than this are evicted; `None` keeps them forever
    pub max_idle_seconds: Option<u64>,
}

impl PipelineConfig {
    pub fn status_interval(&self) -> Duration {
        Duration::from_secs(self.status_interval_seconds)
    }

    /// Idle period after which a tower is evicted, if eviction is enabled.
    pub fn max_idle(&self) -> Option<chrono::Duration> {
        self.max_idle_seconds
            .and_then(|secs| i64::try_from(secs).ok())
            .and_then(chrono::Duration::try_seconds)
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.status_interval_seconds == 0 {
            return Err(Error::Config("status_interval_seconds must be positive".to_string()));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            worker_queue: 1_024,
            status_interval_seconds: 30,
            max_idle_seconds: Some(24 * 60 * 60),
        }
    }
}

/// Slack channel configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlackConfig {
    /// Incoming webhook URL
    pub webhook: String,
}

/// Discord channel configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscordConfig {
    /// Webhook URL
    pub webhook: String,
    /// Display name for posted messages
    pub username: String,
}

/// Notification channels; each is enabled by being present.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifierConfig {
    pub slack: Option<SlackConfig>,
    pub discord: Option<DiscordConfig>,
}

impl NotifierConfig {
    /// Read `SLACK_WEBHOOK`, `DISCORD_WEBHOOK` and `DISCORD_USERNAME`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Self {
        let slack = lookup("SLACK_WEBHOOK").map(|webhook| SlackConfig { webhook });
        let discord = lookup("DISCORD_WEBHOOK").map(|webhook| DiscordConfig {
            webhook,
            username: lookup("DISCORD_USERNAME")
                .unwrap_or_else(|| DEFAULT_DISCORD_USERNAME.to_string()),
        });
        Self { slack, discord }
    }
}
