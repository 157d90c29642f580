//! IncidentSink trait and built-in sinks.
//!
//! A sink receives every published incident. Sinks fail independently: an
//! error in one never prevents delivery to the others.

use crate::core::{Error, Result};
use crate::incident::record::Incident;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Sink type identifier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SinkType {
    /// Durable JSON record per incident
    File,
    /// Slack incoming webhook
    Slack,
    /// Discord webhook
    Discord,
    /// In-process collection
    Memory,
}

impl std::fmt::Display for SinkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkType::File => write!(f, "file"),
            SinkType::Slack => write!(f, "slack"),
            SinkType::Discord => write!(f, "discord"),
            SinkType::Memory => write!(f, "memory"),
        }
    }
}

/// Core trait for incident consumers.
#[async_trait]
pub trait IncidentSink: Send + Sync {
    /// Deliver one incident.
    async fn deliver(&self, incident: &Incident) -> Result<()>;

    /// Get the sink type.
    fn sink_type(&self) -> SinkType;

    /// Deliver a plain status message. Sinks without a chat surface ignore it.
    async fn announce(&self, _message: &str) -> Result<()> {
        Ok(())
    }
}

/// Writes one JSON file per incident.
pub struct FileIncidentSink {
    dir: PathBuf,
}

impl FileIncidentSink {
    /// Create a sink writing into `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory incidents are written to.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name for an incident.
    pub fn file_name(incident: &Incident) -> String {
        format!(
            "incident-{}-{}.json",
            incident.validator_id, incident.transaction_signature
        )
    }
}

#[async_trait]
impl IncidentSink for FileIncidentSink {
    async fn deliver(&self, incident: &Incident) -> Result<()> {
        let path = self.dir.join(Self::file_name(incident));
        let body = serde_json::to_vec_pretty(incident)?;
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(&path, body).await.map_err(|e| Error::Delivery {
            sink: SinkType::File.to_string(),
            message: format!("unable to write {}: {}", path.display(), e),
        })
    }

    fn sink_type(&self) -> SinkType {
        SinkType::File
    }
}

/// Collects incidents in memory.
#[derive(Clone, Default)]
pub struct MemorySink {
    incidents: Arc<Mutex<Vec<Incident>>>,
    messages: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Incidents delivered so far.
    pub fn incidents(&self) -> Vec<Incident> {
        self.incidents.lock().clone()
    }

    /// Status messages delivered so far.
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }
}

#[async_trait]
impl IncidentSink for MemorySink {
    async fn deliver(&self, incident: &Incident) -> Result<()> {
        self.incidents.lock().push(incident.clone());
        Ok(())
    }

    fn sink_type(&self) -> SinkType {
        SinkType::Memory
    }

    async fn announce(&self, message: &str) -> Result<()> {
        self.messages.lock().push(message.to_string());
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::core::ValidatorId;
    use crate::detector::detect;
    use crate::incident::record::Incident;
    use crate::tower::Tower;
    use crate::vote::types::fixtures::vote;

    /// A lockout violation incident for validator `validator`.
    pub fn incident(validator: u8) -> Incident {
        let mut tower = Tower::new(ValidatorId::new([validator; 32]));
        tower.apply(&vote(validator, 10, 0, 1, &[8]));
        let detected = detect(tower.apply(&vote(validator, 9, 1, 1, &[5, 6])))
            .expect("fixture vote must violate");
        Incident::from_detection(detected)
    }
}
