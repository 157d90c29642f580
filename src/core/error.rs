//! Error types for lockout-sentinel.

use crate::vote::DecodeError;
use thiserror::Error;

/// Result type alias for lockout-sentinel operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in lockout-sentinel operations.
#[derive(Error, Debug)]
pub enum Error {
    // Input errors
    #[error("Decode failed: {0}")]
    Decode(#[from] DecodeError),

    // Subscription errors
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Subscription rejected by {endpoint}: {reason}")]
    SubscriptionRejected { endpoint: String, reason: String },

    #[error("Connection idle for {0} seconds")]
    IdleTimeout(u64),

    #[error("Subscription stream closed")]
    StreamClosed,

    #[error("Notification source exhausted")]
    SourceExhausted,

    // Delivery errors
    #[error("{sink} delivery failed: {message}")]
    Delivery { sink: String, message: String },

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    Config(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    SerializationError(String),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

impl From<jsonrpsee::core::ClientError> for Error {
    fn from(err: jsonrpsee::core::ClientError) -> Self {
        Error::Connection(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Delivery {
            sink: "webhook".to_string(),
            message: err.to_string(),
        }
    }
}
