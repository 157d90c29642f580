//! Structured logging setup.

use crate::core::{Error, Result};
use tracing_subscriber::EnvFilter;

/// Default filter directive when `RUST_LOG` is unset.
pub const DEFAULT_DIRECTIVE: &str = "info";

/// Build the filter from `RUST_LOG`, falling back to `default_directive`.
pub fn env_filter(default_directive: &str) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(default_directive)
            .map_err(|e| Error::Config(format!("invalid log directive {}: {}", default_directive, e))),
    }
}

/// Install the global subscriber.
pub fn init_logging(default_directive: &str) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_directive)?)
        .with_target(true)
        .try_init()
        .map_err(|e| Error::Internal(format!("logging already initialised: {}", e)))
}
