//! Monitoring Module
//!
//! Observability for the monitor itself:
//! - Pipeline counters and status reports
//! - Structured logging

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, DEFAULT_DIRECTIVE};
pub use metrics::{Counter, PipelineMetrics, StatusReport};
