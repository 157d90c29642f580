//! # lockout-sentinel - Tower lockout safety monitor
//!
//! Watches a live stream of validator votes and reports every vote that
//! breaks a lockout commitment:
//! - **Vote**: decoding of vote and slot notifications, slot ancestry
//! - **Tower**: per-validator lockout stacks with pure update rules
//! - **Detector**: violation classification and explanations
//! - **Incident**: durable records and webhook notifications
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lockout_sentinel::config::MonitorConfig;
//! use lockout_sentinel::feed::WsNotificationSource;
//! use lockout_sentinel::incident::create_sinks;
//! use lockout_sentinel::pipeline::Monitor;
//!
//! #[tokio::main]
//! async fn main() -> lockout_sentinel::Result<()> {
//!     let config = MonitorConfig::from_env();
//!     let url = config.rpc.resolved_websocket_url()?;
//!     let source = WsNotificationSource::new(url, config.feeder.connect_timeout());
//!
//!     let monitor = Monitor::new(config.clone(), create_sinks(&config)?);
//!     let (_stop, shutdown) = tokio::sync::watch::channel(false);
//!     let status = monitor.run(source, shutdown).await?;
//!     println!("{}", status);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod detector;
pub mod feed;
pub mod incident;
pub mod monitoring;
pub mod pipeline;
pub mod tower;
pub mod vote;

pub use core::error::{Error, Result};
