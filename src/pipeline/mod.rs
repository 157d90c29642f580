//! Pipeline Module
//!
//! Decode → track → detect → emit, one vote at a time per validator and
//! concurrently across validators.

pub mod dispatcher;
pub mod monitor;
pub mod worker;

pub use dispatcher::{route_for, Dispatcher};
pub use monitor::{Monitor, STARTUP_ANNOUNCEMENT};
pub use worker::Worker;
