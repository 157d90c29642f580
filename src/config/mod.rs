//! Configuration Module
//!
//! Resolved settings for the monitor and RPC endpoint helpers.

pub mod monitor;
pub mod rpc;

pub use monitor::{
    DiscordConfig, FeederConfig, MonitorConfig, NotifierConfig, PipelineConfig, RpcConfig,
    SlackConfig,
};
pub use rpc::{compute_websocket_url, normalize_to_url_if_moniker};
