//! Lockout Sentinel
//!
//! Subscribes to a node's vote notifications and reports lockout violations.
//!
//! # Usage
//!
//! ```bash
//! lockout-sentinel --url devnet --incident-dir /var/lib/lockout-sentinel
//! ```
//!
//! Slack and Discord notifications are enabled with `SLACK_WEBHOOK`,
//! `DISCORD_WEBHOOK` and `DISCORD_USERNAME`.

use anyhow::{Context, Result};
use clap::Parser;
use lockout_sentinel::config::MonitorConfig;
use lockout_sentinel::feed::WsNotificationSource;
use lockout_sentinel::incident::create_sinks;
use lockout_sentinel::monitoring::init_logging;
use lockout_sentinel::pipeline::Monitor;
use std::path::PathBuf;
use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};

/// Lockout Sentinel
///
/// Monitors validator votes for Tower lockout violations.
#[derive(Parser, Debug)]
#[command(name = "lockout-sentinel")]
#[command(version, about, long_about = None)]
struct Cli {
    /// JSON RPC URL or moniker (mainnet-beta, testnet, devnet, localhost)
    #[arg(short = 'u', long = "url", default_value = "localhost")]
    json_rpc_url: String,

    /// WebSocket URL (derived from the RPC URL when omitted)
    #[arg(long)]
    ws_url: Option<String>,

    /// Directory for incident records
    #[arg(long, default_value = ".")]
    incident_dir: PathBuf,

    /// Number of tower workers
    #[arg(long)]
    workers: Option<usize>,

    /// Log level filter (overridden by RUST_LOG)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Cli {
    fn into_config(self) -> MonitorConfig {
        let mut config = MonitorConfig::from_env();
        config.rpc.json_rpc_url = self.json_rpc_url;
        config.rpc.websocket_url = self.ws_url;
        config.incident_dir = self.incident_dir;
        if let Some(workers) = self.workers {
            config.pipeline.workers = workers;
        }
        config
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level).context("failed to initialise logging")?;

    let config = cli.into_config();
    tokio::fs::create_dir_all(&config.incident_dir)
        .await
        .with_context(|| format!("cannot create {}", config.incident_dir.display()))?;

    let websocket_url = config
        .rpc
        .resolved_websocket_url()
        .context("cannot resolve WebSocket URL")?;
    info!(
        json_rpc_url = %config.rpc.json_rpc_url,
        websocket_url = %websocket_url,
        incident_dir = %config.incident_dir.display(),
        slack = config.notifier.slack.is_some(),
        discord = config.notifier.discord.is_some(),
        "Lockout Sentinel starting..."
    );

    let source = WsNotificationSource::new(websocket_url, config.feeder.connect_timeout());
    let sinks = create_sinks(&config).context("cannot create incident sinks")?;
    let monitor = Monitor::new(config.clone(), sinks);

    let (stop, shutdown) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Initiating graceful shutdown...");
        let _ = stop.send(true);
    });

    let status = monitor
        .run(source, shutdown)
        .await
        .context("monitor stopped with an error")?;
    info!(%status, "Lockout Sentinel stopped");
    Ok(())
}
