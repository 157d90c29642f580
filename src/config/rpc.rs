//! RPC endpoint resolution.
//!
//! Accepts a cluster moniker or URL for the JSON RPC endpoint and derives the
//! matching WebSocket endpoint used for subscriptions.

use crate::core::{Error, Result};
use reqwest::Url;

/// Expand a cluster moniker to its JSON RPC URL; other input is returned as is.
pub fn normalize_to_url_if_moniker(url_or_moniker: &str) -> String {
    match url_or_moniker {
        "m" | "mainnet-beta" => "https://api.mainnet-beta.solana.com",
        "t" | "testnet" => "https://api.testnet.solana.com",
        "d" | "devnet" => "https://api.devnet.solana.com",
        "l" | "localhost" => "http://localhost:8899",
        other => other,
    }
    .to_string()
}

/// Derive the WebSocket URL for a JSON RPC URL.
///
/// `http` becomes `ws` and `https` becomes `wss`; an explicit port is
/// incremented by one, matching the default pubsub port layout.
pub fn compute_websocket_url(json_rpc_url: &str) -> Result<String> {
    let mut url = Url::parse(json_rpc_url)
        .map_err(|e| Error::Config(format!("invalid RPC URL {}: {}", json_rpc_url, e)))?;

    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(Error::Config(format!(
                "unsupported RPC URL scheme `{}` in {}",
                other, json_rpc_url
            )))
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| Error::Config(format!("cannot derive WebSocket URL from {}", json_rpc_url)))?;

    if let Some(port) = url.port() {
        let next = port
            .checked_add(1)
            .ok_or_else(|| Error::Config(format!("port {} has no successor", port)))?;
        url.set_port(Some(next))
            .map_err(|_| Error::Config(format!("cannot set port on {}", json_rpc_url)))?;
    }

    Ok(url.to_string())
}
