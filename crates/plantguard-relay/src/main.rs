//! PlantGuard relay hub: entry point.
//!
//! Accepts WebSocket connections from the bridge and from any number of
//! dashboards, and fans every reading and button press out to all of them.
//!
//! # Usage
//!
//! ```text
//! plantguard-relay [OPTIONS]
//!
//! Options:
//!   --bind <ADDR>   Address to listen on [default: 0.0.0.0]
//!   --port <PORT>   WebSocket listener port [default: 3000]
//! ```
//!
//! | Variable                | Default   |
//! |-------------------------|-----------|
//! | `PLANTGUARD_RELAY_BIND` | `0.0.0.0` |
//! | `PLANTGUARD_RELAY_PORT` | `3000`    |

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use plantguard_relay::domain::RelayConfig;
use plantguard_relay::infrastructure::run_server;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// PlantGuard relay hub.
#[derive(Debug, Parser)]
#[command(
    name = "plantguard-relay",
    about = "WebSocket relay that broadcasts PlantGuard readings and commands",
    version
)]
struct Cli {
    /// IP address to bind the listener to.
    #[arg(long, default_value = "0.0.0.0", env = "PLANTGUARD_RELAY_BIND")]
    bind: String,

    /// TCP port peers connect to (ws://host:PORT/).
    #[arg(long, default_value_t = 3000, env = "PLANTGUARD_RELAY_PORT")]
    port: u16,
}

impl Cli {
    /// # Errors
    ///
    /// Returns an error if `--bind` is not a valid IP address.
    fn into_relay_config(self) -> anyhow::Result<RelayConfig> {
        let bind_addr: SocketAddr = format!("{}:{}", self.bind, self.port)
            .parse()
            .with_context(|| format!("invalid bind address: '{}:{}'", self.bind, self.port))?;
        Ok(RelayConfig { bind_addr })
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Cli::parse().into_relay_config()?;
    info!("PlantGuard relay starting on {}", config.bind_addr);

    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, shutting down");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    run_server(config, running).await?;

    info!("PlantGuard relay stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
