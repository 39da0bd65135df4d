//! PlantGuard bridge: entry point.
//!
//! Finds the board's serial port, keeps a supervised session open on it and
//! relays readings and commands to and from the relay hub.
//!
//! # Usage
//!
//! ```text
//! plantguard-bridge [OPTIONS]
//!
//! Options:
//!   --relay-host <HOST>           Relay hub host [default: 127.0.0.1]
//!   --relay-port <PORT>           Relay hub port [default: 3000]
//!   --serial-port <PATH>          Skip detection and open PATH
//!   --baud-rate <BAUD>            [default: 9600]
//!   --delimiter <DELIM>           Inbound frame terminator: lf, crlf, cr or a literal
//!   --command-terminator <DELIM>  Appended to outbound commands [default: none]
//!   --max-retries <N>             Give up after N consecutive failures
//!   --config <FILE>               TOML config file
//! ```
//!
//! Precedence is CLI flag > environment variable > config file > default.
//!
//! | Variable                   | Flag              |
//! |----------------------------|-------------------|
//! | `SERIAL_PORT`              | `--serial-port`   |
//! | `PLANTGUARD_RELAY_HOST`    | `--relay-host`    |
//! | `PLANTGUARD_RELAY_PORT`    | `--relay-port`    |
//! | `PLANTGUARD_BRIDGE_CONFIG` | `--config`        |

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use plantguard_bridge::domain::BridgeConfig;
use plantguard_bridge::infrastructure::{
    config_file::relay_url, load_config, run, BridgeFileConfig, SystemPorts,
};
use plantguard_core::Delimiter;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// PlantGuard serial bridge.
#[derive(Debug, Parser)]
#[command(
    name = "plantguard-bridge",
    about = "Bridges the PlantGuard board's serial port to the relay hub",
    version
)]
struct Cli {
    /// Relay hub host name or IP address.
    #[arg(long, env = "PLANTGUARD_RELAY_HOST")]
    relay_host: Option<String>,

    /// Relay hub port.
    #[arg(long, env = "PLANTGUARD_RELAY_PORT")]
    relay_port: Option<u16>,

    /// Serial port to open instead of auto-detecting the board.
    #[arg(long, env = "SERIAL_PORT")]
    serial_port: Option<String>,

    /// Serial baud rate.
    #[arg(long)]
    baud_rate: Option<u32>,

    /// Inbound frame terminator (`lf`, `crlf`, `cr` or a literal such as `\r\n`).
    #[arg(long)]
    delimiter: Option<Delimiter>,

    /// Bytes appended to each command written to the board.
    #[arg(long)]
    command_terminator: Option<Delimiter>,

    /// Consecutive serial failures tolerated before giving up (default: retry forever).
    #[arg(long)]
    max_retries: Option<u32>,

    /// Path to the TOML config file.
    #[arg(long, env = "PLANTGUARD_BRIDGE_CONFIG")]
    config: Option<PathBuf>,
}

impl Cli {
    /// Layers the flags over `file`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file's command table is invalid.
    fn into_bridge_config(self, file: BridgeFileConfig) -> anyhow::Result<BridgeConfig> {
        let host = self.relay_host.unwrap_or_else(|| file.relay.host.clone());
        let port = self.relay_port.unwrap_or(file.relay.port);

        let mut config = file
            .into_bridge_config()
            .context("invalid bridge configuration")?;

        config.relay_url = relay_url(&host, port);
        if let Some(path) = self.serial_port.filter(|p| !p.trim().is_empty()) {
            config.serial_port = Some(path);
        }
        if let Some(baud_rate) = self.baud_rate {
            config.serial.baud_rate = baud_rate;
        }
        if let Some(delimiter) = self.delimiter {
            config.serial.delimiter = delimiter;
        }
        if let Some(terminator) = self.command_terminator {
            config.serial.command_terminator = Some(terminator);
        }
        if let Some(max_retries) = self.max_retries {
            config.restart.max_retries = Some(max_retries);
        }
        Ok(config)
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

    let cli = Cli::parse();
    let file = load_config(cli.config.as_deref()).context("failed to load config file")?;
    let config = cli.into_bridge_config(file)?;
    let backend = Arc::new(SystemPorts::new(config.serial.read_timeout));

    info!(
        "PlantGuard bridge starting (relay {}, {} baud)",
        config.relay_url, config.serial.baud_rate
    );

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

    run(config, backend, running).await?;

    info!("PlantGuard bridge stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
