//! Process wiring: serial half and relay link joined by two channels.
//!
//! ```text
//!  Supervisor ──readings (bounded, lossy)──> relay link ──> relay hub
//!  Supervisor <──commands (bounded)───────── relay link <── relay hub
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::info;

use crate::application::{run_bridge, PortBackend};
use crate::domain::config::BridgeConfig;
use crate::infrastructure::relay_conn::{run_relay_link, RelayLinkConfig};

/// Readings waiting for the relay link; older ones are dropped beyond this.
const READING_QUEUE: usize = 64;
/// Commands waiting for the serial port.
const COMMAND_QUEUE: usize = 16;

/// Runs the bridge until `running` is cleared.
///
/// # Errors
///
/// Returns an error only if the relay link task panicked.
pub async fn run(
    config: BridgeConfig,
    backend: Arc<dyn PortBackend>,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let (readings_tx, readings_rx) = mpsc::channel(READING_QUEUE);
    let (commands_tx, commands_rx) = mpsc::channel(COMMAND_QUEUE);

    info!("relay link targets {}", config.relay_url);
    let link = tokio::spawn(run_relay_link(
        RelayLinkConfig::from(&config),
        Arc::clone(&running),
        readings_rx,
        commands_tx,
    ));

    let exit = run_bridge(&config, backend, Arc::clone(&running), readings_tx, commands_rx).await;
    info!(?exit, "serial side stopped");

    // The supervisor also stops when the command channel closes.
    running.store(false, Ordering::Relaxed);
    link.await.context("relay link task failed")?;
    Ok(())
}
