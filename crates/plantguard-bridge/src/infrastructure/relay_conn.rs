//! WebSocket link from the bridge to the relay hub.
//!
//! Architecture:
//! - [`run_relay_link`] owns a reconnect loop; each iteration dials the relay
//!   and pumps until the connection drops.
//! - Outbound: every [`SensorReading`] from the supervisor is sent as a
//!   `luminosidade` event.
//! - Inbound: every `botao_clicado` broadcast is forwarded to the supervisor as
//!   an [`ActionCode`].  The bridge's own readings echoed back by the hub are
//!   ignored.
//!
//! While disconnected, readings are discarded rather than queued; a stale light
//! level is worthless once a fresh one arrives.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{Error as WsError, Message as WsMessage},
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, error, info, warn};

use plantguard_core::{ActionCode, ClientEvent, HubEvent, SensorReading};

use crate::domain::config::BridgeConfig;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How often the `running` flag is checked while idle.
const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

/// Errors that end one relay connection.
#[derive(Debug, Error)]
pub enum RelayClientError {
    /// The WebSocket handshake with the relay failed.
    #[error("failed to connect to relay at {url}: {source}")]
    ConnectFailed {
        url: String,
        #[source]
        source: WsError,
    },
    /// An I/O or protocol error on the established connection.
    #[error("relay connection error: {0}")]
    Transport(#[from] WsError),
    /// The relay closed the connection.
    #[error("connection closed by relay")]
    Closed,
}

/// Where and how often to dial the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayLinkConfig {
    pub url: String,
    pub reconnect_interval: Duration,
}

impl From<&BridgeConfig> for RelayLinkConfig {
    fn from(config: &BridgeConfig) -> Self {
        Self {
            url: config.relay_url.clone(),
            reconnect_interval: config.relay_reconnect_interval,
        }
    }
}

/// Keeps a connection to the relay until `running` is cleared.
pub async fn run_relay_link(
    config: RelayLinkConfig,
    running: Arc<AtomicBool>,
    mut readings: mpsc::Receiver<SensorReading>,
    commands: mpsc::Sender<ActionCode>,
) {
    while running.load(Ordering::Relaxed) {
        match connect(&config.url).await {
            Ok(ws) => {
                info!("connected to relay at {}", config.url);
                match pump(ws, &running, &mut readings, &commands).await {
                    Ok(()) => break,
                    Err(e) => warn!("{e}"),
                }
                info!(
                    "disconnected from relay; reconnecting in {:?}",
                    config.reconnect_interval
                );
            }
            Err(e) => warn!("{e}"),
        }

        idle(config.reconnect_interval, &running, &mut readings).await;
    }
    debug!("relay link stopped");
}

async fn connect(url: &str) -> Result<WsStream, RelayClientError> {
    let (ws, _response) = connect_async(url)
        .await
        .map_err(|source| RelayClientError::ConnectFailed {
            url: url.to_string(),
            source,
        })?;
    Ok(ws)
}

/// Drives one connection.  `Ok(())` means shutdown was requested.
async fn pump(
    ws: WsStream,
    running: &AtomicBool,
    readings: &mut mpsc::Receiver<SensorReading>,
    commands: &mpsc::Sender<ActionCode>,
) -> Result<(), RelayClientError> {
    let (mut ws_tx, mut ws_rx) = ws.split();
    let mut ticker = interval(SHUTDOWN_POLL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut readings_open = true;

    loop {
        tokio::select! {
            reading = readings.recv(), if readings_open => match reading {
                Some(reading) => {
                    let event = ClientEvent::Luminosidade(reading);
                    match serde_json::to_string(&event) {
                        Ok(json) => ws_tx.send(WsMessage::Text(json)).await?,
                        Err(e) => error!("failed to encode reading: {e}"),
                    }
                }
                None => readings_open = false,
            },
            msg = ws_rx.next() => match msg {
                Some(Ok(WsMessage::Text(text))) => on_text(&text, commands).await,
                Some(Ok(WsMessage::Close(_))) | None => return Err(RelayClientError::Closed),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
            },
            _ = ticker.tick() => {
                if !running.load(Ordering::Relaxed) {
                    let _ = ws_tx.close().await;
                    return Ok(());
                }
            }
        }
    }
}

async fn on_text(text: &str, commands: &mpsc::Sender<ActionCode>) {
    match serde_json::from_str::<HubEvent>(text) {
        Ok(HubEvent::BotaoClicado(code)) => {
            info!(%code, "command received from relay");
            if commands.send(code).await.is_err() {
                debug!("serial side gone; command dropped");
            }
        }
        Ok(HubEvent::Luminosidade(_)) => {}
        Err(e) => warn!("unrecognised relay event skipped: {e}"),
    }
}

/// Waits out the reconnect interval, discarding readings produced meanwhile.
async fn idle(delay: Duration, running: &AtomicBool, readings: &mut mpsc::Receiver<SensorReading>) {
    let deadline = Instant::now() + delay;
    let mut ticker = interval(SHUTDOWN_POLL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut readings_open = true;

    loop {
        tokio::select! {
            _ = sleep_until(deadline) => return,
            reading = readings.recv(), if readings_open => match reading {
                Some(reading) => debug!(?reading, "relay offline; reading dropped"),
                None => readings_open = false,
            },
            _ = ticker.tick() => {
                if !running.load(Ordering::Relaxed) {
                    return;
                }
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
