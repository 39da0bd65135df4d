//! WebSocket server: accept loop and per-peer session tasks.
//!
//! This module is responsible for:
//!
//! 1. Binding a TCP listener on the configured address.
//! 2. Accepting connections and upgrading each one to a WebSocket.
//! 3. Registering the peer with the hub and running two forwarding tasks:
//!    - **Peer → Hub**: JSON text frames decoded as `ClientEvent`s.
//!    - **Hub → Peer**: queued `HubEvent`s encoded as JSON text frames.
//! 4. Deregistering the peer when either direction ends.
//! 5. Stopping the accept loop when the `running` flag is cleared.
//!
//! A malformed frame is logged and skipped; it never closes the session.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::{
    accept_async,
    tungstenite::{Error as WsError, Message as WsMessage},
};
use tracing::{debug, error, info, warn};

use plantguard_core::ClientEvent;

use crate::application::hub::{spawn_hub, HubHandle};
use crate::domain::config::RelayConfig;

/// How long `accept()` may block before the `running` flag is re-checked.
const ACCEPT_POLL: Duration = Duration::from_millis(200);

// ── Public API ────────────────────────────────────────────────────────────────

/// Binds the listener, starts the hub and serves peers until `running` is set
/// to `false`.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot be bound (port in use, missing
/// permission).
pub async fn run_server(config: RelayConfig, running: Arc<AtomicBool>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind relay listener on {}", config.bind_addr))?;

    info!("relay listening on ws://{}/", config.bind_addr);

    let (hub, hub_task) = spawn_hub();
    serve(listener, hub, running).await;

    // Live sessions still hold handle clones; stop the hub so they wind down.
    hub_task.abort();
    Ok(())
}

/// Runs the accept loop on an already bound listener.
///
/// Split from [`run_server`] so tests can bind `127.0.0.1:0` and keep their own
/// [`HubHandle`] for inspecting the hub.
pub async fn serve(listener: TcpListener, hub: HubHandle, running: Arc<AtomicBool>) {
    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping accept loop");
            break;
        }

        match timeout(ACCEPT_POLL, listener.accept()).await {
            Ok(Ok((stream, peer_addr))) => {
                debug!("tcp connection from {peer_addr}");
                let hub = hub.clone();
                tokio::spawn(async move {
                    handle_peer_session(stream, peer_addr, hub).await;
                });
            }
            Ok(Err(e)) => {
                // Transient accept error (e.g. too many open files).
                error!("accept error: {e}");
            }
            Err(_) => {
                // No connection within the poll interval.
            }
        }
    }
}

// ── Per-session handler ───────────────────────────────────────────────────────

async fn handle_peer_session(stream: TcpStream, peer_addr: SocketAddr, hub: HubHandle) {
    match run_session(stream, peer_addr, hub).await {
        Ok(()) => debug!("session {peer_addr} closed normally"),
        Err(e) => warn!("session {peer_addr} closed with error: {e:#}"),
    }
}

/// Runs one peer's session from handshake to disconnect.
async fn run_session(
    stream: TcpStream,
    peer_addr: SocketAddr,
    hub: HubHandle,
) -> anyhow::Result<()> {
    let ws_stream = accept_async(stream)
        .await
        .with_context(|| format!("WebSocket handshake failed with {peer_addr}"))?;

    let (peer, mut inbox) = hub.connect().context("registering peer")?;
    info!(%peer, "peer {peer_addr} joined");

    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    // ── Hub → Peer ────────────────────────────────────────────────────────────
    let mut outbound_task = tokio::spawn(async move {
        while let Some(event) = inbox.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(e) => {
                    error!(%peer, "failed to encode event: {e}");
                    continue;
                }
            };
            if ws_tx.send(WsMessage::Text(json)).await.is_err() {
                debug!(%peer, "send failed (peer disconnected)");
                break;
            }
        }
        let _ = ws_tx.close().await;
    });

    // ── Peer → Hub ────────────────────────────────────────────────────────────
    let inbound_hub = hub.clone();
    let mut inbound_task = tokio::spawn(async move {
        loop {
            let msg = match ws_rx.next().await {
                Some(Ok(msg)) => msg,
                Some(Err(WsError::ConnectionClosed | WsError::Protocol(_))) => {
                    debug!(%peer, "connection closed");
                    break;
                }
                Some(Err(e)) => {
                    warn!(%peer, "WebSocket error: {e}");
                    break;
                }
                None => break,
            };

            match msg {
                WsMessage::Text(text) => {
                    let event: ClientEvent = match serde_json::from_str(&text) {
                        Ok(event) => event,
                        Err(e) => {
                            warn!(%peer, "malformed event skipped: {e}");
                            continue;
                        }
                    };
                    if inbound_hub.event(peer, event).is_err() {
                        break;
                    }
                }
                WsMessage::Binary(_) => {
                    warn!(%peer, "unexpected binary frame (ignored)");
                }
                WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_) => {}
                WsMessage::Close(_) => {
                    debug!(%peer, "close frame received");
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut outbound_task => debug!(%peer, "outbound task ended"),
        _ = &mut inbound_task => debug!(%peer, "inbound task ended"),
    }
    outbound_task.abort();
    inbound_task.abort();

    // Ignored on shutdown: the hub may already be gone.
    let _ = hub.disconnect(peer);
    Ok(())
}
