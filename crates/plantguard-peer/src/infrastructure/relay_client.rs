//! WebSocket client for the relay hub with automatic reconnection.
//!
//! [`run_relay_client`] sends every queued [`ClientEvent`] and delivers every
//! broadcast as a [`LinkEvent`].  Events queued while disconnected are sent
//! once the link is back, and an event whose send failed is resent first on
//! the next connection; a button press should not vanish because the relay
//! restarted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{Sink, SinkExt, StreamExt};
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

use plantguard_core::{ClientEvent, HubEvent};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

/// Errors that end one relay connection.
#[derive(Debug, Error)]
pub enum RelayClientError {
    #[error("failed to connect to relay at {url}: {source}")]
    ConnectFailed {
        url: String,
        #[source]
        source: WsError,
    },
    #[error("relay connection error: {0}")]
    Transport(#[from] WsError),
    #[error("connection closed by relay")]
    Closed,
}

/// Link status and traffic delivered to the dashboard.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    Connected,
    Disconnected,
    Broadcast(HubEvent),
}

/// Connects to `url` and keeps reconnecting every `reconnect_interval` until
/// `running` is cleared or `events` is dropped.
pub async fn run_relay_client(
    url: String,
    reconnect_interval: Duration,
    running: Arc<AtomicBool>,
    mut outgoing: mpsc::Receiver<ClientEvent>,
    events: mpsc::Sender<LinkEvent>,
) {
    let mut pending: Option<String> = None;

    while running.load(Ordering::Relaxed) {
        match connect_async(url.as_str()).await {
            Ok((ws, _)) => {
                info!("connected to relay at {url}");
                if events.send(LinkEvent::Connected).await.is_err() {
                    return;
                }
                let result = pump(ws, &running, &mut outgoing, &events, &mut pending).await;
                if events.send(LinkEvent::Disconnected).await.is_err() {
                    return;
                }
                match result {
                    Ok(()) => return,
                    Err(e) => warn!("{e}; reconnecting in {reconnect_interval:?}"),
                }
            }
            Err(source) => {
                let e = RelayClientError::ConnectFailed {
                    url: url.clone(),
                    source,
                };
                warn!("{e}");
            }
        }

        if !wait(reconnect_interval, &running).await {
            break;
        }
    }
}

/// Sleeps for `delay`.  Returns `false` as soon as `running` is cleared.
async fn wait(delay: Duration, running: &AtomicBool) -> bool {
    let deadline = Instant::now() + delay;
    let mut ticker = interval(SHUTDOWN_POLL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = sleep_until(deadline) => return running.load(Ordering::Relaxed),
            _ = ticker.tick() => {
                if !running.load(Ordering::Relaxed) {
                    return false;
                }
            }
        }
    }
}

/// Sends the pending event, if any.  On failure it stays pending.
async fn deliver<S>(sink: &mut S, pending: &mut Option<String>) -> Result<(), RelayClientError>
where
    S: Sink<WsMessage, Error = WsError> + Unpin,
{
    if let Some(json) = pending.take() {
        if let Err(e) = sink.send(WsMessage::Text(json.clone())).await {
            *pending = Some(json);
            return Err(e.into());
        }
    }
    Ok(())
}

/// Drives one connection.  `Ok(())` means the client should stop.
async fn pump(
    ws: WsStream,
    running: &AtomicBool,
    outgoing: &mut mpsc::Receiver<ClientEvent>,
    events: &mpsc::Sender<LinkEvent>,
    pending: &mut Option<String>,
) -> Result<(), RelayClientError> {
    let (mut ws_tx, mut ws_rx) = ws.split();
    if pending.is_some() {
        debug!("resending event left over from the previous connection");
    }
    deliver(&mut ws_tx, pending).await?;

    let mut ticker = interval(SHUTDOWN_POLL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            event = outgoing.recv() => match event {
                Some(event) => match serde_json::to_string(&event) {
                    Ok(json) => {
                        debug!(event = event.name(), "sending");
                        *pending = Some(json);
                        deliver(&mut ws_tx, pending).await?;
                    }
                    Err(e) => error!("failed to encode {}: {e}", event.name()),
                },
                None => {
                    let _ = ws_tx.close().await;
                    return Ok(());
                }
            },
            msg = ws_rx.next() => match msg {
                Some(Ok(WsMessage::Text(text))) => match serde_json::from_str::<HubEvent>(&text) {
                    Ok(event) => {
                        if events.send(LinkEvent::Broadcast(event)).await.is_err() {
                            return Ok(());
                        }
                    }
                    Err(e) => warn!("unrecognised relay event skipped: {e}"),
                },
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

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::sink;
    use plantguard_core::ActionCode;
    use tokio::net::TcpListener;
    use tokio::time::timeout;
    use tokio_tungstenite::accept_async;

    const BUTTON: &str = r#"{"event":"botao_clicado","data":{"acao":"A"}}"#;

    #[tokio::test]
    async fn test_failed_send_keeps_event_for_next_connection() {
        // Arrange
        let mut broken = Box::pin(sink::unfold((), |(), _msg: WsMessage| async {
            Err::<(), WsError>(WsError::ConnectionClosed)
        }));
        let (sent_tx, mut sent_rx) = mpsc::unbounded_channel();
        let mut healthy = Box::pin(sink::unfold(sent_tx, |tx, msg: WsMessage| async move {
            let _ = tx.send(msg);
            Ok::<_, WsError>(tx)
        }));
        let mut pending = Some(BUTTON.to_string());

        // Act
        let first = deliver(&mut broken, &mut pending).await;
        let held = pending.clone();
        let second = deliver(&mut healthy, &mut pending).await;

        // Assert
        assert!(matches!(first, Err(RelayClientError::Transport(_))));
        assert_eq!(held.as_deref(), Some(BUTTON));
        assert!(second.is_ok());
        assert_eq!(pending, None);
        assert_eq!(sent_rx.try_recv().ok(), Some(WsMessage::Text(BUTTON.to_string())));
    }

    #[tokio::test]
    async fn test_event_queued_while_disconnected_is_sent_after_reconnect() {
        // Arrange
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let running = Arc::new(AtomicBool::new(true));
        let (outgoing_tx, outgoing_rx) = mpsc::channel(4);
        let (events_tx, mut events_rx) = mpsc::channel(16);
        let client = tokio::spawn(run_relay_client(
            format!("ws://{addr}/"),
            Duration::from_millis(20),
            Arc::clone(&running),
            outgoing_rx,
            events_tx,
        ));

        // Act: the relay drops the first connection, a press is queued meanwhile
        let (first, _) = listener.accept().await.unwrap();
        let mut first = accept_async(first).await.unwrap();
        first.close(None).await.unwrap();
        while let Some(event) = events_rx.recv().await {
            if event == LinkEvent::Disconnected {
                break;
            }
        }
        outgoing_tx
            .send(ClientEvent::BotaoClicado { acao: ActionCode::new("A") })
            .await
            .unwrap();
        let (second, _) = listener.accept().await.unwrap();
        let mut second = accept_async(second).await.unwrap();

        // Assert
        let frame = timeout(Duration::from_secs(5), second.next())
            .await
            .expect("queued event never arrived")
            .unwrap()
            .unwrap();
        let json: serde_json::Value = serde_json::from_str(frame.to_text().unwrap()).unwrap();
        assert_eq!(json, serde_json::json!({"event":"botao_clicado","data":{"acao":"A"}}));

        running.store(false, Ordering::Relaxed);
        client.await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_does_not_wait_for_reconnect_interval() {
        // Arrange: nothing listens on the port, so every attempt fails
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let running = Arc::new(AtomicBool::new(true));
        let (_outgoing_tx, outgoing_rx) = mpsc::channel(1);
        let (events_tx, _events_rx) = mpsc::channel(1);
        let client = tokio::spawn(run_relay_client(
            format!("ws://{addr}/"),
            Duration::from_secs(60),
            Arc::clone(&running),
            outgoing_rx,
            events_tx,
        ));
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Act
        running.store(false, Ordering::Relaxed);

        // Assert
        timeout(Duration::from_secs(2), client)
            .await
            .expect("client still sleeping out the reconnect interval")
            .unwrap();
    }
}
