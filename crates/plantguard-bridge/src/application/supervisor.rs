//! Device selection and the supervised serial loop.
//!
//! The supervisor keeps one [`SerialSession`] alive for as long as the bridge
//! runs:
//!
//! ```text
//!   select port ──> open ──ok──> pump readings / commands ──session closed──┐
//!        ↑            │                                                      │
//!        │          error                                                    │
//!        │            ↓                                                      │
//!        └──── backoff (RestartPolicy) <─────────────────────────────────────┘
//! ```
//!
//! Selection runs again before every attempt, so a board that is unplugged
//! and replugged under a different path is picked up.  The failure counter
//! resets only after a session stayed open for the policy's `healthy_after`;
//! a board that drops straight after opening counts as another failure.
//!
//! The supervisor owns the `Opening` state: it is published on
//! [`Supervisor::state`] while a port is being opened.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::watch;
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use plantguard_core::{
    locate_with, select_port, ActionCode, KnownDevices, PortSelection, SensorReading,
};

use super::ports::PortBackend;
use super::session::{CloseReason, ReadingStream, SerialSession, SessionError, SessionState};
use crate::domain::config::{BridgeConfig, RestartPolicy, SerialOptions};

/// How often the `running` flag is checked while waiting.
const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

// ── DeviceSelector ────────────────────────────────────────────────────────────

/// Picks the serial path to open: override, then detected board, then the
/// platform default.
#[derive(Debug, Clone)]
pub struct DeviceSelector {
    override_path: Option<String>,
    known: KnownDevices,
    platform_default: String,
}

impl DeviceSelector {
    pub fn new(
        override_path: Option<String>,
        known: KnownDevices,
        platform_default: impl Into<String>,
    ) -> Self {
        Self {
            override_path,
            known,
            platform_default: platform_default.into(),
        }
    }

    pub fn from_config(config: &BridgeConfig) -> Self {
        Self::new(
            config.serial_port.clone(),
            config.devices.clone(),
            config.platform_default_port.clone(),
        )
    }

    /// Enumerates ports through `backend` and applies the selection rules.
    ///
    /// Never fails: an enumeration error is logged and treated as "no board
    /// detected".
    pub fn select(&self, backend: &dyn PortBackend) -> PortSelection {
        let candidates = match backend.list_ports() {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!("{e}; falling back to the configured or default path");
                Vec::new()
            }
        };
        debug!(count = candidates.len(), "serial ports enumerated");

        let located = locate_with(&candidates, &self.known, |candidate, matched| {
            info!(
                path = %candidate.path,
                manufacturer = candidate.manufacturer.as_deref().unwrap_or("-"),
                vendor_id = candidate.vendor_id.as_deref().unwrap_or("-"),
                product_id = candidate.product_id.as_deref().unwrap_or("-"),
                matched,
                "serial candidate"
            );
        });

        let selection = select_port(
            self.override_path.as_deref(),
            located,
            &self.platform_default,
        );
        info!(path = %selection.path, source = ?selection.source, "serial port selected");
        selection
    }
}

// ── Supervisor ────────────────────────────────────────────────────────────────

/// How [`Supervisor::run`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorExit {
    /// The `running` flag was cleared or the command channel closed.
    Shutdown,
    /// The restart policy ran out after `failures` consecutive failures.
    RetriesExhausted { failures: u32 },
}

enum SessionEnd {
    Closed(CloseReason),
    Shutdown,
}

/// Keeps a serial session open, reopening it under a [`RestartPolicy`].
pub struct Supervisor {
    backend: Arc<dyn PortBackend>,
    selector: DeviceSelector,
    options: SerialOptions,
    policy: RestartPolicy,
    state: watch::Sender<SessionState>,
}

impl Supervisor {
    pub fn new(
        backend: Arc<dyn PortBackend>,
        selector: DeviceSelector,
        options: SerialOptions,
        policy: RestartPolicy,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Closed);
        Self {
            backend,
            selector,
            options,
            policy,
            state,
        }
    }

    /// Observes the current session state.
    pub fn state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Runs until shutdown or until the restart policy gives up.
    ///
    /// Readings are offered to `readings` without waiting; when the consumer
    /// is behind they are dropped, the next one is only a moment away.
    /// Commands from `commands` are written to the open session, or dropped
    /// with a warning while the port is closed.
    pub async fn run(
        &self,
        running: Arc<AtomicBool>,
        readings: mpsc::Sender<SensorReading>,
        commands: &mut mpsc::Receiver<ActionCode>,
    ) -> SupervisorExit {
        let mut failures: u32 = 0;

        while running.load(Ordering::Relaxed) {
            let selection = self.selector.select(self.backend.as_ref());
            self.state.send_replace(SessionState::Opening);

            match self.open_session(&selection.path).await {
                Ok((session, mut stream)) => {
                    let opened_at = Instant::now();
                    self.state.send_replace(SessionState::Open);
                    let end = self
                        .pump(&session, &mut stream, &running, &readings, commands)
                        .await;
                    self.state.send_replace(SessionState::Closed);
                    match end {
                        SessionEnd::Shutdown => return SupervisorExit::Shutdown,
                        SessionEnd::Closed(reason) => {
                            let uptime = opened_at.elapsed();
                            if self.policy.is_healthy(uptime) {
                                failures = 0;
                            }
                            warn!(
                                path = %selection.path,
                                ?uptime,
                                "serial session ended: {reason}"
                            );
                        }
                    }
                }
                Err(e) => {
                    self.state.send_replace(SessionState::Closed);
                    error!("{e}");
                }
            }

            failures = failures.saturating_add(1);
            if !self.policy.allows(failures) {
                error!(failures, "giving up on the serial port");
                return SupervisorExit::RetriesExhausted { failures };
            }

            let delay = self.policy.backoff(failures);
            info!(attempt = failures, ?delay, "reopening serial port after backoff");
            if !wait(delay, &running, commands).await {
                return SupervisorExit::Shutdown;
            }
        }

        SupervisorExit::Shutdown
    }

    async fn open_session(
        &self,
        path: &str,
    ) -> Result<(SerialSession, ReadingStream), SessionError> {
        let backend = Arc::clone(&self.backend);
        let owned_path = path.to_string();
        let options = self.options.clone();

        // Opening a real port can block for a while.
        tokio::task::spawn_blocking(move || {
            SerialSession::open(backend.as_ref(), &owned_path, options)
        })
        .await
        .unwrap_or_else(|e| {
            Err(SessionError::PortUnavailable {
                path: path.to_string(),
                reason: format!("open task failed: {e}"),
            })
        })
    }

    async fn pump(
        &self,
        session: &SerialSession,
        stream: &mut ReadingStream,
        running: &AtomicBool,
        readings: &mpsc::Sender<SensorReading>,
        commands: &mut mpsc::Receiver<ActionCode>,
    ) -> SessionEnd {
        let mut ticker = interval(SHUTDOWN_POLL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                reading = stream.next() => match reading {
                    Some(reading) => forward(readings, reading),
                    None => return SessionEnd::Closed(session.closed().await),
                },
                command = commands.recv() => match command {
                    Some(code) => write_command(session, &code).await,
                    None => {
                        session.close().await;
                        return SessionEnd::Shutdown;
                    }
                },
                _ = ticker.tick() => {
                    if !running.load(Ordering::Relaxed) {
                        session.close().await;
                        return SessionEnd::Shutdown;
                    }
                }
            }
        }
    }
}

fn forward(readings: &mpsc::Sender<SensorReading>, reading: SensorReading) {
    match readings.try_send(reading) {
        Ok(()) => {}
        Err(TrySendError::Full(reading)) => {
            debug!(?reading, "relay link busy; reading dropped");
        }
        Err(TrySendError::Closed(_)) => {
            debug!("relay link gone; reading dropped");
        }
    }
}

async fn write_command(session: &SerialSession, code: &ActionCode) {
    match session.write_code(code).await {
        Ok(()) => info!(%code, "command written to the board"),
        Err(e @ SessionError::UnknownCommand(_)) => warn!("{e}; nothing written"),
        Err(e) => warn!(%code, "{e}"),
    }
}

/// Sleeps for `delay`, dropping commands that arrive meanwhile.
///
/// Returns `false` when shutdown was requested during the wait.
async fn wait(
    delay: Duration,
    running: &AtomicBool,
    commands: &mut mpsc::Receiver<ActionCode>,
) -> bool {
    let deadline = Instant::now() + delay;
    let mut ticker = interval(SHUTDOWN_POLL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = sleep_until(deadline) => return running.load(Ordering::Relaxed),
            command = commands.recv() => match command {
                Some(code) => warn!(%code, "serial port not open; command dropped"),
                None => return false,
            },
            _ = ticker.tick() => {
                if !running.load(Ordering::Relaxed) {
                    return false;
                }
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
