//! The bridge's serial half: supervisor plus what happens when it gives up.
//!
//! The relay link is started separately (see `infrastructure::runtime`) and
//! talks to this half only through two channels, so a dead serial port never
//! takes the relay connection down with it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{error, warn};

use plantguard_core::{ActionCode, SensorReading};

use super::ports::PortBackend;
use super::supervisor::{DeviceSelector, Supervisor, SupervisorExit};
use crate::domain::config::BridgeConfig;

const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

/// Runs the supervised serial loop for `config`.
///
/// When the restart policy is exhausted the function keeps consuming
/// `commands` (logging each as dropped) until `running` is cleared, so the
/// relay side stays responsive.
pub async fn run_bridge(
    config: &BridgeConfig,
    backend: Arc<dyn PortBackend>,
    running: Arc<AtomicBool>,
    readings: mpsc::Sender<SensorReading>,
    mut commands: mpsc::Receiver<ActionCode>,
) -> SupervisorExit {
    let supervisor = Supervisor::new(
        backend,
        DeviceSelector::from_config(config),
        config.serial.clone(),
        config.restart.clone(),
    );

    let exit = supervisor
        .run(Arc::clone(&running), readings.clone(), &mut commands)
        .await;

    if let SupervisorExit::RetriesExhausted { failures } = exit {
        error!(failures, "serial port abandoned; relay link stays up until shutdown");
        drain_until_shutdown(&running, &mut commands).await;
    }
    exit
}

async fn drain_until_shutdown(running: &AtomicBool, commands: &mut mpsc::Receiver<ActionCode>) {
    while running.load(Ordering::Relaxed) {
        tokio::select! {
            command = commands.recv() => match command {
                Some(code) => warn!(%code, "no serial port; command dropped"),
                None => break,
            },
            _ = tokio::time::sleep(SHUTDOWN_POLL) => {}
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::MockPortBackend;
    use crate::application::session::SessionError;
    use crate::domain::config::RestartPolicy;

    #[tokio::test]
    async fn test_exhausted_supervisor_keeps_draining_commands_until_shutdown() {
        // Arrange
        let mut backend = MockPortBackend::new();
        backend.expect_list_ports().returning(|| Ok(Vec::new()));
        backend.expect_open().times(1).returning(|path, _| {
            Err(SessionError::PortUnavailable {
                path: path.to_string(),
                reason: "not found".to_string(),
            })
        });
        let config = BridgeConfig {
            restart: RestartPolicy {
                max_retries: Some(0),
                ..RestartPolicy::default()
            },
            ..BridgeConfig::default()
        };
        let running = Arc::new(AtomicBool::new(true));
        let (readings_tx, _readings_rx) = mpsc::channel(4);
        let (commands_tx, commands_rx) = mpsc::channel(4);
        let task = tokio::spawn({
            let running = Arc::clone(&running);
            let backend = Arc::new(backend);
            async move { run_bridge(&config, backend, running, readings_tx, commands_rx).await }
        });

        // Act: commands are still accepted after the serial side gave up
        commands_tx.send(ActionCode::new("A")).await.unwrap();
        commands_tx.send(ActionCode::new("F")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!task.is_finished());
        running.store(false, Ordering::Relaxed);

        // Assert
        let exit = task.await.unwrap();
        assert_eq!(exit, SupervisorExit::RetriesExhausted { failures: 1 });
    }
}
