//! PlantGuard terminal dashboard: entry point.
//!
//! Prints every reading broadcast by the relay with its tier and toggles the
//! window from the keyboard.
//!
//! # Usage
//!
//! ```text
//! plantguard-peer [OPTIONS]
//!
//! Options:
//!   --relay-host <HOST>   Relay hub host [default: 127.0.0.1]
//!   --relay-port <PORT>   Relay hub port [default: 3000]
//!   --bands <TABLE>       browser | firmware [default: browser]
//!
//! Keys (followed by Enter):
//!   <Enter>  toggle the window (sends botao_clicado)
//!   s        report the window state (sends janela)
//!   q        quit
//! ```

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use plantguard_core::BandTable;
use plantguard_peer::application::{render, PeerService};
use plantguard_peer::domain::PeerConfig;
use plantguard_peer::infrastructure::{run_relay_client, LinkEvent};

// ── CLI argument definitions ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Bands {
    /// ≤30 critical, ≤50 warning, ≤70 ideal, ≤90 warning, above critical.
    Browser,
    /// The browser table with ≤15 split off as its own critical band.
    Firmware,
}

impl Bands {
    fn table(self) -> BandTable {
        match self {
            Bands::Browser => BandTable::browser(),
            Bands::Firmware => BandTable::firmware(),
        }
    }
}

/// PlantGuard terminal dashboard.
#[derive(Debug, Parser)]
#[command(
    name = "plantguard-peer",
    about = "Terminal dashboard for PlantGuard light readings",
    version
)]
struct Cli {
    /// Relay hub host name or IP address.
    #[arg(long, default_value = "127.0.0.1", env = "PLANTGUARD_RELAY_HOST")]
    relay_host: String,

    /// Relay hub port.
    #[arg(long, default_value_t = 3000, env = "PLANTGUARD_RELAY_PORT")]
    relay_port: u16,

    /// Band table used to colour readings.
    #[arg(long, value_enum, default_value_t = Bands::Browser)]
    bands: Bands,
}

impl Cli {
    fn into_peer_config(self) -> PeerConfig {
        let host = if self.relay_host.contains(':') && !self.relay_host.starts_with('[') {
            format!("[{}]", self.relay_host)
        } else {
            self.relay_host
        };
        PeerConfig {
            relay_url: format!("ws://{host}:{}/", self.relay_port),
            bands: self.bands.table(),
            ..PeerConfig::default()
        }
    }
}

/// What a line typed on stdin asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyCommand {
    Toggle,
    Report,
    Quit,
    Unknown,
}

fn parse_key(line: &str) -> KeyCommand {
    match line.trim() {
        "" | "t" => KeyCommand::Toggle,
        "s" => KeyCommand::Report,
        "q" => KeyCommand::Quit,
        _ => KeyCommand::Unknown,
    }
}

/// Reads stdin lines on a dedicated thread.
///
/// A blocking read on a Tokio blocking-pool thread would keep the runtime
/// from shutting down until the next Enter.
fn spawn_stdin_reader() -> anyhow::Result<mpsc::Receiver<String>> {
    let (tx, rx) = mpsc::channel(8);
    std::thread::Builder::new()
        .name("plantguard-stdin".to_string())
        .spawn(move || {
            for line in std::io::stdin().lines() {
                match line {
                    Ok(line) => {
                        if tx.blocking_send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::error!("failed to read stdin: {e}");
                        break;
                    }
                }
            }
        })
        .context("failed to spawn stdin reader thread")?;
    Ok(rx)
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Cli::parse().into_peer_config();
    info!("PlantGuard dashboard connecting to {}", config.relay_url);

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

    let (outgoing_tx, outgoing_rx) = mpsc::channel(16);
    let (events_tx, mut events_rx) = mpsc::channel(64);
    let link = tokio::spawn(run_relay_client(
        config.relay_url.clone(),
        config.reconnect_interval,
        Arc::clone(&running),
        outgoing_rx,
        events_tx,
    ));

    let mut service = PeerService::new(&config);
    let mut lines = spawn_stdin_reader()?;
    let mut stdin_open = true;
    println!("Enter: toggle window | s: report window | q: quit");

    while running.load(Ordering::Relaxed) {
        tokio::select! {
            event = events_rx.recv() => match event {
                Some(LinkEvent::Broadcast(event)) => {
                    println!("{}", render(&service.on_hub_event(event)));
                }
                Some(LinkEvent::Connected) => println!("[connected to {}]", config.relay_url),
                Some(LinkEvent::Disconnected) => println!("[relay disconnected, retrying]"),
                None => break,
            },
            line = lines.recv(), if stdin_open => match line {
                Some(line) => match parse_key(&line) {
                    KeyCommand::Toggle => {
                        let event = service.press_button();
                        println!("window -> {}", service.dashboard().window());
                        if outgoing_tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    KeyCommand::Report => {
                        if outgoing_tx.send(service.window_report()).await.is_err() {
                            break;
                        }
                    }
                    KeyCommand::Quit => break,
                    KeyCommand::Unknown => println!("unknown key '{}'", line.trim()),
                },
                // stdin closed: keep displaying until Ctrl+C.
                None => stdin_open = false,
            },
            _ = tokio::time::sleep(std::time::Duration::from_millis(200)) => {}
        }
    }

    running.store(false, Ordering::Relaxed);
    drop(outgoing_tx);
    let _ = link.await;
    info!("PlantGuard dashboard stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
