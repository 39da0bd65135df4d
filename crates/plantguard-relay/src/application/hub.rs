//! The relay hub: peer registry and broadcast rules.
//!
//! # Single dispatch point (for beginners)
//!
//! Every peer session runs in its own Tokio task, but none of them touches the
//! peer map.  Instead they send [`HubCommand`]s down one `mpsc` channel, and a
//! single task owning the [`Hub`] applies them one at a time, in arrival
//! order.  Because only that task ever mutates the map, no `Mutex` is needed
//! and there is no way for two sessions to race on it.
//!
//! ```text
//! session task ─┐
//! session task ─┼── HubCommand ──> [ hub task: Hub ] ──HubEvent──> each peer's queue
//! session task ─┘
//! ```
//!
//! # Broadcast rules
//!
//! | Incoming event            | Sent to every peer (sender included) |
//! |---------------------------|--------------------------------------|
//! | `luminosidade {valor}`    | `luminosidade {valor}` unchanged     |
//! | `botao_clicado {acao}`    | bare `acao`                          |
//! | `janela {status}`         | nothing (logged only)                |

use std::collections::HashMap;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use plantguard_core::{ClientEvent, HubEvent};

use crate::domain::peer::{Peer, PeerId};

/// Sending half of a peer's outbound queue.  Unbounded: the hub never waits
/// on a slow peer.
pub type Outbound = mpsc::UnboundedSender<HubEvent>;

/// Everything the hub task can be asked to do.
#[derive(Debug)]
pub enum HubCommand {
    /// A peer finished its WebSocket handshake.
    Connect { peer: Peer, outbound: Outbound },
    /// A peer sent an event.
    Event { from: PeerId, event: ClientEvent },
    /// A peer's connection ended.
    Disconnect { peer: PeerId },
    /// Asks how many peers are registered.
    PeerCount { reply: oneshot::Sender<usize> },
}

struct PeerHandle {
    peer: Peer,
    outbound: Outbound,
}

/// The peer registry.  Owned by exactly one task; see the module docs.
#[derive(Default)]
pub struct Hub {
    peers: HashMap<PeerId, PeerHandle>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Registers a peer.  Peers have no roles, so there is nothing else to do.
    pub fn on_connect(&mut self, peer: Peer, outbound: Outbound) {
        info!(peer = %peer.id, peers = self.peers.len() + 1, "peer connected");
        self.peers.insert(peer.id, PeerHandle { peer, outbound });
    }

    /// Applies the broadcast rules to one event.  Returns the number of peers
    /// the event was delivered to.
    pub fn on_event(&mut self, from: PeerId, event: ClientEvent) -> usize {
        match &event {
            ClientEvent::Janela { status } => {
                info!(peer = %from, %status, "janela status");
            }
            other => {
                debug!(peer = %from, event = other.name(), "event received");
            }
        }

        match event.into_broadcast() {
            Some(out) => self.broadcast(&out),
            None => 0,
        }
    }

    /// Removes a peer.  Returns `false` if it was not registered.
    pub fn on_disconnect(&mut self, id: PeerId) -> bool {
        match self.peers.remove(&id) {
            Some(handle) => {
                info!(
                    peer = %id,
                    connected_for = ?handle.peer.uptime(),
                    peers = self.peers.len(),
                    "peer disconnected"
                );
                true
            }
            None => false,
        }
    }

    /// Queues `event` for every registered peer.
    ///
    /// With zero peers this does nothing.  A peer whose session already ended
    /// (receiver dropped, disconnect not yet processed) is skipped.
    pub fn broadcast(&self, event: &HubEvent) -> usize {
        let mut delivered = 0;
        for (id, handle) in &self.peers {
            if handle.outbound.send(event.clone()).is_ok() {
                delivered += 1;
            } else {
                debug!(peer = %id, "dropping event for closed peer");
            }
        }
        delivered
    }

    /// Applies one command.
    pub fn apply(&mut self, command: HubCommand) {
        match command {
            HubCommand::Connect { peer, outbound } => self.on_connect(peer, outbound),
            HubCommand::Event { from, event } => {
                self.on_event(from, event);
            }
            HubCommand::Disconnect { peer } => {
                self.on_disconnect(peer);
            }
            HubCommand::PeerCount { reply } => {
                let _ = reply.send(self.peers.len());
            }
        }
    }

    /// Drains `commands` until every [`HubHandle`] has been dropped.
    pub async fn run(mut self, mut commands: mpsc::UnboundedReceiver<HubCommand>) {
        while let Some(command) = commands.recv().await {
            self.apply(command);
        }
        debug!("hub command channel closed; hub task exiting");
    }
}

// ── Handle ────────────────────────────────────────────────────────────────────

/// Returned when the hub task is no longer running.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("relay hub has shut down")]
pub struct HubClosed;

/// Cloneable front door to the hub task.
#[derive(Debug, Clone)]
pub struct HubHandle {
    commands: mpsc::UnboundedSender<HubCommand>,
}

impl HubHandle {
    /// Registers a new peer and returns its id and outbound queue.
    pub fn connect(&self) -> Result<(PeerId, mpsc::UnboundedReceiver<HubEvent>), HubClosed> {
        let id = PeerId::new();
        let (outbound, inbox) = mpsc::unbounded_channel();
        self.send(HubCommand::Connect {
            peer: Peer::new(id),
            outbound,
        })?;
        Ok((id, inbox))
    }

    pub fn event(&self, from: PeerId, event: ClientEvent) -> Result<(), HubClosed> {
        self.send(HubCommand::Event { from, event })
    }

    pub fn disconnect(&self, peer: PeerId) -> Result<(), HubClosed> {
        self.send(HubCommand::Disconnect { peer })
    }

    /// Number of registered peers, as seen by the hub task after every
    /// command queued before this call.
    pub async fn peer_count(&self) -> Result<usize, HubClosed> {
        let (reply, rx) = oneshot::channel();
        self.send(HubCommand::PeerCount { reply })?;
        rx.await.map_err(|_| HubClosed)
    }

    fn send(&self, command: HubCommand) -> Result<(), HubClosed> {
        self.commands.send(command).map_err(|_| HubClosed)
    }
}

/// Starts the hub task.  It stops once every clone of the handle is dropped.
pub fn spawn_hub() -> (HubHandle, JoinHandle<()>) {
    let (commands, rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(Hub::new().run(rx));
    (HubHandle { commands }, task)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
