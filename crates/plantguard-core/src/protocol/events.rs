//! JSON event envelope spoken between the relay hub and its peers.
//!
//! Every WebSocket text frame carries exactly one event:
//!
//! ```json
//! {"event":"luminosidade","data":{"valor":42}}
//! {"event":"botao_clicado","data":{"acao":"A"}}
//! {"event":"botao_clicado","data":"A"}
//! {"event":"janela","data":{"status":"aberta"}}
//! ```
//!
//! # Why two enums? (for beginners)
//!
//! The hub does not echo everything verbatim.  A peer reports a button press
//! as `{"acao":"A"}`, but the hub re-broadcasts only the bare code `"A"`, and
//! `janela` is never re-broadcast at all.  Modelling the two directions as
//! [`ClientEvent`] (peer → hub) and [`HubEvent`] (hub → peers) lets the
//! compiler enforce that difference.
//!
//! Serde's *adjacently tagged* representation
//! (`#[serde(tag = "event", content = "data")]`) produces the envelope shape
//! above without any hand-written JSON code.

use serde::{Deserialize, Serialize};

use crate::domain::command::ActionCode;
use crate::domain::reading::SensorReading;

// ── Peer → Hub ────────────────────────────────────────────────────────────────

/// Events a peer (browser, terminal dashboard or the bridge) sends to the hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// A light reading, normally from the bridge.
    Luminosidade(SensorReading),

    /// A button press carrying the action code.
    BotaoClicado { acao: ActionCode },

    /// Window status report.  Logged by the hub, never forwarded.
    Janela { status: serde_json::Value },
}

impl ClientEvent {
    /// Wire name of the event, for log fields.
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::Luminosidade(_) => "luminosidade",
            ClientEvent::BotaoClicado { .. } => "botao_clicado",
            ClientEvent::Janela { .. } => "janela",
        }
    }

    /// What the hub re-broadcasts for this event, if anything.
    ///
    /// Readings pass through unchanged, button presses are reduced to the bare
    /// code, and `janela` yields `None`.
    pub fn into_broadcast(self) -> Option<HubEvent> {
        match self {
            ClientEvent::Luminosidade(reading) => Some(HubEvent::Luminosidade(reading)),
            ClientEvent::BotaoClicado { acao } => Some(HubEvent::BotaoClicado(acao)),
            ClientEvent::Janela { .. } => None,
        }
    }
}

// ── Hub → Peers ───────────────────────────────────────────────────────────────

/// Events the hub broadcasts to every connected peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum HubEvent {
    Luminosidade(SensorReading),
    BotaoClicado(ActionCode),
}

// ── Tests ─────────────────────────────────────────────────────────────────────
