//! plantguard-relay library crate.
//!
//! The relay is the single dispatch point between the bridge and every
//! dashboard.  It accepts WebSocket connections, decodes each text frame as a
//! [`plantguard_core::ClientEvent`], and re-broadcasts it to all connected
//! peers (the sender included).
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Peers (JSON over WebSocket)
//!         ↕
//! [plantguard-relay]
//!   ├── domain/           Pure types: PeerId, Peer, RelayConfig
//!   ├── application/      The hub: peer registry + broadcast rules
//!   └── infrastructure/
//!         └── ws_server/  WebSocket accept loop (tokio-tungstenite)
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O and no async code.
//! - `application` owns the peer map on a single Tokio task; everything else
//!   talks to it through a channel.
//! - `infrastructure` depends on all other layers plus `tokio` and `tungstenite`.

/// Domain layer: peer identity and configuration.
pub mod domain;

/// Application layer: the hub task.
pub mod application;

/// Infrastructure layer: WebSocket server.
pub mod infrastructure;
