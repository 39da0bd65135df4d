//! plantguard-peer library crate.
//!
//! A terminal stand-in for the browser dashboard: it shows each light reading
//! with its tier and sends the same `botao_clicado` events as the page's
//! button.
//!
//! # Architecture
//!
//! ```text
//! [plantguard-peer]
//!   ├── domain/          Dashboard (toggle state machine, tier mapping), PeerConfig
//!   ├── application/     PeerService: broadcasts → output, key presses → events
//!   └── infrastructure/  Relay WebSocket client with reconnect loop
//! ```

/// Domain layer: dashboard state and configuration.
pub mod domain;

/// Application layer: peer use cases and rendering.
pub mod application;

/// Infrastructure layer: relay client.
pub mod infrastructure;
