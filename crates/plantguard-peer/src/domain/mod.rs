//! Domain layer for plantguard-peer.
//!
//! Pure dashboard state; no I/O.

pub mod config;
pub mod dashboard;

pub use config::PeerConfig;
pub use dashboard::{Dashboard, DisplayUpdate, WindowState};
