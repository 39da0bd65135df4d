//! Domain layer for plantguard-relay.
//!
//! Plain types with no networking or runtime dependencies.

pub mod config;
pub mod peer;

pub use config::RelayConfig;
pub use peer::{Peer, PeerId};
