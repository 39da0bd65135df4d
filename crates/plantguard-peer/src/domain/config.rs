//! Peer runtime configuration.

use std::time::Duration;

use plantguard_core::{BandTable, CommandCodes};

#[derive(Debug, Clone, PartialEq)]
pub struct PeerConfig {
    /// WebSocket URL of the relay hub.
    pub relay_url: String,
    /// Pause between relay connection attempts.
    pub reconnect_interval: Duration,
    /// Reading → tier mapping used for colouring.
    pub bands: BandTable,
    /// Codes sent for button presses.
    pub codes: CommandCodes,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            relay_url: "ws://127.0.0.1:3000/".to_string(),
            reconnect_interval: Duration::from_secs(2),
            bands: BandTable::default(),
            codes: CommandCodes::default(),
        }
    }
}
