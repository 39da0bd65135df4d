//! Relay configuration.
//!
//! [`RelayConfig`] is populated by `main.rs` from CLI arguments and
//! environment variables; nothing in the library reads the environment.

use std::net::{Ipv4Addr, SocketAddr};

/// Port the relay has always listened on.
pub const DEFAULT_PORT: u16 = 3000;

/// All runtime configuration for the relay.
///
/// # Example
///
/// ```rust
/// use plantguard_relay::domain::RelayConfig;
///
/// let cfg = RelayConfig::default();
/// assert_eq!(cfg.bind_addr.port(), 3000);
/// ```
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Address the WebSocket listener binds to.  `0.0.0.0` accepts peers from
    /// any interface.
    pub bind_addr: SocketAddr,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
