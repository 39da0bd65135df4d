//! Peer identity.

use std::fmt;
use std::time::{Duration, Instant};

use uuid::Uuid;

/// Identifier assigned by the hub when a peer connects.
///
/// Peers carry no role: the bridge, a browser and a terminal dashboard are all
/// just peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerId(Uuid);

impl PeerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PeerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The first 8 hex digits are enough to tell peers apart in logs.
        let simple = self.0.simple().to_string();
        f.write_str(&simple[..8])
    }
}

/// A connected peer as tracked by the hub.  Lost when the relay restarts.
#[derive(Debug, Clone)]
pub struct Peer {
    pub id: PeerId,
    pub connected_at: Instant,
}

impl Peer {
    pub fn new(id: PeerId) -> Self {
        Self {
            id,
            connected_at: Instant::now(),
        }
    }

    /// Time since the peer connected.
    pub fn uptime(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_ids_are_unique() {
        assert_ne!(PeerId::new(), PeerId::new());
    }

    #[test]
    fn test_peer_id_display_is_short() {
        assert_eq!(PeerId::new().to_string().len(), 8);
    }
}
