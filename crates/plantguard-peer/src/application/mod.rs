//! Application layer for plantguard-peer: turns hub broadcasts into screen
//! output and key presses into outbound events.

pub mod peer_service;

pub use peer_service::{render, PeerOutput, PeerService};
