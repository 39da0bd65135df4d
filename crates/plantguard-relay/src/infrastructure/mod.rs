//! Infrastructure layer for plantguard-relay.
//!
//! Binds the TCP listener, performs the WebSocket upgrade for each peer and
//! pumps JSON frames between the socket and the hub.

pub mod ws_server;

pub use ws_server::{run_server, serve};
