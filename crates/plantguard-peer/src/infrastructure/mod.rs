//! Infrastructure layer for plantguard-peer: the WebSocket link to the relay.

pub mod relay_client;

pub use relay_client::{run_relay_client, LinkEvent, RelayClientError};
