//! Application layer for plantguard-relay.
//!
//! The hub decides who receives what; it never touches a socket.  The
//! infrastructure layer feeds it [`hub::HubCommand`]s and drains each peer's
//! outbound queue.

pub mod hub;

pub use hub::{spawn_hub, Hub, HubClosed, HubCommand, HubHandle, Outbound};
