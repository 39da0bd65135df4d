//! Domain layer for plantguard-bridge.
//!
//! Plain configuration values; populated by `main.rs` from the CLI and the
//! TOML file, then handed to the application layer.

pub mod config;

pub use config::{BridgeConfig, RestartPolicy, SerialOptions};
