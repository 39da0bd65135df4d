//! Infrastructure layer for plantguard-bridge.
//!
//! Contains the OS and network specific implementations:
//!
//! - `serial_port`: [`PortBackend`](crate::application::PortBackend) over the
//!   `serialport` crate.
//! - `memory_port`: in-memory devices for tests and hardware-free runs.
//! - `relay_conn`: WebSocket client for the relay hub with reconnect loop.
//! - `config_file`: TOML configuration file.
//! - `runtime`: joins the serial half and the relay link.

pub mod config_file;
pub mod memory_port;
pub mod relay_conn;
pub mod runtime;
pub mod serial_port;

pub use config_file::{load_config, BridgeFileConfig, ConfigError};
pub use memory_port::{MemoryDevice, MemoryPorts};
pub use relay_conn::{run_relay_link, RelayClientError, RelayLinkConfig};
pub use runtime::run;
pub use serial_port::SystemPorts;
