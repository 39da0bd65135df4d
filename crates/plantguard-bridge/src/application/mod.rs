//! Application layer for plantguard-bridge.
//!
//! Knows *what* the bridge does with the serial link (open, frame, decode,
//! write, reopen) but reaches the hardware only through [`PortBackend`].
//!
//! # What does NOT belong here?
//!
//! - Calls into the `serialport` crate (see `infrastructure::serial_port`)
//! - WebSocket code (see `infrastructure::relay_conn`)

pub mod bridge_service;
pub mod ports;
pub mod session;
pub mod supervisor;

pub use bridge_service::run_bridge;
pub use ports::{PortBackend, SerialIo};
pub use session::{
    CloseReason, ReadingStream, SerialSession, SessionError, SessionInfo, SessionState,
};
pub use supervisor::{DeviceSelector, Supervisor, SupervisorExit};
