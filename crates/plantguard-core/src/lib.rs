//! # plantguard-core
//!
//! Shared library for PlantGuard containing the data model, the serial device
//! locator, the line framer for the serial link, and the JSON event envelope
//! spoken over the relay.
//!
//! This crate is used by the bridge, the relay and the peer client.  It has no
//! dependency on sockets, serial drivers or an async runtime.
//!
//! # Architecture overview (for beginners)
//!
//! PlantGuard connects a light sensor on a microcontroller to any number of
//! browsers:
//!
//! ```text
//! microcontroller ──serial──> bridge ──WebSocket──> relay hub ──> peers
//!                 <─serial─── bridge <──WebSocket── relay hub <── peers
//! ```
//!
//! This crate (`plantguard-core`) is the shared foundation.  It defines:
//!
//! - **`domain`** – The values that travel through the system (readings,
//!   commands, serial descriptors) and the pure rules applied to them: which
//!   serial port looks like the target board, and which presentation tier a
//!   reading falls into.
//!
//! - **`protocol`** – How those values are put on the wire: the line framer
//!   that cuts the serial byte stream into frames, and the JSON envelope used
//!   between the relay and its peers.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `plantguard_core::SensorReading` instead of the full module path.
pub use domain::command::{Action, ActionCode, Command, CommandCodes, CommandCodesError};
pub use domain::device::{
    locate, locate_with, platform_default_path, select_port, KnownDevices, PortSelection,
    PortSource, SerialDescriptor, UsbId,
};
pub use domain::reading::{Scalar, SensorReading};
pub use domain::tier::{Band, BandError, BandTable, Color, Tier};
pub use protocol::events::{ClientEvent, HubEvent};
pub use protocol::framing::{Delimiter, DelimiterError, LineFramer};
