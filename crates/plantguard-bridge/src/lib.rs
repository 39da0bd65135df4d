//! plantguard-bridge library crate.
//!
//! The bridge owns the serial link to the PlantGuard board.  It forwards every
//! light reading to the relay hub and writes every button press it hears from
//! the hub back to the board.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! microcontroller (serial)
//!         ↕
//! [plantguard-bridge]
//!   ├── domain/           BridgeConfig, RestartPolicy
//!   ├── application/
//!   │     ├── ports/      PortBackend trait (enumerate + open)
//!   │     ├── session/    SerialSession state machine + ReadingStream
//!   │     ├── supervisor/ Device selection and supervised reopen loop
//!   │     └── bridge_service/  Wires the supervisor to the relay link
//!   └── infrastructure/
//!         ├── serial_port/   PortBackend over the `serialport` crate
//!         ├── memory_port/   In-memory PortBackend for tests and dry runs
//!         ├── relay_conn/    WebSocket client with reconnect loop
//!         ├── config_file/   TOML configuration file
//!         └── runtime/       Joins the serial half and the relay link
//!         ↕
//! relay hub (JSON over WebSocket)
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O.
//! - `application` talks to hardware only through [`application::PortBackend`],
//!   so the session and supervisor are tested against in-memory devices.
//! - `infrastructure` depends on all other layers plus `serialport`, `tokio`
//!   and `tungstenite`.

/// Domain layer: runtime configuration.
pub mod domain;

/// Application layer: serial session, supervisor and wiring.
pub mod application;

/// Infrastructure layer: serial ports, relay link, config file.
pub mod infrastructure;
