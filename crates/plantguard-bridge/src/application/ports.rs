//! The seam between the bridge and the operating system's serial ports.
//!
//! [`PortBackend`] is implemented by `infrastructure::serial_port::SystemPorts`
//! for real hardware and by `infrastructure::memory_port::MemoryPorts` for
//! tests.  Unit tests in this crate also get a `mockall` mock
//! (`MockPortBackend`) generated from the trait.

use std::io::{Read, Write};

use plantguard_core::SerialDescriptor;

use super::session::SessionError;

/// An open serial device: blocking byte I/O.
///
/// `read` is expected to honour a short timeout and report it as
/// [`std::io::ErrorKind::TimedOut`] (or `WouldBlock`), so the I/O thread can
/// service queued writes while the device is silent.
pub trait SerialIo: Read + Write + Send {}

impl<T: Read + Write + Send> SerialIo for T {}

/// Enumerates and opens serial ports.
#[cfg_attr(test, mockall::automock)]
pub trait PortBackend: Send + Sync {
    /// Lists every serial interface currently known to the OS.
    ///
    /// # Errors
    ///
    /// [`SessionError::EnumerationFailure`] when the OS query fails.
    fn list_ports(&self) -> Result<Vec<SerialDescriptor>, SessionError>;

    /// Opens `path` at `baud_rate`.
    ///
    /// # Errors
    ///
    /// [`SessionError::PortUnavailable`] when the device cannot be opened.
    fn open(&self, path: &str, baud_rate: u32) -> Result<Box<dyn SerialIo>, SessionError>;
}
