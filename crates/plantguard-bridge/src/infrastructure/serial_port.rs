//! [`PortBackend`] over the operating system's serial ports.
//!
//! Enumeration maps `serialport::SerialPortInfo` into [`SerialDescriptor`]s,
//! keeping the USB manufacturer and vendor/product IDs the device locator
//! matches on.  Ports are opened 8N1 without flow control, which is what the
//! board's firmware configures.

use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, SerialPortType, StopBits};
use tracing::{debug, warn};

use plantguard_core::SerialDescriptor;

use crate::application::ports::{PortBackend, SerialIo};
use crate::application::session::SessionError;
use crate::domain::config::DEFAULT_READ_TIMEOUT;

/// Real serial ports via the `serialport` crate.
#[derive(Debug, Clone)]
pub struct SystemPorts {
    read_timeout: Duration,
}

impl SystemPorts {
    /// `read_timeout` bounds each blocking read of the session's I/O thread.
    pub fn new(read_timeout: Duration) -> Self {
        Self { read_timeout }
    }
}

impl Default for SystemPorts {
    fn default() -> Self {
        Self::new(DEFAULT_READ_TIMEOUT)
    }
}

impl PortBackend for SystemPorts {
    fn list_ports(&self) -> Result<Vec<SerialDescriptor>, SessionError> {
        let ports = serialport::available_ports().map_err(|e| {
            warn!("failed to enumerate serial ports: {e}");
            SessionError::EnumerationFailure(e.to_string())
        })?;

        Ok(ports.iter().map(to_descriptor).collect())
    }

    fn open(&self, path: &str, baud_rate: u32) -> Result<Box<dyn SerialIo>, SessionError> {
        let port = serialport::new(path, baud_rate)
            .timeout(self.read_timeout)
            .data_bits(DataBits::Eight)
            .stop_bits(StopBits::One)
            .parity(Parity::None)
            .flow_control(FlowControl::None)
            .open_native()
            .map_err(|e| SessionError::PortUnavailable {
                path: path.to_string(),
                reason: e.to_string(),
            })?;

        debug!(path, baud_rate, "native serial port opened");
        Ok(Box::new(port))
    }
}

fn to_descriptor(port: &serialport::SerialPortInfo) -> SerialDescriptor {
    let descriptor = SerialDescriptor::new(&port.port_name);
    match &port.port_type {
        SerialPortType::UsbPort(usb) => {
            let descriptor = descriptor.with_usb_ids(usb.vid, usb.pid);
            match &usb.manufacturer {
                Some(manufacturer) => descriptor.with_manufacturer(manufacturer),
                None => descriptor,
            }
        }
        _ => descriptor,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
