//! In-memory serial ports.
//!
//! [`MemoryPorts`] is a [`PortBackend`] whose devices live in process memory.
//! Tests plug devices in and out, feed bytes as if the board had sent them and
//! inspect what the bridge wrote back.  Reads honour the configured timeout the
//! same way a real port does, so the session's I/O thread behaves identically.

use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use plantguard_core::SerialDescriptor;

use crate::application::ports::{PortBackend, SerialIo};
use crate::application::session::SessionError;

#[derive(Debug, Default)]
struct DeviceState {
    inbound: VecDeque<u8>,
    written: Vec<u8>,
    unplugged: bool,
    hung_up: bool,
    fail_writes: bool,
}

#[derive(Debug, Default)]
struct DeviceShared {
    state: Mutex<DeviceState>,
    ready: Condvar,
}

/// Handle to one simulated board.  Clones share the same device.
#[derive(Debug, Clone, Default)]
pub struct MemoryDevice {
    shared: Arc<DeviceShared>,
}

impl MemoryDevice {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, DeviceState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues bytes for the bridge to read.
    pub fn feed(&self, bytes: &[u8]) {
        self.lock().inbound.extend(bytes);
        self.shared.ready.notify_all();
    }

    /// Everything written to the device so far.
    pub fn written(&self) -> Vec<u8> {
        self.lock().written.clone()
    }

    /// Makes every following read and write fail as if the cable was pulled.
    pub fn unplug(&self) {
        self.lock().unplugged = true;
        self.shared.ready.notify_all();
    }

    /// Reports end of stream once the queued bytes are consumed.
    pub fn hang_up(&self) {
        self.lock().hung_up = true;
        self.shared.ready.notify_all();
    }

    /// Makes writes fail with a broken pipe while reads keep working.
    pub fn fail_writes(&self) {
        self.lock().fail_writes = true;
    }

    fn port(&self, read_timeout: Duration) -> MemoryPort {
        MemoryPort {
            device: self.clone(),
            read_timeout,
        }
    }
}

/// The open side of a [`MemoryDevice`].
#[derive(Debug)]
pub struct MemoryPort {
    device: MemoryDevice,
    read_timeout: Duration,
}

impl Read for MemoryPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.device.lock();
        if state.inbound.is_empty() && !state.unplugged && !state.hung_up {
            state = self
                .device
                .shared
                .ready
                .wait_timeout(state, self.read_timeout)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }

        if state.unplugged {
            return Err(io::Error::new(ErrorKind::BrokenPipe, "device unplugged"));
        }
        if !state.inbound.is_empty() {
            let n = buf.len().min(state.inbound.len());
            for (slot, byte) in buf.iter_mut().zip(state.inbound.drain(..n)) {
                *slot = byte;
            }
            return Ok(n);
        }
        if state.hung_up {
            return Ok(0);
        }
        Err(io::Error::new(ErrorKind::TimedOut, "read timed out"))
    }
}

impl Write for MemoryPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.device.lock();
        if state.unplugged || state.fail_writes {
            return Err(io::Error::new(ErrorKind::BrokenPipe, "device rejected write"));
        }
        state.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// ── MemoryPorts ───────────────────────────────────────────────────────────────

/// A [`PortBackend`] over simulated devices.
#[derive(Debug)]
pub struct MemoryPorts {
    devices: Mutex<Vec<(SerialDescriptor, MemoryDevice)>>,
    enumeration_fails: Mutex<bool>,
    read_timeout: Duration,
    open_attempts: AtomicUsize,
}

impl MemoryPorts {
    pub fn new(read_timeout: Duration) -> Self {
        Self {
            devices: Mutex::new(Vec::new()),
            enumeration_fails: Mutex::new(false),
            read_timeout,
            open_attempts: AtomicUsize::new(0),
        }
    }

    fn devices(&self) -> MutexGuard<'_, Vec<(SerialDescriptor, MemoryDevice)>> {
        self.devices.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Plugs in a device; it is listed after the ones already attached.
    pub fn attach(&self, descriptor: SerialDescriptor) -> MemoryDevice {
        let device = MemoryDevice::new();
        self.devices().push((descriptor, device.clone()));
        device
    }

    /// Unplugs the device at `path`: it disappears from enumeration and its
    /// open handles start failing.
    pub fn detach(&self, path: &str) {
        self.devices().retain(|(descriptor, device)| {
            if descriptor.path == path {
                device.unplug();
                false
            } else {
                true
            }
        });
    }

    /// Makes [`PortBackend::list_ports`] fail until switched off again.
    pub fn set_enumeration_failure(&self, fails: bool) {
        *self
            .enumeration_fails
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = fails;
    }

    /// Number of [`PortBackend::open`] calls so far, successful or not.
    pub fn open_attempts(&self) -> usize {
        self.open_attempts.load(Ordering::SeqCst)
    }
}

impl PortBackend for MemoryPorts {
    fn list_ports(&self) -> Result<Vec<SerialDescriptor>, SessionError> {
        if *self
            .enumeration_fails
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
        {
            return Err(SessionError::EnumerationFailure(
                "simulated enumeration failure".to_string(),
            ));
        }
        Ok(self.devices().iter().map(|(d, _)| d.clone()).collect())
    }

    fn open(&self, path: &str, _baud_rate: u32) -> Result<Box<dyn SerialIo>, SessionError> {
        self.open_attempts.fetch_add(1, Ordering::SeqCst);
        self.devices()
            .iter()
            .find(|(descriptor, _)| descriptor.path == path)
            .map(|(_, device)| Box::new(device.port(self.read_timeout)) as Box<dyn SerialIo>)
            .ok_or_else(|| SessionError::PortUnavailable {
                path: path.to_string(),
                reason: "no such device".to_string(),
            })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
