//! Serial session: one open connection to the board.
//!
//! # Threading model (for beginners)
//!
//! Serial ports are blocking devices: `read` parks the calling thread until
//! bytes arrive or the read timeout expires.  Running that on a Tokio worker
//! would stall every other task scheduled there, so each open session gets a
//! dedicated OS thread that owns the port exclusively:
//!
//! ```text
//!                    ┌──────────── serial I/O thread ────────────┐
//! write(cmd) ──std mpsc──> drain queued writes (in order)         │
//!    ↑ oneshot <───────────── result                              │
//!                    │  read (short timeout) → LineFramer         │
//! ReadingStream <──tokio mpsc── SensorReading per frame           │
//!                    └────────────────────────────────────────────┘
//! ```
//!
//! The thread alternates between servicing queued writes and a short read, so
//! writes are performed in submission order and never wait longer than one
//! read timeout.  When the device fails, the thread records a [`CloseReason`],
//! fails any writes still queued and exits; the reading stream then ends.

use std::fmt;
use std::io::{ErrorKind, Read, Write};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc as std_mpsc;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::Stream;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use plantguard_core::{ActionCode, Command, LineFramer, SensorReading};

use super::ports::{PortBackend, SerialIo};
use crate::domain::config::SerialOptions;

const READ_BUF_LEN: usize = 256;

/// Errors raised by serial sessions and device selection.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    /// The device could not be opened (missing, busy, permission denied).
    #[error("serial port {path} unavailable: {reason}")]
    PortUnavailable { path: String, reason: String },

    /// A command could not be written; the port is closed or the OS refused.
    #[error("serial write failed: {0}")]
    WriteFailure(String),

    /// The OS could not list serial ports.
    #[error("serial port enumeration failed: {0}")]
    EnumerationFailure(String),

    /// A command code that maps to no known action.
    #[error("unknown command code '{0}'")]
    UnknownCommand(String),
}

fn port_closed() -> SessionError {
    SessionError::WriteFailure("serial port is closed".to_string())
}

/// Lifecycle of the serial connection: `Closed → Opening → Open → Closed`.
///
/// A [`SerialSession`] exists only once its port is open, so it reports
/// `Open` or `Closed`.  `Opening` is published by the supervisor while it
/// waits on [`SerialSession::open`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Closed,
    Opening,
    Open,
}

/// Snapshot of a session for status reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub path: String,
    pub baud_rate: u32,
    pub is_open: bool,
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// [`SerialSession::close`] was called or the session was dropped.
    Requested,
    /// The device reported end of stream.
    EndOfStream,
    /// The device returned an I/O error.
    DeviceError(String),
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::Requested => f.write_str("closed on request"),
            CloseReason::EndOfStream => f.write_str("device reported end of stream"),
            CloseReason::DeviceError(e) => write!(f, "device error: {e}"),
        }
    }
}

struct WriteRequest {
    bytes: Vec<u8>,
    done: oneshot::Sender<Result<(), SessionError>>,
}

// ── SerialSession ─────────────────────────────────────────────────────────────

/// An open serial connection.
///
/// Dropping the session stops its I/O thread.
pub struct SerialSession {
    path: String,
    options: SerialOptions,
    writes: std_mpsc::Sender<WriteRequest>,
    stop: Arc<AtomicBool>,
    closed: watch::Receiver<Option<CloseReason>>,
}

impl SerialSession {
    /// Opens `path` through `backend` and starts the I/O thread.
    ///
    /// Returns the session (for writes and lifecycle) and the stream of
    /// readings decoded from the device.
    ///
    /// # Errors
    ///
    /// [`SessionError::PortUnavailable`] when the device cannot be opened.
    pub fn open(
        backend: &dyn PortBackend,
        path: &str,
        options: SerialOptions,
    ) -> Result<(Self, ReadingStream), SessionError> {
        let port = backend.open(path, options.baud_rate)?;

        let (reading_tx, reading_rx) = mpsc::unbounded_channel();
        let (write_tx, write_rx) = std_mpsc::channel();
        let (closed_tx, closed_rx) = watch::channel(None);
        let stop = Arc::new(AtomicBool::new(false));

        let mut worker = IoWorker {
            path: path.to_string(),
            port,
            framer: LineFramer::new(options.delimiter.clone()),
            readings: reading_tx,
            writes: write_rx,
            stop: Arc::clone(&stop),
        };

        std::thread::Builder::new()
            .name("plantguard-serial".to_string())
            .spawn(move || {
                let reason = worker.run();
                debug!(path = %worker.path, "serial I/O thread exiting: {reason}");
                let _ = closed_tx.send(Some(reason));
                worker.fail_pending();
            })
            .map_err(|e| SessionError::PortUnavailable {
                path: path.to_string(),
                reason: format!("failed to start I/O thread: {e}"),
            })?;

        info!(
            path,
            baud_rate = options.baud_rate,
            delimiter = %options.delimiter,
            "serial port opened"
        );

        let session = Self {
            path: path.to_string(),
            options,
            writes: write_tx,
            stop,
            closed: closed_rx,
        };
        Ok((session, ReadingStream { rx: reading_rx }))
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            path: self.path.clone(),
            baud_rate: self.options.baud_rate,
            is_open: self.is_open(),
        }
    }

    /// `Open` until the I/O thread exits, then `Closed`.
    pub fn state(&self) -> SessionState {
        if self.is_open() {
            SessionState::Open
        } else {
            SessionState::Closed
        }
    }

    pub fn is_open(&self) -> bool {
        self.closed.borrow().is_none()
    }

    /// Encodes `command` with the session's code table and writes it.
    ///
    /// Resolves once the bytes were handed to the OS.
    ///
    /// # Errors
    ///
    /// [`SessionError::WriteFailure`] when the port is closed or the write
    /// fails.
    pub async fn write(&self, command: &Command) -> Result<(), SessionError> {
        let code = self.options.codes.encode(command.action);
        self.submit(code.as_str().as_bytes()).await
    }

    /// Writes a code received from the relay after checking it against the
    /// code table.
    ///
    /// # Errors
    ///
    /// [`SessionError::UnknownCommand`] for codes outside the table (nothing
    /// is written), otherwise as [`write`](Self::write).
    pub async fn write_code(&self, code: &ActionCode) -> Result<(), SessionError> {
        match self.options.codes.decode(code) {
            Some(action) => self.write(&Command::new(action)).await,
            None => Err(SessionError::UnknownCommand(code.to_string())),
        }
    }

    async fn submit(&self, code: &[u8]) -> Result<(), SessionError> {
        if !self.is_open() {
            return Err(port_closed());
        }

        let mut bytes = code.to_vec();
        if let Some(terminator) = &self.options.command_terminator {
            bytes.extend_from_slice(terminator.as_bytes());
        }

        let (done, result) = oneshot::channel();
        self.writes
            .send(WriteRequest { bytes, done })
            .map_err(|_| port_closed())?;
        result.await.map_err(|_| port_closed())?
    }

    /// Waits until the session has closed and returns why.
    pub async fn closed(&self) -> CloseReason {
        let mut rx = self.closed.clone();
        // The watch guard must drop before `rx` does.
        let reason = match rx.wait_for(Option::is_some).await {
            Ok(reason) => (*reason).clone().unwrap_or(CloseReason::Requested),
            Err(_) => {
                CloseReason::DeviceError("serial I/O thread exited unexpectedly".to_string())
            }
        };
        reason
    }

    /// Stops the I/O thread and waits for it to release the port.  Calling it
    /// again just returns the recorded reason.
    pub async fn close(&self) -> CloseReason {
        self.stop.store(true, Ordering::Relaxed);
        self.closed().await
    }
}

impl Drop for SerialSession {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

impl fmt::Debug for SerialSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialSession")
            .field("path", &self.path)
            .field("open", &self.is_open())
            .finish()
    }
}

// ── ReadingStream ─────────────────────────────────────────────────────────────

/// Readings decoded from the device, one per frame, in arrival order.
///
/// Ends (yields `None`) once the session has closed; this is not an error.
#[derive(Debug)]
pub struct ReadingStream {
    rx: mpsc::UnboundedReceiver<SensorReading>,
}

impl ReadingStream {
    pub async fn next(&mut self) -> Option<SensorReading> {
        self.rx.recv().await
    }
}

impl Stream for ReadingStream {
    type Item = SensorReading;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

// ── I/O thread ────────────────────────────────────────────────────────────────

struct IoWorker {
    path: String,
    port: Box<dyn SerialIo>,
    framer: LineFramer,
    readings: mpsc::UnboundedSender<SensorReading>,
    writes: std_mpsc::Receiver<WriteRequest>,
    stop: Arc<AtomicBool>,
}

impl IoWorker {
    fn run(&mut self) -> CloseReason {
        let mut buf = [0u8; READ_BUF_LEN];
        loop {
            if self.stop.load(Ordering::Relaxed) {
                return CloseReason::Requested;
            }
            if let Err(reason) = self.drain_writes() {
                return reason;
            }

            match self.port.read(&mut buf) {
                Ok(0) => return CloseReason::EndOfStream,
                Ok(n) => self.dispatch(&buf[..n]),
                Err(e) if is_transient(e.kind()) => {}
                Err(e) => {
                    warn!(path = %self.path, "serial read failed: {e}");
                    return CloseReason::DeviceError(e.to_string());
                }
            }
        }
    }

    /// Performs every queued write.  A hard write error closes the session.
    fn drain_writes(&mut self) -> Result<(), CloseReason> {
        loop {
            let request = match self.writes.try_recv() {
                Ok(request) => request,
                Err(std_mpsc::TryRecvError::Empty) => return Ok(()),
                Err(std_mpsc::TryRecvError::Disconnected) => return Err(CloseReason::Requested),
            };

            let result = self
                .port
                .write_all(&request.bytes)
                .and_then(|()| self.port.flush());

            match result {
                Ok(()) => {
                    debug!(path = %self.path, bytes = request.bytes.len(), "command written");
                    let _ = request.done.send(Ok(()));
                }
                Err(e) if e.kind() == ErrorKind::TimedOut => {
                    let _ = request.done.send(Err(SessionError::WriteFailure(e.to_string())));
                }
                Err(e) => {
                    let message = e.to_string();
                    let _ = request
                        .done
                        .send(Err(SessionError::WriteFailure(message.clone())));
                    return Err(CloseReason::DeviceError(message));
                }
            }
        }
    }

    fn dispatch(&mut self, bytes: &[u8]) {
        for frame in self.framer.push(bytes) {
            match SensorReading::from_frame(&frame) {
                Some(reading) => {
                    // A dropped stream only means nobody is listening.
                    let _ = self.readings.send(reading);
                }
                None => debug!(path = %self.path, frame = frame.trim(), "frame carries no reading"),
            }
        }
    }

    fn fail_pending(&mut self) {
        while let Ok(request) = self.writes.try_recv() {
            let _ = request.done.send(Err(port_closed()));
        }
    }
}

fn is_transient(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
    )
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::application::ports::MockPortBackend;
    use crate::infrastructure::memory_port::{MemoryDevice, MemoryPorts};
    use plantguard_core::{Action, Delimiter, Scalar, SerialDescriptor};

    fn options() -> SerialOptions {
        SerialOptions {
            read_timeout: Duration::from_millis(5),
            ..SerialOptions::default()
        }
    }

    fn open_memory(
        options: SerialOptions,
    ) -> (MemoryPorts, MemoryDevice, SerialSession, ReadingStream) {
        let ports = MemoryPorts::new(options.read_timeout);
        let device = ports.attach(SerialDescriptor::new("/dev/ttyACM0"));
        let (session, stream) = SerialSession::open(&ports, "/dev/ttyACM0", options).unwrap();
        (ports, device, session, stream)
    }

    #[tokio::test]
    async fn test_open_failure_is_port_unavailable() {
        // Arrange
        let mut backend = MockPortBackend::new();
        backend.expect_open().returning(|path, _| {
            Err(SessionError::PortUnavailable {
                path: path.to_string(),
                reason: "permission denied".to_string(),
            })
        });

        // Act
        let result = SerialSession::open(&backend, "/dev/ttyACM0", options());

        // Assert
        assert!(matches!(result, Err(SessionError::PortUnavailable { .. })));
    }

    #[tokio::test]
    async fn test_frames_become_readings_in_order() {
        // Arrange
        let (_ports, device, session, mut stream) = open_memory(options());

        // Act: two frames split awkwardly across feeds
        device.feed(b"4");
        device.feed(b"2\n17\n");

        // Assert
        assert_eq!(stream.next().await, Some(SensorReading::new(Scalar::Integer(42))));
        assert_eq!(stream.next().await, Some(SensorReading::new(Scalar::Integer(17))));
        assert_eq!(session.state(), SessionState::Open);
    }

    #[tokio::test]
    async fn test_crlf_device_with_lf_delimiter_skips_blank_frames() {
        let (_ports, device, _session, mut stream) = open_memory(options());

        device.feed(b"55\r\n\r\n60\r\n");

        assert_eq!(stream.next().await, Some(SensorReading::new(55)));
        assert_eq!(stream.next().await, Some(SensorReading::new(60)));
    }

    #[tokio::test]
    async fn test_no_reading_is_pending_until_a_frame_completes() {
        // Arrange
        let (_ports, device, _session, stream) = open_memory(options());
        let mut stream = tokio_test::task::spawn(stream);

        // Act: partial frame only
        device.feed(b"12");
        tokio::time::sleep(Duration::from_millis(30)).await;

        // Assert
        tokio_test::assert_pending!(stream.poll_next());
    }

    #[tokio::test]
    async fn test_write_sends_code_without_terminator_by_default() {
        // Arrange
        let (_ports, device, session, _stream) = open_memory(options());

        // Act
        session.write(&Command::new(Action::Open)).await.unwrap();
        session.write(&Command::new(Action::Close)).await.unwrap();

        // Assert: submission order is preserved
        assert_eq!(device.written(), b"AF");
    }

    #[tokio::test]
    async fn test_write_appends_configured_terminator() {
        let opts = SerialOptions {
            command_terminator: Some(Delimiter::lf()),
            ..options()
        };
        let (_ports, device, session, _stream) = open_memory(opts);

        session.write(&Command::new(Action::Open)).await.unwrap();

        assert_eq!(device.written(), b"A\n");
    }

    #[tokio::test]
    async fn test_unknown_code_is_rejected_and_not_written() {
        let (_ports, device, session, _stream) = open_memory(options());

        let result = session.write_code(&ActionCode::new("Z")).await;

        assert_eq!(result, Err(SessionError::UnknownCommand("Z".to_string())));
        assert!(device.written().is_empty());
    }

    #[tokio::test]
    async fn test_device_error_closes_session_and_ends_stream() {
        // Arrange
        let (_ports, device, session, mut stream) = open_memory(options());

        // Act
        device.unplug();

        // Assert
        assert_eq!(stream.next().await, None);
        assert!(matches!(session.closed().await, CloseReason::DeviceError(_)));
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_write_after_close_is_write_failure() {
        let (_ports, _device, session, _stream) = open_memory(options());

        assert_eq!(session.close().await, CloseReason::Requested);
        let result = session.write(&Command::new(Action::Open)).await;

        assert!(matches!(result, Err(SessionError::WriteFailure(_))));
        assert!(!session.info().is_open);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (_ports, _device, session, _stream) = open_memory(options());
        assert_eq!(session.close().await, CloseReason::Requested);
        assert_eq!(session.close().await, CloseReason::Requested);
    }

    #[tokio::test]
    async fn test_failed_write_closes_session() {
        let (_ports, device, session, _stream) = open_memory(options());
        device.fail_writes();

        let result = session.write(&Command::new(Action::Open)).await;

        assert!(matches!(result, Err(SessionError::WriteFailure(_))));
        assert!(matches!(session.closed().await, CloseReason::DeviceError(_)));
    }

    #[tokio::test]
    async fn test_hang_up_ends_stream_with_end_of_stream() {
        let (_ports, device, session, mut stream) = open_memory(options());
        device.feed(b"9\n");
        device.hang_up();

        assert_eq!(stream.next().await, Some(SensorReading::new(9)));
        assert_eq!(stream.next().await, None);
        assert_eq!(session.closed().await, CloseReason::EndOfStream);
    }

    #[test]
    fn test_info_reports_path_and_baud_rate() {
        let (_ports, _device, session, _stream) = open_memory(options());
        let info = session.info();
        assert_eq!(info.path, "/dev/ttyACM0");
        assert_eq!(info.baud_rate, 9600);
    }
}
