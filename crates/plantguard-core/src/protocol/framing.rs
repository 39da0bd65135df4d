//! Splitting the serial byte stream into frames.
//!
//! The serial port delivers bytes in arbitrary chunks: one `read` may return
//! half a frame, three frames, or a frame whose two-byte `\r\n` delimiter is
//! split across two reads.  [`LineFramer`] buffers bytes until a complete
//! delimiter has arrived and hands back each frame in arrival order.
//!
//! The delimiter itself is configuration ([`Delimiter`]): firmware that prints
//! with `println` ends lines with `\r\n`, firmware that writes `'\n'` by hand
//! ends them with `\n`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Upper bound on buffered bytes without a delimiter before the buffer is
/// discarded.  Protects against a device stuck at the wrong baud rate.
pub const DEFAULT_MAX_FRAME_LEN: usize = 4096;

// ── Delimiter ─────────────────────────────────────────────────────────────────

/// Errors returned when parsing a [`Delimiter`] from configuration text.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DelimiterError {
    #[error("delimiter must not be empty")]
    Empty,
    #[error("unsupported escape sequence '\\{0}' in delimiter")]
    InvalidEscape(char),
    #[error("delimiter ends with a lone backslash")]
    TrailingBackslash,
}

/// The byte sequence that terminates a frame.
///
/// Parsed from `lf`, `crlf`, `cr`, or a literal string in which `\n`, `\r`,
/// `\t` and `\\` are unescaped (`";\n"` etc.).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Delimiter(Vec<u8>);

impl Delimiter {
    pub fn lf() -> Self {
        Self(b"\n".to_vec())
    }

    pub fn crlf() -> Self {
        Self(b"\r\n".to_vec())
    }

    pub fn cr() -> Self {
        Self(b"\r".to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Default for Delimiter {
    fn default() -> Self {
        Self::lf()
    }
}

impl FromStr for Delimiter {
    type Err = DelimiterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lf" => return Ok(Self::lf()),
            "crlf" => return Ok(Self::crlf()),
            "cr" => return Ok(Self::cr()),
            _ => {}
        }

        let mut out = String::with_capacity(s.len());
        let mut chars = s.chars();
        while let Some(c) = chars.next() {
            if c != '\\' {
                out.push(c);
                continue;
            }
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('r') => out.push('\r'),
                Some('t') => out.push('\t'),
                Some('\\') => out.push('\\'),
                Some(other) => return Err(DelimiterError::InvalidEscape(other)),
                None => return Err(DelimiterError::TrailingBackslash),
            }
        }

        if out.is_empty() {
            return Err(DelimiterError::Empty);
        }
        Ok(Self(out.into_bytes()))
    }
}

impl TryFrom<String> for Delimiter {
    type Error = DelimiterError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Delimiter> for String {
    fn from(value: Delimiter) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Delimiter {
    /// Writes the canonical name (`lf`, `crlf`, `cr`) or the escaped literal,
    /// so the output parses back to the same delimiter.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_slice() {
            b"\n" => f.write_str("lf"),
            b"\r\n" => f.write_str("crlf"),
            b"\r" => f.write_str("cr"),
            bytes => {
                for c in String::from_utf8_lossy(bytes).chars() {
                    match c {
                        '\n' => f.write_str("\\n")?,
                        '\r' => f.write_str("\\r")?,
                        '\t' => f.write_str("\\t")?,
                        '\\' => f.write_str("\\\\")?,
                        other => write!(f, "{other}")?,
                    }
                }
                Ok(())
            }
        }
    }
}

// ── LineFramer ────────────────────────────────────────────────────────────────

/// Incremental frame splitter.
///
/// ```
/// use plantguard_core::{Delimiter, LineFramer};
///
/// let mut framer = LineFramer::new(Delimiter::crlf());
/// assert!(framer.push(b"4").is_empty());
/// assert_eq!(framer.push(b"2\r"), Vec::<String>::new());
/// assert_eq!(framer.push(b"\n17\r\n"), vec!["42".to_string(), "17".to_string()]);
/// ```
#[derive(Debug)]
pub struct LineFramer {
    delimiter: Delimiter,
    buf: Vec<u8>,
    /// Bytes of `buf` already known not to start a delimiter.
    scanned: usize,
    max_frame_len: usize,
}

impl LineFramer {
    pub fn new(delimiter: Delimiter) -> Self {
        Self::with_max_frame_len(delimiter, DEFAULT_MAX_FRAME_LEN)
    }

    pub fn with_max_frame_len(delimiter: Delimiter, max_frame_len: usize) -> Self {
        Self {
            delimiter,
            buf: Vec::new(),
            scanned: 0,
            max_frame_len,
        }
    }

    pub fn delimiter(&self) -> &Delimiter {
        &self.delimiter
    }

    /// Number of bytes buffered for the frame in progress.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Feeds a chunk of bytes and returns every frame it completes.
    ///
    /// Frames are decoded as UTF-8, replacing invalid sequences; the delimiter
    /// is not included.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(bytes);

        let delim = self.delimiter.as_bytes();
        let mut frames = Vec::new();
        let mut start = 0;

        while let Some(pos) = find(&self.buf[start + self.scanned..], delim) {
            let end = start + self.scanned + pos;
            frames.push(String::from_utf8_lossy(&self.buf[start..end]).into_owned());
            start = end + delim.len();
            self.scanned = 0;
        }

        self.buf.drain(..start);
        // A partial delimiter may sit at the tail; rescan those bytes next time.
        self.scanned = self.buf.len().saturating_sub(delim.len() - 1);

        if self.buf.len() > self.max_frame_len {
            warn!(
                discarded = self.buf.len(),
                "no delimiter within {} bytes, discarding buffer", self.max_frame_len
            );
            self.buf.clear();
            self.scanned = 0;
        }

        frames
    }

    /// Drops any partial frame (e.g. after the port was reopened).
    pub fn reset(&mut self) {
        self.buf.clear();
        self.scanned = 0;
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
