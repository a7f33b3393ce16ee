//! Streaming General Log Reader
//!
//! Turns the raw bytes of a general query log into a sequence of
//! [`LogEntry`] values, one call to [`LogReader::next_entry`] at a time.
//!
//! ## Line Grammar
//!
//! A **header line** opens a new entry:
//!
//! ```text
//! 150703 23:26:04\t   15 Query\tSELECT *
//! \t\t   15 Quit\t
//! ```
//!
//! The time column is either a `YYMMDD HH:MM:SS` stamp or a tab meaning "same
//! as the previous entry". It is followed by a tab, the connection id, a
//! space, the command name and a tab. Everything after that tab starts
//! the argument.
//!
//! Any other line is a **continuation line** and is appended verbatim to the
//! entry that is currently open. This is how multi-line statements are
//! recorded.
//!
//! ## How the Reader Works
//!
//! ```text
//!            header line found
//!   Seeking ───────────────────> Accumulating ──┐
//!      ▲                              │         │ next line is not a header:
//!      │                              │         │ consume and append it
//!      │   lookahead is a header      │ <───────┘
//!      └──── or stream is empty ──────┘
//!              (yield the entry)
//! ```
//!
//! The reader never consumes the line that starts the next entry. It peeks
//! at a fixed window of upcoming bytes and checks it against the header
//! grammar instead.

use crate::querylog::command::CommandKind;
use crate::querylog::entry::{LogEntry, TIMESTAMP_FORMAT};
use bytes::BytesMut;
use chrono::NaiveDateTime;
use regex::bytes::Regex;
use std::sync::LazyLock;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::trace;

/// Number of bytes inspected when deciding whether the next line opens a new
/// entry. Must cover the longest possible header prefix.
pub const LOOKAHEAD_LEN: usize = 64;

/// Initial read buffer capacity
const INITIAL_BUFFER_SIZE: usize = 8 * 1024;

/// Header line prefix: time column (or elided), connection id, command name.
static HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:([0-9]{6} [0-9]{2}:[0-9]{2}:[0-9]{2})|\t)?\t *([0-9]+) ([^\t\n]+)\t")
        .expect("header pattern is a valid regex")
});

/// Errors that abort reading the log.
#[derive(Debug, Error)]
pub enum ReadError {
    /// The underlying stream failed for a reason other than reaching its end
    #[error("I/O error reading general log: {0}")]
    Io(#[from] std::io::Error),
}

/// The pieces of a matched header line.
#[derive(Debug)]
struct Header<'a> {
    timestamp: Option<&'a [u8]>,
    connection_id: &'a [u8],
    command: CommandKind,
    /// Length of the header prefix, including the tab after the command
    len: usize,
}

/// Matches the header grammar against the start of `buf`.
fn match_header(buf: &[u8]) -> Option<Header<'_>> {
    let caps = HEADER.captures(buf)?;
    let name = std::str::from_utf8(caps.get(3)?.as_bytes()).ok()?;
    let command = CommandKind::from_name(name);

    Some(Header {
        timestamp: caps.get(1).map(|m| m.as_bytes()),
        connection_id: caps.get(2)?.as_bytes(),
        command,
        len: caps.get(0)?.end(),
    })
}

/// Returns true if `buf` starts with a header line.
pub fn is_header(buf: &[u8]) -> bool {
    match_header(buf).is_some()
}

/// An entry whose argument is still being accumulated.
struct PendingEntry {
    timestamp: Option<NaiveDateTime>,
    connection_id: u64,
    command: CommandKind,
    argument: BytesMut,
}

impl PendingEntry {
    /// Strips the line break left by the last line read and builds the entry.
    fn finish(mut self) -> LogEntry {
        if self.argument.last() == Some(&b'\n') {
            self.argument.truncate(self.argument.len() - 1);
        }
        let argument = match String::from_utf8(self.argument.to_vec()) {
            Ok(s) => s,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        };
        LogEntry {
            timestamp: self.timestamp,
            connection_id: self.connection_id,
            command: self.command,
            argument,
        }
    }
}

enum ReadState {
    Seeking,
    Accumulating(PendingEntry),
}

/// Reads [`LogEntry`] values from a general query log.
///
/// The reader is forward-only: it consumes the stream monotonically and
/// cannot be rewound.
///
/// # Example
///
/// ```
/// use glreplay::querylog::{CommandKind, LogReader};
///
/// # tokio_test::block_on(async {
/// let log = b"150703 23:26:04\t15 Query\tSELECT\n1\n\t\t15 Quit\t\n";
/// let mut reader = LogReader::new(&log[..]);
///
/// let entry = reader.next_entry().await.unwrap().unwrap();
/// assert_eq!(entry.command, CommandKind::Query);
/// assert_eq!(entry.argument, "SELECT\n1");
///
/// let entry = reader.next_entry().await.unwrap().unwrap();
/// assert_eq!(entry.command, CommandKind::Quit);
///
/// assert!(reader.next_entry().await.unwrap().is_none());
/// # });
/// ```
pub struct LogReader<R> {
    inner: R,

    /// Bytes read from `inner` but not yet consumed
    buffer: BytesMut,

    /// How far into `buffer` we already searched for a line break
    scanned: usize,

    /// Set once `inner` has returned end-of-stream
    eof: bool,

    /// Time column of the most recent header that carried one
    last_timestamp: Option<NaiveDateTime>,

    /// Number of entries produced so far
    entries_read: u64,
}

impl<R: AsyncRead + Unpin> LogReader<R> {
    /// Creates a reader over the given byte stream.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            scanned: 0,
            eof: false,
            last_timestamp: None,
            entries_read: 0,
        }
    }

    /// Number of entries produced so far.
    pub fn entries_read(&self) -> u64 {
        self.entries_read
    }

    /// Reads the next entry from the log.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(entry))` - An entry was read
    /// - `Ok(None)` - The stream is exhausted
    /// - `Err(e)` - The stream failed; the reader must not be used again
    pub async fn next_entry(&mut self) -> Result<Option<LogEntry>, ReadError> {
        let mut state = ReadState::Seeking;

        loop {
            state = match state {
                ReadState::Seeking => {
                    let Some(line) = self.read_line().await? else {
                        return Ok(None);
                    };
                    match self.open_entry(&line) {
                        Some(pending) => ReadState::Accumulating(pending),
                        None => {
                            trace!(bytes = line.len(), "Skipping non-header line");
                            ReadState::Seeking
                        }
                    }
                }
                ReadState::Accumulating(mut pending) => {
                    let window = self.peek(LOOKAHEAD_LEN).await?;
                    if window.is_empty() || is_header(window) {
                        self.entries_read += 1;
                        return Ok(Some(pending.finish()));
                    }
                    if let Some(line) = self.read_line().await? {
                        pending.argument.extend_from_slice(&line);
                    }
                    ReadState::Accumulating(pending)
                }
            };
        }
    }

    /// Starts a new entry if `line` is a header line.
    ///
    /// Unparsable time or id fields do not reject the line: the entry keeps
    /// the previous timestamp or a zero id.
    fn open_entry(&mut self, line: &[u8]) -> Option<PendingEntry> {
        let header = match_header(line)?;

        if let Some(raw) = header.timestamp {
            let parsed = std::str::from_utf8(raw)
                .ok()
                .and_then(|s| NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).ok());
            match parsed {
                Some(ts) => self.last_timestamp = Some(ts),
                None => trace!(
                    raw = %String::from_utf8_lossy(raw),
                    "Unparsable timestamp, keeping previous"
                ),
            }
        }

        let connection_id = std::str::from_utf8(header.connection_id)
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or_else(|| {
                trace!(
                    raw = %String::from_utf8_lossy(header.connection_id),
                    "Unparsable connection id, using 0"
                );
                0
            });

        let mut argument = BytesMut::with_capacity(line.len() - header.len);
        argument.extend_from_slice(&line[header.len..]);

        Some(PendingEntry {
            timestamp: self.last_timestamp,
            connection_id,
            command: header.command,
            argument,
        })
    }

    /// Reads more bytes into the buffer. Returns the number of bytes read,
    /// zero once the stream is exhausted.
    async fn fill_buffer(&mut self) -> Result<usize, ReadError> {
        if self.eof {
            return Ok(0);
        }
        if self.buffer.capacity() - self.buffer.len() < 1024 {
            self.buffer.reserve(INITIAL_BUFFER_SIZE);
        }
        let n = self.inner.read_buf(&mut self.buffer).await?;
        if n == 0 {
            self.eof = true;
        }
        Ok(n)
    }

    /// Returns up to `n` upcoming bytes without consuming them. Fewer than
    /// `n` bytes are returned only at the end of the stream.
    async fn peek(&mut self, n: usize) -> Result<&[u8], ReadError> {
        while self.buffer.len() < n && !self.eof {
            self.fill_buffer().await?;
        }
        let len = self.buffer.len().min(n);
        Ok(&self.buffer[..len])
    }

    /// Consumes the next line including its trailing `\n`. The last line of
    /// the stream is returned even without a line break.
    async fn read_line(&mut self) -> Result<Option<BytesMut>, ReadError> {
        loop {
            if let Some(pos) = self.buffer[self.scanned..].iter().position(|&b| b == b'\n') {
                let end = self.scanned + pos + 1;
                self.scanned = 0;
                return Ok(Some(self.buffer.split_to(end)));
            }
            self.scanned = self.buffer.len();

            if self.eof || self.fill_buffer().await? == 0 {
                self.scanned = 0;
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                let len = self.buffer.len();
                return Ok(Some(self.buffer.split_to(len)));
            }
        }
    }
}
