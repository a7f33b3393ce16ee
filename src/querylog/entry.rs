//! Parsed General Log Entries

use crate::querylog::command::CommandKind;
use chrono::NaiveDateTime;
use std::fmt;

/// Format of the time column in a general log header line (`YYMMDD HH:MM:SS`).
pub const TIMESTAMP_FORMAT: &str = "%y%m%d %H:%M:%S";

/// One command recorded in the general log.
///
/// `timestamp` is `None` only until the first header line carrying a time
/// column has been read; after that, entries whose header elides the time
/// inherit the most recent one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: Option<NaiveDateTime>,
    pub connection_id: u64,
    pub command: CommandKind,
    pub argument: String,
}

impl LogEntry {
    pub fn new(
        timestamp: Option<NaiveDateTime>,
        connection_id: u64,
        command: CommandKind,
        argument: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            connection_id,
            command,
            argument: argument.into(),
        }
    }

    /// The session target of a `Connect` entry.
    ///
    /// The server writes `user@host on database`, so the target is the last
    /// space separated token. It may be empty when the client connected
    /// without selecting a database.
    pub fn connect_target(&self) -> &str {
        self.argument.rsplit(' ').next().unwrap_or("")
    }
}

impl fmt::Display for LogEntry {
    /// Renders the entry back into header line form.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.timestamp {
            Some(ts) => write!(f, "{}", ts.format(TIMESTAMP_FORMAT))?,
            None => f.write_str("\t")?,
        }
        write!(
            f,
            "\t{} {}\t{}",
            self.connection_id, self.command, self.argument
        )
    }
}
