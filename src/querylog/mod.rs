//! General Query Log Parsing
//!
//! This module reads the MySQL general query log format: a mostly
//! line-oriented text log in which every client command is recorded with the
//! time, the connection id and the command name, and statement text may
//! spill over several lines.
//!
//! ## Modules
//!
//! - `command`: The closed set of commands a header line can name
//! - `entry`: The `LogEntry` type produced by the reader
//! - `reader`: Streaming, lookahead-based reader turning bytes into entries
//!
//! ## Example
//!
//! ```ignore
//! use glreplay::querylog::LogReader;
//!
//! let mut reader = LogReader::new(tokio::io::stdin());
//! while let Some(entry) = reader.next_entry().await? {
//!     println!("{}", entry);
//! }
//! ```

pub mod command;
pub mod entry;
pub mod reader;

// Re-export commonly used types for convenience
pub use command::CommandKind;
pub use entry::{LogEntry, TIMESTAMP_FORMAT};
pub use reader::{is_header, LogReader, ReadError, LOOKAHEAD_LEN};
