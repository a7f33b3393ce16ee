//! Replay Backend
//!
//! The replay engine does not talk to a database directly. Workers go
//! through the [`Backend`] trait, which needs only three operations:
//!
//! ```text
//! open(target)             -> Handle     (Connect)
//! execute(handle, stmt)    -> ()         (Query)
//! close(handle)                          (Quit / end of batch)
//! ```
//!
//! A handle is owned by exactly one worker for the lifetime of a session and
//! is never shared, so `execute` takes it by `&mut`.
//!
//! ## Implementations
//!
//! - `mysql`: A real MySQL server reached through `mysql_async`
//! - `recording` (tests only): Records every call, optionally fails some

pub mod mysql;

#[cfg(test)]
pub(crate) mod recording;

use async_trait::async_trait;
use thiserror::Error;

pub use mysql::MysqlBackend;

/// Errors returned by a backend.
///
/// These never abort a replay; workers count them and move on.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Error reported by the MySQL client
    #[error("MySQL error: {0}")]
    Mysql(#[from] mysql_async::Error),

    /// The backend refused to open a session
    #[error("connection refused: {0}")]
    Refused(String),

    /// The backend rejected a statement
    #[error("statement failed: {0}")]
    Statement(String),
}

/// A system under test that sessions can be replayed against.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    /// A live session, owned by the worker that opened it
    type Handle: Send + 'static;

    /// Opens a session for the given target (a database name, possibly empty).
    async fn open(&self, target: &str) -> Result<Self::Handle, BackendError>;

    /// Executes one statement, discarding any result set.
    async fn execute(&self, handle: &mut Self::Handle, statement: &str)
        -> Result<(), BackendError>;

    /// Closes a session. Failures are the backend's to log.
    async fn close(&self, handle: Self::Handle);
}
