//! MySQL Backend
//!
//! Every replayed session gets its own `mysql_async::Conn`, not a pooled
//! connection: the point of the replay is to reproduce the connect/quit
//! churn of the original clients.

use crate::backend::{Backend, BackendError};
use async_trait::async_trait;
use mysql_async::prelude::Queryable;
use mysql_async::{Conn, Opts, OptsBuilder};
use tracing::debug;

/// Replays sessions against a MySQL server.
#[derive(Debug, Clone)]
pub struct MysqlBackend {
    /// Address and credentials shared by every session
    base: Opts,
}

impl MysqlBackend {
    /// Creates a backend from base connection options. The database name is
    /// filled in per session from the `Connect` entry.
    pub fn new(base: impl Into<Opts>) -> Self {
        Self { base: base.into() }
    }

    fn session_opts(&self, target: &str) -> OptsBuilder {
        let db_name = if target.is_empty() {
            None
        } else {
            Some(target.to_string())
        };
        OptsBuilder::from_opts(self.base.clone()).db_name(db_name)
    }
}

#[async_trait]
impl Backend for MysqlBackend {
    type Handle = Conn;

    async fn open(&self, target: &str) -> Result<Conn, BackendError> {
        let mut conn = Conn::new(self.session_opts(target)).await?;
        // A connection that cannot answer a ping is as good as a failed open
        if let Err(e) = conn.ping().await {
            let _ = conn.disconnect().await;
            return Err(e.into());
        }
        Ok(conn)
    }

    async fn execute(&self, handle: &mut Conn, statement: &str) -> Result<(), BackendError> {
        handle.query_drop(statement).await?;
        Ok(())
    }

    async fn close(&self, handle: Conn) {
        if let Err(e) = handle.disconnect().await {
            debug!(error = %e, "Error while disconnecting from MySQL");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_opts_sets_database() {
        let base = OptsBuilder::default()
            .ip_or_hostname("db.internal")
            .tcp_port(3307)
            .user(Some("replay"));
        let backend = MysqlBackend::new(base);

        let opts: Opts = backend.session_opts("blah_core").into();
        assert_eq!(opts.db_name(), Some("blah_core"));
        assert_eq!(opts.ip_or_hostname(), "db.internal");
        assert_eq!(opts.tcp_port(), 3307);
        assert_eq!(opts.user(), Some("replay"));

        let opts: Opts = backend.session_opts("").into();
        assert_eq!(opts.db_name(), None);
    }
}
