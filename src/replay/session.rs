//! Session Execution
//!
//! Applies the entries of one connection to a backend, one at a time, and
//! records the outcome of each in the shared stats.
//!
//! ```text
//! Connect ──> open(target) ──> handle kept for the rest of the session
//! Query   ──> execute(handle, stmt)   (skipped without a handle or if filtered)
//! Quit    ──> close(handle)
//! other   ──> counted as ignored
//! ```
//!
//! Nothing is retried and a failed statement does not stop the session.

use crate::backend::Backend;
use crate::querylog::{CommandKind, LogEntry};
use crate::replay::stats::ReplayStats;
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::{debug, trace};

static READ_ONLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*select").expect("read-only pattern is a valid regex"));

/// Decides which statements may be sent to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatementFilter {
    read_only: bool,
}

impl StatementFilter {
    /// Only statements that start with `SELECT` (any case, leading
    /// whitespace allowed) pass.
    pub fn read_only() -> Self {
        Self { read_only: true }
    }

    /// Every statement passes.
    pub fn allow_all() -> Self {
        Self { read_only: false }
    }

    pub fn new(read_only: bool) -> Self {
        Self { read_only }
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn allows(&self, statement: &str) -> bool {
        !self.read_only || READ_ONLY.is_match(statement)
    }
}

impl Default for StatementFilter {
    fn default() -> Self {
        Self::read_only()
    }
}

/// Everything a worker needs to execute sessions.
pub struct SessionContext<B: Backend> {
    pub backend: Arc<B>,
    pub stats: Arc<ReplayStats>,
    pub filter: StatementFilter,
}

impl<B: Backend> Clone for SessionContext<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            stats: Arc::clone(&self.stats),
            filter: self.filter,
        }
    }
}

/// State of one replayed client session.
pub struct Session<B: Backend> {
    connection_id: u64,
    handle: Option<B::Handle>,
}

impl<B: Backend> Session<B> {
    pub fn new(connection_id: u64) -> Self {
        Self {
            connection_id,
            handle: None,
        }
    }

    /// Returns true while a backend handle is held.
    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    /// Applies one entry.
    pub async fn apply(&mut self, ctx: &SessionContext<B>, entry: &LogEntry) {
        match &entry.command {
            CommandKind::Connect => self.connect(ctx, entry.connect_target()).await,
            CommandKind::Query => self.query(ctx, &entry.argument).await,
            CommandKind::Quit => self.close(ctx).await,
            other => {
                ctx.stats.command_ignored();
                trace!(conn = self.connection_id, command = %other, "Ignoring command");
            }
        }
    }

    async fn connect(&mut self, ctx: &SessionContext<B>, target: &str) {
        // A second Connect replaces the session
        self.close(ctx).await;

        ctx.stats.connection_attempted();
        match ctx.backend.open(target).await {
            Ok(handle) => {
                ctx.stats.connection_opened();
                self.handle = Some(handle);
                trace!(conn = self.connection_id, target, "Session opened");
            }
            Err(e) => {
                ctx.stats.connection_failed();
                debug!(conn = self.connection_id, target, error = %e, "Failed to open session");
            }
        }
    }

    async fn query(&mut self, ctx: &SessionContext<B>, statement: &str) {
        ctx.stats.query_attempted();
        match self.handle.as_mut() {
            Some(handle) if ctx.filter.allows(statement) => {
                if let Err(e) = ctx.backend.execute(handle, statement).await {
                    ctx.stats.query_failed();
                    debug!(conn = self.connection_id, error = %e, "Query failed");
                }
            }
            _ => ctx.stats.query_skipped(),
        }
    }

    /// Closes the backend handle, if one is held.
    pub async fn close(&mut self, ctx: &SessionContext<B>) {
        if let Some(handle) = self.handle.take() {
            ctx.backend.close(handle).await;
            ctx.stats.connection_closed();
            trace!(conn = self.connection_id, "Session closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::recording::{Call, RecordingBackend};

    fn context(backend: RecordingBackend, filter: StatementFilter) -> SessionContext<RecordingBackend> {
        SessionContext {
            backend: Arc::new(backend),
            stats: Arc::new(ReplayStats::new()),
            filter,
        }
    }

    fn entry(command: CommandKind, argument: &str) -> LogEntry {
        LogEntry::new(None, 7, command, argument)
    }

    #[test]
    fn test_read_only_filter() {
        let filter = StatementFilter::read_only();
        assert!(filter.allows("SELECT 1"));
        assert!(filter.allows("select @@version_comment limit 1"));
        assert!(filter.allows("  \n\tSeLeCt *\nFROM t"));
        assert!(!filter.allows("UPDATE t SET a = 1"));
        assert!(!filter.allows("SET GLOBAL query_cache_size=0"));
        assert!(!filter.allows("/* SELECT */ DELETE FROM t"));
        assert!(!filter.allows(""));

        let filter = StatementFilter::allow_all();
        assert!(filter.allows("DELETE FROM t"));
    }

    #[tokio::test]
    async fn test_full_session() {
        let ctx = context(RecordingBackend::new(), StatementFilter::read_only());
        let mut session = Session::new(7);

        session.apply(&ctx, &entry(CommandKind::Connect, "u@h on shop")).await;
        assert!(session.is_open());
        assert_eq!(ctx.stats.snapshot().conn_open, 1);

        session.apply(&ctx, &entry(CommandKind::Query, "SELECT 1")).await;
        session.apply(&ctx, &entry(CommandKind::Query, "UPDATE t SET a = 1")).await;
        session.apply(&ctx, &entry(CommandKind::Ping, "")).await;
        session.apply(&ctx, &entry(CommandKind::Quit, "")).await;
        assert!(!session.is_open());

        let snap = ctx.stats.snapshot();
        assert_eq!(snap.conn_count, 1);
        assert_eq!(snap.conn_open, 0);
        assert_eq!(snap.conn_failed, 0);
        assert_eq!(snap.query_count, 2);
        assert_eq!(snap.query_skipped, 1);
        assert_eq!(snap.query_failed, 0);
        assert_eq!(snap.commands_ignored, 1);

        assert_eq!(
            ctx.backend.calls(),
            vec![
                Call::Open { handle: 0, target: "shop".into() },
                Call::Execute { handle: 0, target: "shop".into(), statement: "SELECT 1".into() },
                Call::Close { handle: 0, target: "shop".into() },
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_open_skips_queries() {
        let ctx = context(
            RecordingBackend::new().refuse_target("locked"),
            StatementFilter::allow_all(),
        );
        let mut session = Session::new(7);

        session.apply(&ctx, &entry(CommandKind::Connect, "u@h on locked")).await;
        session.apply(&ctx, &entry(CommandKind::Query, "SELECT 1")).await;
        session.apply(&ctx, &entry(CommandKind::Quit, "")).await;

        let snap = ctx.stats.snapshot();
        assert_eq!(snap.conn_count, 1);
        assert_eq!(snap.conn_failed, 1);
        assert_eq!(snap.conn_open, 0);
        assert_eq!(snap.query_skipped, 1);
        assert!(ctx.backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_failed_query_does_not_stop_session() {
        let ctx = context(
            RecordingBackend::new().fail_statement("SELECT broken"),
            StatementFilter::read_only(),
        );
        let mut session = Session::new(7);

        session.apply(&ctx, &entry(CommandKind::Connect, "u@h on shop")).await;
        session.apply(&ctx, &entry(CommandKind::Query, "SELECT broken")).await;
        session.apply(&ctx, &entry(CommandKind::Query, "SELECT 2")).await;
        session.close(&ctx).await;

        let snap = ctx.stats.snapshot();
        assert_eq!(snap.query_count, 2);
        assert_eq!(snap.query_failed, 1);
        assert_eq!(snap.query_skipped, 0);
        assert_eq!(ctx.backend.executed_for("shop"), vec!["SELECT broken", "SELECT 2"]);
    }

    #[tokio::test]
    async fn test_query_before_connect_is_skipped() {
        let ctx = context(RecordingBackend::new(), StatementFilter::allow_all());
        let mut session = Session::new(7);

        session.apply(&ctx, &entry(CommandKind::Query, "SELECT 1")).await;

        let snap = ctx.stats.snapshot();
        assert_eq!(snap.query_count, 1);
        assert_eq!(snap.query_skipped, 1);
        assert_eq!(snap.query_failed, 0);
    }

    #[tokio::test]
    async fn test_reconnect_closes_previous_handle() {
        let ctx = context(RecordingBackend::new(), StatementFilter::allow_all());
        let mut session = Session::new(7);

        session.apply(&ctx, &entry(CommandKind::Connect, "u@h on a")).await;
        session.apply(&ctx, &entry(CommandKind::Connect, "u@h on b")).await;
        session.close(&ctx).await;

        let snap = ctx.stats.snapshot();
        assert_eq!(snap.conn_count, 2);
        assert_eq!(snap.conn_open, 0);
        assert_eq!(ctx.backend.max_open(), 1);
    }
}
