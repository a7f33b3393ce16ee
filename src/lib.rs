//! # glreplay - MySQL General Log Replay
//!
//! glreplay reads a MySQL general query log and replays the recorded client
//! sessions against a live server (or a proxy in front of one), reporting
//! throughput and failures. It is a load-testing tool: the workload it
//! generates has the shape of real traffic, connection churn included.
//!
//! ## Features
//!
//! - **Streaming Parser**: Multi-line statements and elided timestamps,
//!   decided with a fixed lookahead window
//! - **Per-Connection Ordering**: A session's commands run in log order on a
//!   single backend connection
//! - **Parallel Sessions**: Distinct sessions run concurrently on a bounded
//!   worker pool, with backpressure on the log reader
//! - **Read-Only Mode**: Optionally only replays `SELECT` statements
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              glreplay                                   │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │ LogReader   │───>│ Dispatcher  │───>│ Batch Queue │                  │
//! │  │ (querylog)  │    │ id -> batch │    │ (bounded)   │                  │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘                  │
//! │                                               │                         │
//! │                                               ▼                         │
//! │                     ┌──────────────────────────────────────────────┐    │
//! │                     │                WorkerPool                    │    │
//! │                     │  ┌────────┐ ┌────────┐ ┌────────┐ ┌────────┐ │    │
//! │                     │  │Worker 0│ │Worker 1│ │Worker 2│ │...N    │ │    │
//! │                     │  │Session │ │Session │ │Session │ │        │ │    │
//! │                     │  └────────┘ └────────┘ └────────┘ └────────┘ │    │
//! │                     └──────────────────────┬───────────────────────┘    │
//! │                                            │                            │
//! │                            ┌───────────────┴───────────┐                │
//! │                            ▼                           ▼                │
//! │                    ┌──────────────┐           ┌──────────────┐          │
//! │                    │ Backend      │           │ ReplayStats  │<── ProgressReporter
//! │                    │ (MySQL)      │           │ (atomics)    │          │
//! │                    └──────────────┘           └──────────────┘          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use glreplay::backend::MysqlBackend;
//! use glreplay::querylog::LogReader;
//! use glreplay::replay::{replay, ReplayOptions, ReplayStats, SessionContext, StatementFilter};
//! use mysql_async::OptsBuilder;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let backend = MysqlBackend::new(OptsBuilder::default().user(Some("root")));
//!     let ctx = SessionContext {
//!         backend: Arc::new(backend),
//!         stats: Arc::new(ReplayStats::new()),
//!         filter: StatementFilter::read_only(),
//!     };
//!
//!     let reader = LogReader::new(tokio::io::stdin());
//!     let summary = replay(reader, ctx, &ReplayOptions::default()).await?;
//!     println!("{}", summary);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`querylog`]: General log grammar and streaming reader
//! - [`replay`]: Dispatcher, worker pool, stats and progress reporting
//! - [`backend`]: The backend trait and its MySQL implementation
//! - [`config`]: Command-line surface and validated configuration
//!
//! ## Design Highlights
//!
//! ### Ordering by Ownership
//!
//! A connection's entries are collected into one batch and moved to a single
//! worker when its `Quit` is read. No two workers ever see entries of the
//! same session, so ordering needs no locks. The connection's backend handle
//! lives and dies inside that worker.
//!
//! ### Known Limitations
//!
//! - Sessions that never `Quit` before the end of the log are not replayed
//!   unless `--flush-unterminated` is given.
//! - Ctrl+C prints the summary and exits at once; in-flight sessions are
//!   abandoned and their server connections are not closed cleanly.

pub mod backend;
pub mod config;
pub mod querylog;
pub mod replay;

// Re-export commonly used types for convenience
pub use backend::{Backend, BackendError, MysqlBackend};
pub use config::{Cli, ConfigError, ReplayConfig};
pub use querylog::{CommandKind, LogEntry, LogReader, ReadError};
pub use replay::{replay, ReplayError, ReplayOptions, ReplayStats, ReplaySummary};

/// Version of glreplay
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
