//! Replay Configuration
//!
//! Command-line parsing and validation. The raw [`Cli`] is turned into a
//! [`ReplayConfig`] before any work begins, so invalid settings fail fast.

use crate::replay::{ReplayOptions, StatementFilter, Strategy, DEFAULT_QUEUE_CAPACITY};
use clap::{ArgAction, Parser};
use mysql_async::OptsBuilder;
use std::fmt;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default MySQL port
pub const DEFAULT_MYSQL_PORT: u16 = 3306;

/// Errors in the replay configuration. All of them are fatal.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("query concurrency must be positive, got {0}")]
    NonPositiveConcurrency(i64),

    #[error("queue capacity must be positive")]
    ZeroQueueCapacity,

    #[error("progress interval must be positive")]
    ZeroProgressInterval,

    #[error("invalid server address '{0}'")]
    InvalidAddress(String),
}

/// Replays a MySQL general query log against a live server.
///
/// The log is read from INPUT, or from standard input when INPUT is absent
/// or `-`.
#[derive(Debug, Parser)]
#[command(name = "glreplay", version, about, long_about = None)]
pub struct Cli {
    /// MySQL username
    #[arg(long, default_value = "")]
    pub user: String,

    /// MySQL password
    #[arg(long, env = "MYSQL_PWD", hide_env_values = true)]
    pub pass: Option<String>,

    /// Server address: tcp(host:port), unix(/path/to/mysql.sock) or host[:port]
    #[arg(long, default_value = "127.0.0.1:3306")]
    pub addr: String,

    /// Number of connections replayed concurrently
    #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
    pub conc: i64,

    /// Only execute statements starting with SELECT (`--ro` or `--ro=false`)
    #[arg(
        long,
        default_value_t = true,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        action = ArgAction::Set
    )]
    pub ro: bool,

    /// Number of finished connections buffered ahead of the workers
    #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,

    /// How entries are handed to workers: batched or keyed-lock
    #[arg(long, default_value_t = Strategy::Batched)]
    pub strategy: Strategy,

    /// Replay connections that never quit before the end of the log
    #[arg(long)]
    pub flush_unterminated: bool,

    /// Milliseconds between progress lines
    #[arg(long, default_value_t = 1000)]
    pub progress_interval_ms: u64,

    /// General log file to replay
    pub input: Option<PathBuf>,
}

/// Where the general log is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Stdin,
    File(PathBuf),
}

/// Address of the server under test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerAddr {
    Tcp { host: String, port: u16 },
    Socket(PathBuf),
}

impl FromStr for ServerAddr {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidAddress(s.to_string());
        let s = s.trim();

        if let Some(path) = s.strip_prefix("unix(").and_then(|r| r.strip_suffix(')')) {
            if path.is_empty() {
                return Err(invalid());
            }
            return Ok(ServerAddr::Socket(PathBuf::from(path)));
        }

        let hostport = s
            .strip_prefix("tcp(")
            .and_then(|r| r.strip_suffix(')'))
            .unwrap_or(s);

        // [::1]:3306
        if let Some(rest) = hostport.strip_prefix('[') {
            let (host, tail) = rest.split_once(']').ok_or_else(invalid)?;
            let port = match tail.strip_prefix(':') {
                Some(port) => port.parse().map_err(|_| invalid())?,
                None if tail.is_empty() => DEFAULT_MYSQL_PORT,
                None => return Err(invalid()),
            };
            return Ok(ServerAddr::Tcp {
                host: host.to_string(),
                port,
            });
        }

        let (host, port) = match hostport.rsplit_once(':') {
            Some((host, port)) => (host, port.parse().map_err(|_| invalid())?),
            None => (hostport, DEFAULT_MYSQL_PORT),
        };
        if host.is_empty() || host.contains(':') {
            return Err(invalid());
        }
        Ok(ServerAddr::Tcp {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for ServerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerAddr::Tcp { host, port } if host.contains(':') => write!(f, "tcp([{}]:{})", host, port),
            ServerAddr::Tcp { host, port } => write!(f, "tcp({}:{})", host, port),
            ServerAddr::Socket(path) => write!(f, "unix({})", path.display()),
        }
    }
}

/// Validated configuration for one replay run.
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    pub addr: ServerAddr,
    pub user: Option<String>,
    pub pass: Option<String>,
    pub replay: ReplayOptions,
    pub filter: StatementFilter,
    pub progress_interval: Duration,
    pub input: Input,
}

impl TryFrom<Cli> for ReplayConfig {
    type Error = ConfigError;

    fn try_from(cli: Cli) -> Result<Self, Self::Error> {
        let concurrency = usize::try_from(cli.conc)
            .ok()
            .and_then(NonZeroUsize::new)
            .ok_or(ConfigError::NonPositiveConcurrency(cli.conc))?;
        let queue_capacity =
            NonZeroUsize::new(cli.queue_capacity).ok_or(ConfigError::ZeroQueueCapacity)?;
        if cli.progress_interval_ms == 0 {
            return Err(ConfigError::ZeroProgressInterval);
        }

        let input = match cli.input {
            Some(path) if path.as_os_str() != "-" => Input::File(path),
            _ => Input::Stdin,
        };

        Ok(Self {
            addr: cli.addr.parse()?,
            user: Some(cli.user).filter(|u| !u.is_empty()),
            pass: cli.pass,
            replay: ReplayOptions {
                concurrency,
                queue_capacity,
                strategy: cli.strategy,
                flush_unterminated: cli.flush_unterminated,
            },
            filter: StatementFilter::new(cli.ro),
            progress_interval: Duration::from_millis(cli.progress_interval_ms),
            input,
        })
    }
}

impl ReplayConfig {
    /// Base MySQL connection options shared by every replayed session.
    pub fn mysql_opts(&self) -> OptsBuilder {
        let builder = OptsBuilder::default()
            .user(self.user.clone())
            .pass(self.pass.clone());

        match &self.addr {
            ServerAddr::Tcp { host, port } => builder.ip_or_hostname(host.clone()).tcp_port(*port),
            ServerAddr::Socket(path) => builder.socket(Some(path.to_string_lossy().into_owned())),
        }
    }
}
