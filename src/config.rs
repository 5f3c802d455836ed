//! # Runtime configuration.
//!
//! [`Config`] is the resolved, typed configuration the components run from.
//! It is assembled from three layers, highest priority first:
//!
//! 1. command-line flags ([`Overrides`], built by the binary),
//! 2. an optional TOML file ([`FileConfig`]),
//! 3. built-in defaults (matching the reference wrapper).
//!
//! Durations in the file use humantime strings (`"30s"`, `"10m"`).
//!
//! ```toml
//! [process]
//! path = "/usr/local/bin/worker"
//! args = ["--queue", "default"]
//! restart = "on-error"
//! fail-on-stderr = true
//! timeout = "30s"
//!
//! [server]
//! address = "0.0.0.0:6060"
//! ping-timeout = "10m"
//! shutdown-timeout = "15s"
//!
//! [log]
//! level = "info"
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::policies::{BackoffPolicy, RestartPolicy};

/// Default listener bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:6060";
/// Default heartbeat interval (`0` disables the heartbeat).
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(600);
/// Default graceful-stop period before the wrapped process is killed.
pub const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(30);
/// Default bound on the graceful http shutdown.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(15);
/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "warn";

/// Errors raised while loading or resolving configuration.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No process path was given on the command line or in the file.
    #[error("no process path configured; pass --process-path or set process.path")]
    MissingProcessPath,

    /// The listener address did not parse.
    #[error("invalid server address {value:?}: {error}")]
    InvalidAddress {
        /// The offending value.
        value: String,
        /// The parse error message.
        error: String,
    },

    /// The configuration file could not be read.
    #[error("cannot read configuration file {path}: {error}")]
    Read {
        /// The file path.
        path: String,
        /// The I/O error message.
        error: String,
    },

    /// The configuration file could not be parsed.
    #[error("cannot parse configuration file {path}: {error}")]
    Parse {
        /// The file path.
        path: String,
        /// The parse error message.
        error: String,
    },
}

/// Fully resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Wrapped-process settings.
    pub process: ProcessConfig,
    /// Health listener settings.
    pub server: ServerConfig,
    /// Default log filter, unless `RUST_LOG` overrides it.
    pub log_level: String,
}

/// Settings of the wrapped process.
#[derive(Debug, Clone)]
pub struct ProcessConfig {
    /// Path of the executable to wrap.
    pub path: PathBuf,
    /// Arguments passed to the executable.
    pub args: Vec<String>,
    /// Whether and when to restart the process.
    pub restart: RestartPolicy,
    /// Discard the process stdout instead of forwarding it to the logs.
    pub hide_stdout: bool,
    /// Discard the process stderr instead of forwarding it to the logs.
    /// Also disables fail-on-stderr detection.
    pub hide_stderr: bool,
    /// Report an error status whenever the process writes to stderr.
    pub fail_on_stderr: bool,
    /// How long to wait for a graceful exit before killing the process.
    pub stop_grace: Duration,
    /// Restart pacing.
    pub backoff: BackoffPolicy,
}

impl ProcessConfig {
    /// A configuration for `path` with every other field at its default.
    pub fn for_command(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            args: Vec::new(),
            restart: RestartPolicy::default(),
            hide_stdout: false,
            hide_stderr: false,
            fail_on_stderr: false,
            stop_grace: DEFAULT_STOP_GRACE,
            backoff: BackoffPolicy::default(),
        }
    }
}

/// Settings of the health listener.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub address: SocketAddr,
    /// Heartbeat interval; zero disables the heartbeat entirely.
    pub ping_interval: Duration,
    /// Bound on the graceful http shutdown.
    pub shutdown_timeout: Duration,
}

/// Command-line values layered on top of the file and the defaults.
///
/// `None` (or `false` for the flags) means "not set on the command line".
#[derive(Debug, Default)]
pub struct Overrides {
    pub process_path: Option<PathBuf>,
    pub process_args: Option<Vec<String>>,
    pub restart: Option<RestartPolicy>,
    pub hide_stdout: bool,
    pub hide_stderr: bool,
    pub fail_on_stderr: bool,
    pub stop_grace: Option<Duration>,
    pub address: Option<String>,
    pub ping_interval: Option<Duration>,
    pub shutdown_timeout: Option<Duration>,
    pub log_level: Option<String>,
}

/// On-disk configuration file, every field optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileConfig {
    pub process: ProcessSection,
    pub server: ServerSection,
    pub log: LogSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct ProcessSection {
    pub path: Option<PathBuf>,
    pub args: Option<Vec<String>>,
    pub restart: Option<RestartPolicy>,
    pub hide_stdout: bool,
    pub hide_stderr: bool,
    pub fail_on_stderr: bool,
    #[serde(with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct ServerSection {
    pub address: Option<String>,
    #[serde(with = "humantime_serde")]
    pub ping_timeout: Option<Duration>,
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Option<Duration>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogSection {
    pub level: Option<String>,
}

impl FileConfig {
    /// Reads and parses a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        toml::from_str(&text).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            error: e.to_string(),
        })
    }
}

impl Config {
    /// Resolves the three layers into a runnable configuration.
    pub fn resolve(overrides: Overrides, file: FileConfig) -> Result<Self, ConfigError> {
        let path = overrides
            .process_path
            .or(file.process.path)
            .ok_or(ConfigError::MissingProcessPath)?;

        let process = ProcessConfig {
            path,
            args: overrides
                .process_args
                .or(file.process.args)
                .unwrap_or_default(),
            restart: overrides
                .restart
                .or(file.process.restart)
                .unwrap_or_default(),
            hide_stdout: overrides.hide_stdout || file.process.hide_stdout,
            hide_stderr: overrides.hide_stderr || file.process.hide_stderr,
            fail_on_stderr: overrides.fail_on_stderr || file.process.fail_on_stderr,
            stop_grace: overrides
                .stop_grace
                .or(file.process.timeout)
                .unwrap_or(DEFAULT_STOP_GRACE),
            backoff: BackoffPolicy::default(),
        };

        let server = ServerConfig {
            address: parse_address(
                overrides
                    .address
                    .or(file.server.address)
                    .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string()),
            )?,
            ping_interval: overrides
                .ping_interval
                .or(file.server.ping_timeout)
                .unwrap_or(DEFAULT_PING_INTERVAL),
            shutdown_timeout: overrides
                .shutdown_timeout
                .or(file.server.shutdown_timeout)
                .unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT),
        };

        Ok(Config {
            process,
            server,
            log_level: overrides
                .log_level
                .or(file.log.level)
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        })
    }
}

/// Parses a bind address, accepting the `:port` shorthand for
/// "all interfaces".
fn parse_address(value: String) -> Result<SocketAddr, ConfigError> {
    let normalized = if value.starts_with(':') {
        format!("0.0.0.0{value}")
    } else {
        value.clone()
    };
    normalized
        .parse()
        .map_err(|e: std::net::AddrParseError| ConfigError::InvalidAddress {
            value,
            error: e.to_string(),
        })
}
