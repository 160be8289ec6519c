//! TOML configuration for the console host.
//!
//! ```toml
//! log_level = "info"
//!
//! [server]
//! bind_address = "0.0.0.0"
//! port = 5123
//! allowed_remote_addresses = []      # loopback only; "*" admits everyone
//! max_connections = 1
//! echo = true
//! keep_alive = true
//! poll_interval_ms = 100
//! accept_error_backoff_ms = 1000
//! drain_timeout_ms = 5000
//! ```
//!
//! Every field has a default, so an empty or missing file is valid.  Command
//! line flags are folded in with [`ConsoleConfig::apply`] before
//! [`ConsoleConfig::server_options`] validates the result.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use cascadia_net::{resolve_bind_address, ServerOptions};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid value for {field}: {message}")]
    Invalid { field: &'static str, message: String },

    #[error("bind address {0:?} is not a local address")]
    UnresolvableBindAddress(String),
}

// ── Schema ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConsoleConfig {
    /// `tracing` level used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub server: ServerSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSection {
    /// `0.0.0.0`, `*`, `::`, `::1`, `localhost` or a local interface address.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// `"*"` admits everyone; loopback is always admitted.  Empty by default.
    #[serde(default)]
    pub allowed_remote_addresses: Vec<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    #[serde(default = "default_true")]
    pub echo: bool,
    #[serde(default = "default_true")]
    pub keep_alive: bool,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_accept_error_backoff_ms")]
    pub accept_error_backoff_ms: u64,
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    cascadia_net::domain::options::DEFAULT_PORT
}
fn default_max_connections() -> usize {
    1
}
fn default_true() -> bool {
    true
}
fn default_poll_interval_ms() -> u64 {
    100
}
fn default_accept_error_backoff_ms() -> u64 {
    1_000
}
fn default_drain_timeout_ms() -> u64 {
    5_000
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            server: ServerSection::default(),
        }
    }
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            allowed_remote_addresses: Vec::new(),
            max_connections: default_max_connections(),
            echo: default_true(),
            keep_alive: default_true(),
            poll_interval_ms: default_poll_interval_ms(),
            accept_error_backoff_ms: default_accept_error_backoff_ms(),
            drain_timeout_ms: default_drain_timeout_ms(),
        }
    }
}

// ── Overrides ─────────────────────────────────────────────────────────────────

/// Values supplied on the command line or through the environment.  `None`
/// (or an empty list) leaves the file value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub allowed_remote_addresses: Vec<String>,
    pub max_connections: Option<usize>,
    pub echo: Option<bool>,
    pub keep_alive: Option<bool>,
}

impl ConsoleConfig {
    pub fn apply(&mut self, overrides: ConfigOverrides) {
        let server = &mut self.server;
        if let Some(level) = overrides.log_level {
            self.log_level = level;
        }
        if let Some(bind) = overrides.bind_address {
            server.bind_address = bind;
        }
        if let Some(port) = overrides.port {
            server.port = port;
        }
        if !overrides.allowed_remote_addresses.is_empty() {
            server.allowed_remote_addresses = overrides.allowed_remote_addresses;
        }
        if let Some(max) = overrides.max_connections {
            server.max_connections = max;
        }
        if let Some(echo) = overrides.echo {
            server.echo = echo;
        }
        if let Some(keep_alive) = overrides.keep_alive {
            server.keep_alive = keep_alive;
        }
    }

    /// Validates the configuration and converts it into [`ServerOptions`].
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] for a zero port, a zero connection limit or a
    /// zero poll interval; [`ConfigError::UnresolvableBindAddress`] when the
    /// bind address does not name a local interface.
    pub fn server_options(&self) -> Result<ServerOptions, ConfigError> {
        let server = &self.server;

        if server.port == 0 {
            return Err(ConfigError::Invalid {
                field: "server.port",
                message: "must be between 1 and 65535".to_string(),
            });
        }
        if server.max_connections == 0 {
            return Err(ConfigError::Invalid {
                field: "server.max_connections",
                message: "must be at least 1".to_string(),
            });
        }
        if server.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "server.poll_interval_ms",
                message: "must be at least 1".to_string(),
            });
        }

        let ip = resolve_bind_address(&server.bind_address)
            .ok_or_else(|| ConfigError::UnresolvableBindAddress(server.bind_address.clone()))?;

        Ok(ServerOptions {
            local_endpoint: SocketAddr::new(ip, server.port),
            allowed_remote_addresses: server.allowed_remote_addresses.clone(),
            max_connections: server.max_connections,
            echo: server.echo,
            keep_alive: server.keep_alive,
            poll_interval: Duration::from_millis(server.poll_interval_ms),
            accept_error_backoff: Duration::from_millis(server.accept_error_backoff_ms),
            drain_timeout: Duration::from_millis(server.drain_timeout_ms),
        })
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Loads the config at `path`, or the defaults when the file does not exist.
///
/// # Errors
///
/// [`ConfigError::Io`] for file-system errors other than "not found" and
/// [`ConfigError::Parse`] for malformed TOML.
pub fn load_config(path: &Path) -> Result<ConsoleConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConsoleConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// The default configuration as TOML, for `--print-default-config`.
pub fn render_default_config() -> Result<String, ConfigError> {
    Ok(toml::to_string_pretty(&ConsoleConfig::default())?)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
