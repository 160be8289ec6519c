//! Server configuration.
//!
//! [`ServerOptions`] is consumed once by [`crate::TcpServer::new`] and never
//! changes for the lifetime of that server.  To run with different options,
//! stop the server and build a new one.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use super::allow_policy::AllowPolicy;

/// Idle time before the first keep-alive probe is sent.
pub const KEEP_ALIVE_TIME: Duration = Duration::from_millis(10_000);

/// Interval between keep-alive probes once probing has started.
pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_millis(10_000);

/// Default poll tick of the listener controller.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default pause after a bind or accept failure.
pub const DEFAULT_ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(1_000);

/// Default upper bound on waiting for handlers after cancellation.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Default port of the ingest listener.
pub const DEFAULT_PORT: u16 = 5123;

/// All runtime configuration for one [`crate::TcpServer`].
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Address and port the listen socket binds to.
    ///
    /// Port `0` asks the OS for a free port; the port chosen by the first
    /// successful bind is reused every time the socket is re-opened.
    pub local_endpoint: SocketAddr,

    /// Textual remote addresses allowed to connect.  `"*"` allows everyone.
    /// Loopback peers are always allowed.
    pub allowed_remote_addresses: Vec<String>,

    /// Ceiling on concurrently connected clients.
    pub max_connections: usize,

    /// Write every received chunk back to the sender.
    pub echo: bool,

    /// Enable TCP keep-alive (10 s idle, 10 s interval) on accepted sockets.
    pub keep_alive: bool,

    /// How often the controller re-evaluates the connection ceiling.
    pub poll_interval: Duration,

    /// Pause after a bind or accept failure before trying again.
    pub accept_error_backoff: Duration,

    /// Longest time the controller waits for in-flight handlers after a stop.
    pub drain_timeout: Duration,
}

impl ServerOptions {
    /// Builds the allow policy described by `allowed_remote_addresses`.
    pub fn allow_policy(&self) -> AllowPolicy {
        AllowPolicy::new(self.allowed_remote_addresses.iter().cloned())
    }
}

impl Default for ServerOptions {
    /// | Field                    | Default          |
    /// |--------------------------|------------------|
    /// | local_endpoint           | `0.0.0.0:5123`   |
    /// | allowed_remote_addresses | empty (loopback) |
    /// | max_connections          | `usize::MAX`     |
    /// | echo / keep_alive        | `false`          |
    /// | poll_interval            | 100 ms           |
    /// | accept_error_backoff     | 1000 ms          |
    /// | drain_timeout            | 5 s              |
    fn default() -> Self {
        Self {
            local_endpoint: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            allowed_remote_addresses: Vec::new(),
            max_connections: usize::MAX,
            echo: false,
            keep_alive: false,
            poll_interval: DEFAULT_POLL_INTERVAL,
            accept_error_backoff: DEFAULT_ACCEPT_ERROR_BACKOFF,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
