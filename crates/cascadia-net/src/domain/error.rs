//! Error taxonomy of the server.
//!
//! Every failure stays inside the task that produced it (the controller loop
//! or a single connection handler) and is surfaced on the error channel.
//! Nothing here is ever returned from `start()` or `stop()`.
//!
//! I/O sources are held in an `Arc` so a single error can be cloned to every
//! error-channel subscriber.

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;

/// Errors reported by the server on its error channel.
#[derive(Debug, Clone, Error)]
pub enum ServerError {
    /// The listen socket could not be bound or put into listening mode.
    /// The controller backs off and retries.
    #[error("failed to bind listener on {addr}: {source}")]
    BindFailure {
        addr: SocketAddr,
        #[source]
        source: Arc<std::io::Error>,
    },

    /// `accept()` failed on a listening socket.  The controller backs off and
    /// retries.
    #[error("failed to accept connection: {source}")]
    AcceptFailure {
        #[source]
        source: Arc<std::io::Error>,
    },

    /// The remote address is not admitted by the allow policy.
    #[error("unauthorized connection from {remote}")]
    UnauthorizedConnection { remote: SocketAddr },

    /// A read, write or socket-option call failed mid-session.
    #[error("connection I/O error with {peer}: {source}")]
    ConnectionIo {
        peer: SocketAddr,
        #[source]
        source: Arc<std::io::Error>,
    },

    /// `start()` was called outside of a Tokio runtime.
    #[error("cannot start server: {0}")]
    Runtime(String),

    /// Normal shutdown outcome.  Never sent on the error channel.
    #[error("operation cancelled")]
    Cancelled,
}

impl ServerError {
    pub(crate) fn bind(addr: SocketAddr, source: std::io::Error) -> Self {
        Self::BindFailure {
            addr,
            source: Arc::new(source),
        }
    }

    pub(crate) fn accept(source: std::io::Error) -> Self {
        Self::AcceptFailure {
            source: Arc::new(source),
        }
    }

    pub(crate) fn io(peer: SocketAddr, source: std::io::Error) -> Self {
        Self::ConnectionIo {
            peer,
            source: Arc::new(source),
        }
    }

    /// `true` for the shutdown outcome, which is not a user-visible error.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
