//! Listener controller: the single task that owns the listen socket.
//!
//! # State machine
//!
//! ```text
//!            under limit, bind ok
//!   Idle ─────────────────────────▶ Listening
//!    ▲                                 │
//!    └──────── count ≥ limit ──────────┘
//!
//!   any state ── cancel ──▶ Draining ── handlers gone / timeout ──▶ Stopped
//! ```
//!
//! Each loop iteration:
//!
//! - at or above the limit: close the socket if open, then sleep one tick or
//!   until a handler frees a slot;
//! - below the limit with no socket: bind and listen on the pinned endpoint
//!   (bind failures are reported, followed by a backoff);
//! - listening: race `accept()` against one tick.  An accepted stream is
//!   counted and handed to its own handler task before the next iteration.
//!
//! Cancellation is observed at every await point.  The socket is dropped on
//! every exit path, including when this task itself is aborted.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tracing::{debug, warn};

use crate::domain::{ListenerState, ServerError};
use crate::infrastructure::context::ServerContext;
use crate::infrastructure::handler::handle_connection;

/// Pending-connection queue length passed to `listen(2)`.
const LISTEN_BACKLOG: u32 = 128;

/// Owns the listen socket and drives admission control.
pub struct ListenerController {
    ctx: Arc<ServerContext>,
    listener: Option<TcpListener>,
    /// Endpoint to bind.  After the first bind the OS-chosen port is written
    /// back here so `:0` keeps the same port across re-binds.
    endpoint: SocketAddr,
}

impl ListenerController {
    pub fn new(ctx: Arc<ServerContext>) -> Self {
        let endpoint = ctx.options.local_endpoint;
        Self {
            ctx,
            listener: None,
            endpoint,
        }
    }

    /// Runs until cancellation, drains handlers, then publishes `Stopped`.
    pub async fn run(mut self) {
        debug!(endpoint = %self.endpoint, "listener controller started");

        self.poll_loop().await;

        self.ctx.events.info("Shutting down listener");
        self.close_listener();
        self.drain().await;

        self.ctx.set_state(ListenerState::Stopped);
        self.ctx.events.info("Listener stopped");
    }

    async fn poll_loop(&mut self) {
        let ctx = Arc::clone(&self.ctx);
        let limit = ctx.options.max_connections;

        loop {
            if ctx.cancel.is_cancelled() {
                return;
            }

            let active = ctx.counter.active();
            if active >= limit {
                if self.listener.is_some() {
                    self.close_listener();
                    ctx.events.info(format!(
                        "Connection limit reached ({active}/{}); listener closed",
                        ctx.limit_label()
                    ));
                }
                if !self.wait_for_slot().await {
                    return;
                }
                continue;
            }

            if self.listener.is_none() {
                if let Err(e) = self.open_listener() {
                    ctx.events.error(e);
                    if !self.backoff().await {
                        return;
                    }
                    continue;
                }
            }

            let Some(listener) = self.listener.as_ref() else {
                continue;
            };

            let accepted = tokio::select! {
                biased;
                _ = ctx.cancel.cancelled() => return,
                result = listener.accept() => Some(result),
                _ = tokio::time::sleep(ctx.options.poll_interval) => None,
            };

            match accepted {
                None => {}
                Some(Ok((stream, peer))) => self.dispatch(stream, peer),
                Some(Err(e)) => {
                    ctx.events.error(ServerError::accept(e));
                    if !self.backoff().await {
                        return;
                    }
                }
            }
        }
    }

    /// Binds and listens on the pinned endpoint, then publishes `Listening`.
    fn open_listener(&mut self) -> Result<SocketAddr, ServerError> {
        let endpoint = self.endpoint;
        let bind_err = |e| ServerError::bind(endpoint, e);

        let socket = match endpoint {
            SocketAddr::V4(_) => TcpSocket::new_v4(),
            SocketAddr::V6(_) => TcpSocket::new_v6(),
        }
        .map_err(bind_err)?;

        // Re-binds happen while earlier connections on the same port may still
        // be in TIME_WAIT.  Windows treats SO_REUSEADDR as port stealing.
        #[cfg(not(windows))]
        socket.set_reuseaddr(true).map_err(bind_err)?;

        socket.bind(endpoint).map_err(bind_err)?;
        let listener = socket.listen(LISTEN_BACKLOG).map_err(bind_err)?;
        let local = listener.local_addr().map_err(bind_err)?;

        self.endpoint = local;
        self.listener = Some(listener);
        self.ctx.set_local_addr(local);
        self.ctx.set_state(ListenerState::Listening);
        self.ctx.events.info(format!("Listening on {local}"));
        Ok(local)
    }

    /// Drops the listen socket, if any, and publishes `Idle`.
    fn close_listener(&mut self) {
        if self.listener.take().is_some() {
            debug!(endpoint = %self.endpoint, "listen socket closed");
        }
        if self.ctx.current_state() == ListenerState::Listening {
            self.ctx.set_state(ListenerState::Idle);
        }
    }

    /// Counts the connection and moves it onto its own handler task.
    fn dispatch(&self, stream: TcpStream, peer: SocketAddr) {
        self.ctx.events.info("Accepting new client connection");
        let guard = self.ctx.counter.acquire();
        debug!(%peer, "connection accepted");
        self.ctx.events.info(format!(
            "Connected clients: {}, limit: {}",
            guard.active_at_acquire(),
            self.ctx.limit_label()
        ));
        tokio::spawn(handle_connection(stream, guard, Arc::clone(&self.ctx)));
    }

    /// Parks at the ceiling for one tick or until a handler exits.
    /// Returns `false` when cancelled.
    async fn wait_for_slot(&self) -> bool {
        tokio::select! {
            biased;
            _ = self.ctx.cancel.cancelled() => false,
            _ = self.ctx.counter.slot_freed() => true,
            _ = tokio::time::sleep(self.ctx.options.poll_interval) => true,
        }
    }

    /// Pause after a bind or accept failure.  Returns `false` when cancelled.
    async fn backoff(&self) -> bool {
        self.sleep_or_cancel(self.ctx.options.accept_error_backoff)
            .await
    }

    async fn sleep_or_cancel(&self, duration: Duration) -> bool {
        tokio::select! {
            biased;
            _ = self.ctx.cancel.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }

    /// Publishes `Draining` and waits for every handler to exit, bounded by
    /// the drain timeout.
    async fn drain(&self) {
        self.ctx.set_state(ListenerState::Draining);

        let counter = &self.ctx.counter;
        let all_closed = async {
            while counter.active() > 0 {
                counter.slot_freed().await;
            }
        };

        if tokio::time::timeout(self.ctx.options.drain_timeout, all_closed)
            .await
            .is_err()
        {
            warn!(
                remaining = counter.active(),
                "drain timed out with connections still open"
            );
            self.ctx.events.info(format!(
                "Drain timed out with {} connection(s) still open",
                counter.active()
            ));
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
