//! Public facade: [`TcpServer`].
//!
//! `start()` and `stop()` are synchronous and never block.  `start()` spawns
//! the [`ListenerController`] on the ambient Tokio runtime; `stop()` fires the
//! cancellation token and returns.  Shutdown completes asynchronously; use
//! [`TcpServer::stopped`] or [`TcpServer::state_changes`] to observe it.
//!
//! A server runs at most once.  After `stop()` it cannot be restarted; build a
//! new one instead.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::domain::{ListenerState, ServerError, ServerOptions};
use crate::infrastructure::context::ServerContext;
use crate::infrastructure::ListenerController;

/// Connection-limited TCP ingest server.
pub struct TcpServer {
    ctx: Arc<ServerContext>,
    started: AtomicBool,
    stop_requested: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl TcpServer {
    /// Creates an idle server.  Nothing is bound until [`start`](Self::start).
    pub fn new(options: ServerOptions) -> Self {
        Self {
            ctx: ServerContext::new(options),
            started: AtomicBool::new(false),
            stop_requested: AtomicBool::new(false),
            task: Mutex::new(None),
        }
    }

    pub fn options(&self) -> &ServerOptions {
        &self.ctx.options
    }

    // ── Subscriptions ────────────────────────────────────────────────────────

    /// Every non-empty chunk read from any connection, in receive order per
    /// connection.
    pub fn subscribe_bytes(&self) -> mpsc::UnboundedReceiver<Vec<u8>> {
        self.ctx.events.subscribe_bytes()
    }

    pub fn subscribe_errors(&self) -> mpsc::UnboundedReceiver<ServerError> {
        self.ctx.events.subscribe_errors()
    }

    pub fn subscribe_info(&self) -> mpsc::UnboundedReceiver<String> {
        self.ctx.events.subscribe_info()
    }

    // ── Lifecycle ────────────────────────────────────────────────────────────

    /// Launches the listener controller and returns immediately.
    ///
    /// Must be called from within a Tokio runtime; otherwise a
    /// [`ServerError::Runtime`] is published and the server stays idle.
    /// Calls after the first, and calls after [`stop`](Self::stop), are
    /// ignored.
    pub fn start(&self) {
        if self.state().is_shutting_down() {
            warn!(state = %self.state(), "start() called on a server that is shutting down");
            return;
        }
        if self.started.swap(true, Ordering::SeqCst) {
            warn!("start() called on a server that was already started");
            return;
        }

        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                // Leave the server startable from inside a runtime later.
                self.started.store(false, Ordering::SeqCst);
                self.ctx.events.error(ServerError::Runtime(e.to_string()));
                return;
            }
        };

        let ctx = Arc::clone(&self.ctx);
        let supervisor = handle.spawn(async move {
            let controller = tokio::spawn(ListenerController::new(Arc::clone(&ctx)).run());
            if let Err(e) = controller.await {
                if e.is_panic() {
                    error!("listener controller panicked: {e}");
                }
                ctx.cancel.cancel();
                ctx.set_state(ListenerState::Stopped);
            }
        });

        *self
            .task
            .lock()
            .unwrap_or_else(|poison| poison.into_inner()) = Some(supervisor);
    }

    /// Requests shutdown and returns immediately.  Idempotent.
    ///
    /// Closes the listen socket, interrupts every handler's pending read or
    /// write, and lets the controller drain before reporting `Stopped`.
    pub fn stop(&self) {
        if self.stop_requested.swap(true, Ordering::SeqCst) {
            return;
        }
        self.ctx.events.info("Stop requested");
        self.ctx.cancel.cancel();

        // Never started: there is no controller to publish the final state.
        if !self.started.swap(true, Ordering::SeqCst) {
            self.ctx.set_state(ListenerState::Stopped);
        }
    }

    /// Stops the server and detaches every subscriber.  Their receivers see
    /// end-of-stream once buffered events are consumed.
    pub fn dispose(&self) {
        self.stop();
        debug!(
            subscribers = self.ctx.events.subscriber_count(),
            "detaching event subscribers"
        );
        self.ctx.events.detach_all();
    }

    // ── Observation ──────────────────────────────────────────────────────────

    pub fn state(&self) -> ListenerState {
        self.ctx.current_state()
    }

    /// A receiver that observes every state transition.
    pub fn state_changes(&self) -> watch::Receiver<ListenerState> {
        self.ctx.state.subscribe()
    }

    /// Bound address of the listen socket, once the first bind succeeded.
    /// Useful with port `0`.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.ctx.local_addr()
    }

    /// Number of connections currently counted.
    pub fn active_connections(&self) -> usize {
        self.ctx.counter.active()
    }

    /// Resolves once the server reaches [`ListenerState::Stopped`].
    pub async fn stopped(&self) {
        let mut rx = self.ctx.state.subscribe();
        let _ = rx.wait_for(|state| *state == ListenerState::Stopped).await;
    }
}

impl Drop for TcpServer {
    fn drop(&mut self) {
        self.ctx.cancel.cancel();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
