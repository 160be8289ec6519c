//! Runtime state shared by the controller task and every handler task.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::application::{ConnectionCounter, EventHub};
use crate::domain::{AllowPolicy, ListenerState, ServerOptions};

/// Everything a server's tasks share.  Lives as long as the server.
pub struct ServerContext {
    pub options: ServerOptions,
    pub policy: AllowPolicy,
    pub events: EventHub,
    pub counter: ConnectionCounter,
    /// One-shot, terminal stop signal.
    pub cancel: CancellationToken,
    /// Published controller state.  Written only by the controller.
    pub state: watch::Sender<ListenerState>,
    /// Address of the listen socket after the first successful bind.
    pub local_addr: Mutex<Option<SocketAddr>>,
}

impl ServerContext {
    pub fn new(options: ServerOptions) -> Arc<Self> {
        let (state, _) = watch::channel(ListenerState::Idle);
        Arc::new(Self {
            policy: options.allow_policy(),
            options,
            events: EventHub::new(),
            counter: ConnectionCounter::new(),
            cancel: CancellationToken::new(),
            state,
            local_addr: Mutex::new(None),
        })
    }

    pub fn set_state(&self, next: ListenerState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            tracing::debug!(from = %previous, to = %next, "listener state changed");
        }
    }

    pub fn current_state(&self) -> ListenerState {
        *self.state.borrow()
    }

    pub fn set_local_addr(&self, addr: SocketAddr) {
        *self
            .local_addr
            .lock()
            .unwrap_or_else(|poison| poison.into_inner()) = Some(addr);
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self
            .local_addr
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }

    /// Human-readable connection ceiling for log lines.
    pub fn limit_label(&self) -> String {
        match self.options.max_connections {
            usize::MAX => "unlimited".to_string(),
            n => n.to_string(),
        }
    }
}
