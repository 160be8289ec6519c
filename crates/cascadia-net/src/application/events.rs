//! Notification fan-out to the owning application.
//!
//! The server emits three independent streams:
//!
//! | Stream         | Item          | When                                     |
//! |----------------|---------------|------------------------------------------|
//! | bytes received | `Vec<u8>`     | once per non-empty read, per connection  |
//! | errors         | `ServerError` | bind/accept failures, rejected peers, I/O |
//! | info           | `String`      | connects, disconnects, counts, shutdown  |
//!
//! Each subscriber gets its own unbounded `mpsc` receiver.  Publishing is a
//! non-blocking `send` to every live sender; senders whose receiver was
//! dropped are pruned on the next publish, which is how a subscriber
//! unsubscribes.  [`EventHub::detach_all`] closes every stream at once.
//!
//! Every event is mirrored to `tracing` so the server is observable even with
//! no subscribers attached.

use std::net::SocketAddr;
use std::sync::Mutex;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::domain::error::ServerError;

/// Subscriber list for a single event stream.
struct Subscribers<T> {
    senders: Mutex<Vec<mpsc::UnboundedSender<T>>>,
}

impl<T: Clone> Subscribers<T> {
    fn new() -> Self {
        Self {
            senders: Mutex::new(Vec::new()),
        }
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().push(tx);
        rx
    }

    fn publish(&self, value: T) {
        let mut senders = self.lock();
        senders.retain(|tx| !tx.is_closed());
        if let Some((last, rest)) = senders.split_last() {
            for tx in rest {
                let _ = tx.send(value.clone());
            }
            let _ = last.send(value);
        }
    }

    fn len(&self) -> usize {
        let mut senders = self.lock();
        senders.retain(|tx| !tx.is_closed());
        senders.len()
    }

    fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<mpsc::UnboundedSender<T>>> {
        self.senders.lock().unwrap_or_else(|poison| poison.into_inner())
    }
}

/// The three notification streams of one server.
pub struct EventHub {
    bytes: Subscribers<Vec<u8>>,
    errors: Subscribers<ServerError>,
    info: Subscribers<String>,
}

impl EventHub {
    pub fn new() -> Self {
        Self {
            bytes: Subscribers::new(),
            errors: Subscribers::new(),
            info: Subscribers::new(),
        }
    }

    /// Subscribes to received byte chunks.
    pub fn subscribe_bytes(&self) -> mpsc::UnboundedReceiver<Vec<u8>> {
        self.bytes.subscribe()
    }

    /// Subscribes to non-fatal operational errors.
    pub fn subscribe_errors(&self) -> mpsc::UnboundedReceiver<ServerError> {
        self.errors.subscribe()
    }

    /// Subscribes to lifecycle narration.
    pub fn subscribe_info(&self) -> mpsc::UnboundedReceiver<String> {
        self.info.subscribe()
    }

    /// Publishes one received chunk from `peer`.
    pub fn bytes_received(&self, peer: SocketAddr, data: Vec<u8>) {
        debug!(%peer, len = data.len(), "bytes received");
        self.bytes.publish(data);
    }

    /// Publishes an error.  The shutdown outcome is filtered out.
    pub fn error(&self, err: ServerError) {
        match &err {
            ServerError::Cancelled => return,
            ServerError::UnauthorizedConnection { .. } | ServerError::ConnectionIo { .. } => {
                warn!("{err}")
            }
            _ => error!("{err}"),
        }
        self.errors.publish(err);
    }

    /// Publishes an informational message.
    pub fn info(&self, message: impl Into<String>) {
        let message = message.into();
        info!("{message}");
        self.info.publish(message);
    }

    /// Number of live subscribers across all three streams.
    pub fn subscriber_count(&self) -> usize {
        self.bytes.len() + self.errors.len() + self.info.len()
    }

    /// Drops every subscriber; their receivers observe end-of-stream.
    pub fn detach_all(&self) {
        self.bytes.clear();
        self.errors.clear();
        self.info.clear();
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
