//! Active-connection counter used for admission control.
//!
//! The controller increments the count right after `accept()` returns; each
//! handler decrements it when it finishes.  Both sides go through the same
//! `Mutex<usize>` so no update is ever lost.
//!
//! The increment hands back a [`ConnectionGuard`].  The guard is moved into the
//! handler task and its `Drop` performs the decrement, so the count goes down
//! exactly once whatever way the handler exits: end of stream, cancellation,
//! rejection, I/O error, or a panic unwinding the task.
//!
//! Every decrement also signals a [`Notify`] so a controller parked at the
//! ceiling re-evaluates immediately instead of waiting for its next tick.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;
use tracing::trace;

struct Inner {
    count: Mutex<usize>,
    slot_freed: Notify,
}

/// Shared count of live connection handlers.
#[derive(Clone)]
pub struct ConnectionCounter {
    inner: Arc<Inner>,
}

impl ConnectionCounter {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                count: Mutex::new(0),
                slot_freed: Notify::new(),
            }),
        }
    }

    /// Current number of live handlers.
    pub fn active(&self) -> usize {
        *self.lock()
    }

    /// Counts one more connection and returns the guard that will uncount it.
    pub fn acquire(&self) -> ConnectionGuard {
        let active = {
            let mut count = self.lock();
            *count += 1;
            *count
        };
        trace!(active, "connection counted");
        ConnectionGuard {
            counter: self.clone(),
            active_at_acquire: active,
        }
    }

    /// Resolves after the next decrement.  A decrement that happened while
    /// nobody was waiting is remembered, so the next call returns at once.
    pub async fn slot_freed(&self) {
        self.inner.slot_freed.notified().await;
    }

    fn release(&self) -> usize {
        let active = {
            let mut count = self.lock();
            *count = count.saturating_sub(1);
            *count
        };
        self.inner.slot_freed.notify_one();
        trace!(active, "connection uncounted");
        active
    }

    fn lock(&self) -> MutexGuard<'_, usize> {
        self.inner
            .count
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }
}

impl Default for ConnectionCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// One counted connection.  Dropping it decrements the counter.
pub struct ConnectionGuard {
    counter: ConnectionCounter,
    active_at_acquire: usize,
}

impl ConnectionGuard {
    /// The count right after this connection was added.
    pub fn active_at_acquire(&self) -> usize {
        self.active_at_acquire
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.counter.release();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_acquire_and_drop_round_trip() {
        // Arrange
        let counter = ConnectionCounter::new();
        assert_eq!(counter.active(), 0);

        // Act
        let a = counter.acquire();
        let b = counter.acquire();

        // Assert
        assert_eq!(a.active_at_acquire(), 1);
        assert_eq!(b.active_at_acquire(), 2);
        assert_eq!(counter.active(), 2);

        drop(a);
        assert_eq!(counter.active(), 1);
        drop(b);
        assert_eq!(counter.active(), 0);
    }

    #[test]
    fn test_guard_decrements_when_owner_panics() {
        let counter = ConnectionCounter::new();
        let cloned = counter.clone();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _guard = cloned.acquire();
            panic!("handler blew up");
        }));

        assert!(result.is_err());
        assert_eq!(counter.active(), 0);
    }

    #[test]
    fn test_release_never_goes_negative() {
        let counter = ConnectionCounter::new();
        assert_eq!(counter.release(), 0);
        assert_eq!(counter.active(), 0);
    }

    #[tokio::test]
    async fn test_slot_freed_remembers_earlier_release() {
        // Arrange: release before anyone waits
        let counter = ConnectionCounter::new();
        drop(counter.acquire());

        // Act / Assert: the stored permit completes the wait immediately
        tokio::time::timeout(Duration::from_millis(100), counter.slot_freed())
            .await
            .expect("slot_freed must resolve from the stored permit");
    }

    #[tokio::test]
    async fn test_concurrent_handlers_return_count_to_zero() {
        let counter = ConnectionCounter::new();
        let mut tasks = Vec::new();
        for _ in 0..64 {
            let guard = counter.acquire();
            tasks.push(tokio::spawn(async move {
                tokio::task::yield_now().await;
                drop(guard);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(counter.active(), 0);
    }
}
