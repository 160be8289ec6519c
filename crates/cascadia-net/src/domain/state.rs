//! Listener controller states.
//!
//! ```text
//!            count < limit             count >= limit
//!   Idle ───────────────────► Listening ─────────────► Idle
//!     │                          │
//!     └──────── cancel ──────────┴──► Draining ──► Stopped
//! ```

use std::fmt;

/// State of the listen socket as seen by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerState {
    /// Socket not bound.  Initial state and the state at the connection ceiling.
    Idle,
    /// Socket bound and accepting.
    Listening,
    /// Cancellation observed; socket released, waiting for handlers to finish.
    Draining,
    /// Terminal.  A stopped server cannot be restarted.
    Stopped,
}

impl ListenerState {
    /// `true` once the controller has left its poll loop.
    pub fn is_shutting_down(self) -> bool {
        matches!(self, Self::Draining | Self::Stopped)
    }
}

impl fmt::Display for ListenerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Listening => "listening",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}
