//! Application layer: state shared between the controller and its handlers.
//!
//! - **`events`** – fan-out of the three notification channels (bytes
//!   received, errors, info) to any number of subscribers.  Publishing never
//!   blocks, so a slow consumer can never stall a connection.
//!
//! - **`counter`** – the mutex-guarded active-connection count used for
//!   admission control, plus the drop guard that decrements it exactly once
//!   per handler.

pub mod counter;
pub mod events;

pub use counter::{ConnectionCounter, ConnectionGuard};
pub use events::EventHub;
