//! Infrastructure layer: sockets, tasks and the OS.

pub mod address;
pub mod context;
pub mod controller;
pub mod handler;
pub mod keepalive;

pub use controller::ListenerController;
pub use handler::{pump, SessionEnd};
