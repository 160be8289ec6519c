//! Domain layer: plain types with no I/O.
//!
//! - `options` – the immutable per-server configuration.
//! - `allow_policy` – which remote addresses may connect.
//! - `error` – the error taxonomy reported on the error channel.
//! - `state` – the listener controller's state machine states.

pub mod allow_policy;
pub mod error;
pub mod options;
pub mod state;

pub use allow_policy::AllowPolicy;
pub use error::ServerError;
pub use options::ServerOptions;
pub use state::ListenerState;
