//! # cascadia-net
//!
//! A single-listener TCP server that accepts a bounded number of client
//! connections, filters them by remote address, hands every received chunk of
//! bytes to the owning application, and optionally echoes the bytes back.
//!
//! # Architecture
//!
//! ```text
//! TcpServer (server.rs)          start() / stop() / dispose(), event subscriptions
//!   ├── domain/                  ServerOptions, AllowPolicy, ServerError, ListenerState
//!   ├── application/             EventHub (bytes / error / info), ConnectionCounter
//!   └── infrastructure/
//!         ├── controller         poll loop: Idle ⇄ Listening → Draining → Stopped
//!         ├── handler            per-connection task: allow check, keep-alive, read/echo loop
//!         ├── keepalive          socket2 keep-alive + receive-buffer sizing
//!         └── address            textual bind address → IpAddr
//! ```
//!
//! # Why poll instead of a plain `accept()` loop?
//!
//! The connection ceiling is re-evaluated on every tick, and once it is reached
//! the listen socket is actually closed so the OS refuses further clients.
//! A task parked forever in `accept()` could never notice that it should stop
//! listening, so the controller races `accept()` against a short tick instead.
//!
//! # Example
//!
//! ```no_run
//! use cascadia_net::{ServerOptions, TcpServer};
//!
//! # async fn example() {
//! let options = ServerOptions {
//!     local_endpoint: "0.0.0.0:5123".parse().unwrap(),
//!     echo: true,
//!     max_connections: 1,
//!     ..ServerOptions::default()
//! };
//! let server = TcpServer::new(options);
//! let mut bytes = server.subscribe_bytes();
//! server.start();
//!
//! while let Some(chunk) = bytes.recv().await {
//!     println!("{}", String::from_utf8_lossy(&chunk));
//! }
//! # }
//! ```

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod server;

pub use domain::allow_policy::AllowPolicy;
pub use domain::error::ServerError;
pub use domain::options::ServerOptions;
pub use domain::state::ListenerState;
pub use infrastructure::address::resolve_bind_address;
pub use server::TcpServer;
