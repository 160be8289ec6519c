//! Socket options for accepted connections.
//!
//! Tokio exposes only the on/off side of `SO_KEEPALIVE`; the idle time and
//! probe interval need `socket2`.  [`SockRef`] borrows the tokio stream's
//! descriptor without taking ownership, so the stream stays usable afterwards.

use std::io;

use socket2::{SockRef, TcpKeepalive};
use tokio::net::TcpStream;

use crate::domain::options::{KEEP_ALIVE_INTERVAL, KEEP_ALIVE_TIME};

/// Receive buffer used when the OS will not report `SO_RCVBUF`.
pub const FALLBACK_RECEIVE_BUFFER: usize = 8 * 1024;

/// Upper bound on the per-connection read buffer.
pub const MAX_RECEIVE_BUFFER: usize = 1024 * 1024;

/// Enables keep-alive with the fixed 10 s idle time and 10 s probe interval,
/// or explicitly disables it.
pub fn configure_keep_alive(stream: &TcpStream, enabled: bool) -> io::Result<()> {
    let socket = SockRef::from(stream);
    if enabled {
        let params = TcpKeepalive::new()
            .with_time(KEEP_ALIVE_TIME)
            .with_interval(KEEP_ALIVE_INTERVAL);
        socket.set_tcp_keepalive(&params)
    } else {
        socket.set_keepalive(false)
    }
}

/// Size of the read buffer for `stream`: the socket's advertised receive
/// buffer, clamped to `1..=MAX_RECEIVE_BUFFER`.
pub fn receive_buffer_size(stream: &TcpStream) -> usize {
    match SockRef::from(stream).recv_buffer_size() {
        Ok(size) if size > 0 => size.min(MAX_RECEIVE_BUFFER),
        _ => FALLBACK_RECEIVE_BUFFER,
    }
}
