//! Per-connection handler.
//!
//! One Tokio task per accepted client.  The task:
//!
//! 1. resolves the remote/local endpoints and applies the allow policy;
//!    rejected peers are closed before a single byte is read;
//! 2. configures keep-alive;
//! 3. runs [`pump`]: read into a buffer sized to `SO_RCVBUF`, publish each
//!    chunk, echo it back when enabled;
//! 4. whatever happens, drops the stream and the [`ConnectionGuard`], which
//!    decrements the shared counter exactly once.
//!
//! Every read and write races the server's cancellation token, so `stop()`
//! does not have to wait for the client to send anything.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::application::ConnectionGuard;
use crate::domain::ServerError;
use crate::infrastructure::context::ServerContext;
use crate::infrastructure::keepalive::{configure_keep_alive, receive_buffer_size};

/// Placeholder peer for errors raised before the remote address is known.
const UNKNOWN_PEER: SocketAddr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0));

/// How a session ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The peer closed its side (zero-length read).
    PeerClosed,
    /// The server's cancellation token fired.
    Cancelled,
}

/// Task entry point for one accepted connection.
///
/// Owns `guard` for its whole lifetime, so the counter is decremented when
/// this future completes or is dropped.
pub async fn handle_connection(stream: TcpStream, guard: ConnectionGuard, ctx: Arc<ServerContext>) {
    let peer = stream.peer_addr().ok();
    let label = peer.map_or_else(|| "unknown peer".to_string(), |p| p.to_string());

    match run_session(stream, &ctx).await {
        Ok(SessionEnd::PeerClosed) => {
            ctx.events
                .info("Received 0 bytes which indicates a client disconnection");
        }
        Ok(SessionEnd::Cancelled) => {
            ctx.events
                .info("Closing client connection due to cancellation");
        }
        Err(e) if e.is_cancelled() => {
            debug!(peer = %label, "session I/O failed during shutdown");
            ctx.events
                .info("Closing client connection due to cancellation");
        }
        Err(e) => ctx.events.error(e),
    }

    ctx.events.info(format!("Client {label} disconnected"));
    drop(guard);
    ctx.events.info(format!(
        "Connected clients: {}, limit: {}",
        ctx.counter.active(),
        ctx.limit_label()
    ));
}

/// Runs the session; the stream is closed when this returns.
async fn run_session(stream: TcpStream, ctx: &ServerContext) -> Result<SessionEnd, ServerError> {
    let remote = stream
        .peer_addr()
        .map_err(|e| ServerError::io(UNKNOWN_PEER, e))?;
    let local = stream.local_addr().map_err(|e| ServerError::io(remote, e))?;

    if !ctx.policy.is_allowed(remote.ip()) {
        return Err(ServerError::UnauthorizedConnection { remote });
    }

    ctx.events
        .info(format!("Receiving connection from {remote} on {local}"));

    configure_keep_alive(&stream, ctx.options.keep_alive)
        .map_err(|e| session_error(&ctx.cancel, remote, e))?;
    debug!(peer = %remote, enabled = ctx.options.keep_alive, "keep-alive configured");

    let buffer_size = receive_buffer_size(&stream);
    pump(
        stream,
        buffer_size,
        ctx.options.echo,
        &ctx.cancel,
        |chunk| ctx.events.bytes_received(remote, chunk.to_vec()),
    )
    .await
    .map_err(|e| session_error(&ctx.cancel, remote, e))
}

/// An I/O failure after cancellation is the shutdown itself, not a fault.
fn session_error(cancel: &CancellationToken, remote: SocketAddr, e: io::Error) -> ServerError {
    if cancel.is_cancelled() {
        ServerError::Cancelled
    } else {
        ServerError::io(remote, e)
    }
}

/// Read loop shared by real sockets and test doubles.
///
/// Calls `on_bytes` once per non-empty read, in receive order.  With `echo`
/// the same bytes are fully written back before the next read.  Returns
/// [`SessionEnd::PeerClosed`] on a zero-length read and
/// [`SessionEnd::Cancelled`] as soon as `cancel` fires, even mid-read or
/// mid-write.
pub async fn pump<S, F>(
    mut stream: S,
    buffer_size: usize,
    echo: bool,
    cancel: &CancellationToken,
    mut on_bytes: F,
) -> io::Result<SessionEnd>
where
    S: AsyncRead + AsyncWrite + Unpin,
    F: FnMut(&[u8]),
{
    let mut buffer = vec![0u8; buffer_size.max(1)];

    loop {
        let read = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(SessionEnd::Cancelled),
            result = stream.read(&mut buffer) => result?,
        };

        if read == 0 {
            return Ok(SessionEnd::PeerClosed);
        }

        let chunk = &buffer[..read];
        on_bytes(chunk);

        if echo {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(SessionEnd::Cancelled),
                result = stream.write_all(chunk) => result?,
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
