//! The host's sink for raw transaction bytes.

/// Receives every chunk of bytes a connector instance reads from its client.
///
/// Called from a Tokio task, one chunk at a time and in receive order.
/// Implementations must not block for long.
#[cfg_attr(test, mockall::automock)]
pub trait TransactionDataReceiver: Send + Sync {
    fn write_raw_data(&self, data: &[u8]);
}
