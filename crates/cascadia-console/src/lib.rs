//! Library half of the console host: configuration and output formatting,
//! kept out of `main.rs` so they can be tested.

pub mod config;

pub use config::{load_config, ConfigError, ConfigOverrides, ConsoleConfig};

/// Renders a received chunk as ASCII text.  Bytes above `0x7F` become `?`.
pub fn ascii_lossy(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| if b.is_ascii() { char::from(b) } else { '?' })
        .collect()
}
