//! Error types of the connector.

use thiserror::Error;

/// A property bag entry could not be interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PropertyError {
    /// A known key carried a value of the wrong kind.
    #[error("property {key} must be {expected}")]
    TypeMismatch { key: String, expected: &'static str },

    /// A numeric value lies outside its declared range.
    #[error("property {key} = {value} is outside {min}..={max}")]
    OutOfRange {
        key: String,
        value: i64,
        min: i64,
        max: i64,
    },
}

/// Failures of connector instance operations.
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error(transparent)]
    Property(#[from] PropertyError),

    /// `update_properties` was called before `init` supplied a receiver.
    #[error("connector instance has not been initialized")]
    NotInitialized,

    /// No Tokio runtime is available to run the listener.
    #[error("no async runtime available: {0}")]
    Runtime(String),
}
