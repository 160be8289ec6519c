//! # cascadia-connector
//!
//! Adapts [`cascadia_net::TcpServer`] to a host that manages "transaction
//! source" connectors: the host creates instances from a
//! [`ConnectorDefinition`], configures them through a property bag, and
//! receives raw bytes through a [`TransactionDataReceiver`].
//!
//! Each instance runs one server on `0.0.0.0:<LocalPort>` that admits a single
//! client at a time from any address.  A process-wide [`PortRegistry`] lets
//! instances refuse a port another instance already owns.

pub mod definition;
pub mod error;
pub mod instance;
pub mod properties;
pub mod receiver;
pub mod registry;

pub use definition::ConnectorDefinition;
pub use error::{ConnectorError, PropertyError};
pub use instance::{ConnectorInstance, ValidationResult};
pub use properties::{ConnectorProperty, InstanceProperties, PropertyDefinition};
pub use receiver::TransactionDataReceiver;
pub use registry::PortRegistry;
