//! One configured listener owned by the host.
//!
//! Lifecycle as driven by the host:
//!
//! ```text
//! new() ─▶ init(receiver, props) ─▶ [validate_properties ─▶ update_properties]* ─▶ close()
//! ```
//!
//! Every `update_properties` replaces the running server with a fresh one on
//! the (possibly new) port.  Received bytes go straight to the host's
//! [`TransactionDataReceiver`]; server errors and narration go to `tracing`
//! tagged with the instance id.

use std::net::SocketAddr;
use std::sync::Arc;

use cascadia_net::{ListenerState, TcpServer};
use tokio::runtime::Handle;
use tracing::{error, info};
use uuid::Uuid;

use crate::error::ConnectorError;
use crate::properties::{ConnectorProperty, InstanceProperties, LOCAL_PORT};
use crate::receiver::TransactionDataReceiver;
use crate::registry::PortRegistry;

/// Outcome of [`ConnectorInstance::validate_properties`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    Valid,
    Invalid { key: String, message: String },
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    fn invalid(key: &str, message: String) -> Self {
        Self::Invalid {
            key: key.to_string(),
            message,
        }
    }
}

pub struct ConnectorInstance {
    id: Uuid,
    registry: Arc<PortRegistry>,
    receiver: Option<Arc<dyn TransactionDataReceiver>>,
    properties: Option<InstanceProperties>,
    server: Option<TcpServer>,
}

impl ConnectorInstance {
    /// A fresh instance registered against the process-wide port registry.
    pub fn new() -> Self {
        Self::with_registry(PortRegistry::global())
    }

    pub fn with_registry(registry: Arc<PortRegistry>) -> Self {
        Self {
            id: Uuid::new_v4(),
            registry,
            receiver: None,
            properties: None,
            server: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn properties(&self) -> Option<InstanceProperties> {
        self.properties
    }

    /// State of the current server, `None` before the first start or after
    /// `close()`.
    pub fn server_state(&self) -> Option<ListenerState> {
        self.server.as_ref().map(TcpServer::state)
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.as_ref().and_then(TcpServer::local_addr)
    }

    /// Stores the host's receiver and applies the initial properties.
    pub fn init(
        &mut self,
        receiver: Arc<dyn TransactionDataReceiver>,
        properties: &[ConnectorProperty],
    ) -> Result<(), ConnectorError> {
        info!(instance = %self.id, "initializing connector instance");
        self.receiver = Some(receiver);
        self.update_properties(properties)
    }

    /// Parses `properties`, records the port and restarts the server with
    /// them.
    pub fn update_properties(&mut self, properties: &[ConnectorProperty]) -> Result<(), ConnectorError> {
        let parsed = InstanceProperties::parse(properties)?;
        let receiver = self
            .receiver
            .clone()
            .ok_or(ConnectorError::NotInitialized)?;
        let runtime = Handle::try_current().map_err(|e| ConnectorError::Runtime(e.to_string()))?;

        self.properties = Some(parsed);
        self.registry.register(self.id, parsed.local_port);
        self.restart_server(parsed, receiver, &runtime);
        Ok(())
    }

    /// Checks a candidate property bag without applying it.
    pub fn validate_properties(&self, properties: &[ConnectorProperty]) -> ValidationResult {
        let port = properties.iter().find_map(|p| match p {
            ConnectorProperty::Integer { key, value } if key == LOCAL_PORT => Some(*value),
            _ => None,
        });

        let Some(port) = port else {
            return ValidationResult::invalid(LOCAL_PORT, format!("Property not found: {LOCAL_PORT}"));
        };

        // Range errors surface from `update_properties`; only conflicts are
        // checked here.
        let Ok(port) = u16::try_from(port) else {
            return ValidationResult::Valid;
        };

        match self.registry.conflict_for(self.id, port) {
            Some(other) => {
                error!(instance = %self.id, %other, port, "port already in use by another instance");
                ValidationResult::invalid(LOCAL_PORT, format!("Port {port} is already in use"))
            }
            None => ValidationResult::Valid,
        }
    }

    /// Unregisters the port and stops the server.
    pub fn close(&mut self) {
        info!(instance = %self.id, "closing connector instance");

        if self.registry.unregister(self.id).is_none() {
            let port = self
                .properties
                .map_or_else(|| "unknown".to_string(), |p| p.local_port.to_string());
            error!(
                instance = %self.id,
                "failed to unregister instance; port {port} may not be available until restart"
            );
        }

        if let Some(server) = self.server.take() {
            server.dispose();
        }
    }

    fn restart_server(
        &mut self,
        properties: InstanceProperties,
        receiver: Arc<dyn TransactionDataReceiver>,
        runtime: &Handle,
    ) {
        if let Some(previous) = self.server.take() {
            info!(instance = %self.id, "stopping previous listener");
            previous.dispose();
        }

        info!(
            instance = %self.id,
            port = properties.local_port,
            "starting transaction listener"
        );
        let server = TcpServer::new(properties.server_options());
        self.forward_events(&server, receiver, runtime);
        server.start();
        self.server = Some(server);
    }

    /// Pipes the server's channels to the receiver and to `tracing`.  The
    /// tasks end when the server is disposed.
    fn forward_events(
        &self,
        server: &TcpServer,
        receiver: Arc<dyn TransactionDataReceiver>,
        runtime: &Handle,
    ) {
        let mut bytes = server.subscribe_bytes();
        runtime.spawn(async move {
            while let Some(chunk) = bytes.recv().await {
                receiver.write_raw_data(&chunk);
            }
        });

        let id = self.id;
        let mut errors = server.subscribe_errors();
        let mut messages = server.subscribe_info();
        runtime.spawn(async move {
            loop {
                tokio::select! {
                    Some(err) = errors.recv() => error!(instance = %id, "{err}"),
                    Some(message) = messages.recv() => info!(instance = %id, "{message}"),
                    else => break,
                }
            }
        });
    }
}

impl Default for ConnectorInstance {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ConnectorInstance {
    fn drop(&mut self) {
        self.registry.unregister(self.id);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::properties::{ECHO, ENABLE_KEEP_ALIVES};
    use crate::receiver::MockTransactionDataReceiver;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::sync::mpsc;

    fn free_port() -> u16 {
        let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        probe.local_addr().unwrap().port()
    }

    fn bag(port: u16, echo: bool) -> Vec<ConnectorProperty> {
        vec![
            ConnectorProperty::integer(LOCAL_PORT, i64::from(port)),
            ConnectorProperty::boolean(ECHO, echo),
            ConnectorProperty::boolean(ENABLE_KEEP_ALIVES, true),
        ]
    }

    /// A mock receiver that forwards every chunk to a channel.
    fn channel_receiver() -> (Arc<dyn TransactionDataReceiver>, mpsc::UnboundedReceiver<Vec<u8>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut mock = MockTransactionDataReceiver::new();
        mock.expect_write_raw_data().returning(move |data| {
            let _ = tx.send(data.to_vec());
        });
        (Arc::new(mock), rx)
    }

    async fn connect_with_retry(port: u16) -> TcpStream {
        let addr = SocketAddr::from(([127, 0, 0, 1], port));
        for _ in 0..100 {
            if let Ok(stream) = TcpStream::connect(addr).await {
                return stream;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("server on port {port} never accepted");
    }

    #[tokio::test]
    async fn test_init_forwards_bytes_to_receiver_and_echoes() {
        // Arrange
        let registry = Arc::new(PortRegistry::new());
        let mut instance = ConnectorInstance::with_registry(Arc::clone(&registry));
        let (receiver, mut chunks) = channel_receiver();
        let port = free_port();

        // Act
        instance.init(receiver, &bag(port, true)).unwrap();
        let mut client = connect_with_retry(port).await;
        client.write_all(b"TXN-0001").await.unwrap();
        let mut echoed = [0u8; 8];
        client.read_exact(&mut echoed).await.unwrap();

        // Assert
        let chunk = tokio::time::timeout(Duration::from_secs(2), chunks.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(chunk, b"TXN-0001".to_vec());
        assert_eq!(&echoed, b"TXN-0001");
        assert_eq!(registry.port_of(instance.id()), Some(port));

        instance.close();
    }

    #[tokio::test]
    async fn test_update_before_init_is_rejected() {
        let mut instance = ConnectorInstance::with_registry(Arc::new(PortRegistry::new()));

        let err = instance.update_properties(&bag(free_port(), false)).unwrap_err();

        assert!(matches!(err, ConnectorError::NotInitialized));
        assert!(instance.server_state().is_none());
    }

    #[tokio::test]
    async fn test_update_moves_listener_but_keeps_registration() {
        // Arrange
        let registry = Arc::new(PortRegistry::new());
        let mut instance = ConnectorInstance::with_registry(Arc::clone(&registry));
        let (receiver, _chunks) = channel_receiver();
        let first = free_port();
        instance.init(receiver, &bag(first, false)).unwrap();
        drop(connect_with_retry(first).await);

        // Act
        let second = free_port();
        instance.update_properties(&bag(second, false)).unwrap();

        // Assert
        let _client = connect_with_retry(second).await;
        assert_eq!(registry.port_of(instance.id()), Some(second));
        assert_eq!(registry.len(), 1);

        instance.close();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_validate_detects_port_used_by_other_instance() {
        // Arrange
        let registry = Arc::new(PortRegistry::new());
        let owner = ConnectorInstance::with_registry(Arc::clone(&registry));
        let candidate = ConnectorInstance::with_registry(Arc::clone(&registry));
        registry.register(owner.id(), 6500);

        // Act
        let same = candidate.validate_properties(&bag(6500, false));
        let other = candidate.validate_properties(&bag(6501, false));
        let own = owner.validate_properties(&bag(6500, false));

        // Assert
        assert_eq!(
            same,
            ValidationResult::Invalid {
                key: LOCAL_PORT.to_string(),
                message: "Port 6500 is already in use".to_string(),
            }
        );
        assert!(other.is_valid());
        assert!(own.is_valid());
    }

    #[test]
    fn test_validate_requires_local_port() {
        let instance = ConnectorInstance::with_registry(Arc::new(PortRegistry::new()));

        let result = instance.validate_properties(&[ConnectorProperty::boolean(ECHO, true)]);

        assert_eq!(
            result,
            ValidationResult::Invalid {
                key: LOCAL_PORT.to_string(),
                message: "Property not found: LocalPort".to_string(),
            }
        );
    }

    #[test]
    fn test_close_without_registration_still_completes() {
        let registry = Arc::new(PortRegistry::new());
        let mut instance = ConnectorInstance::with_registry(Arc::clone(&registry));

        instance.close();

        assert!(registry.is_empty());
        assert!(instance.server_state().is_none());
    }

    #[test]
    fn test_drop_releases_registration() {
        let registry = Arc::new(PortRegistry::new());
        let instance = ConnectorInstance::with_registry(Arc::clone(&registry));
        registry.register(instance.id(), 6600);

        drop(instance);

        assert!(registry.is_empty());
    }

    #[test]
    fn test_update_outside_runtime_reports_runtime_error() {
        let registry = Arc::new(PortRegistry::new());
        let mut instance = ConnectorInstance::with_registry(Arc::clone(&registry));
        let receiver: Arc<dyn TransactionDataReceiver> = Arc::new(MockTransactionDataReceiver::new());

        let err = instance.init(receiver, &bag(6700, false)).unwrap_err();

        assert!(matches!(err, ConnectorError::Runtime(_)));
        assert!(registry.is_empty());
    }
}
