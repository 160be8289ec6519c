//! Process-wide record of which instance listens on which port.
//!
//! The host may run several connector instances in one process.  Before it
//! applies new properties it asks [`crate::ConnectorInstance::validate_properties`]
//! whether the requested port is free; the answer comes from this registry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use once_cell::sync::OnceCell;
use uuid::Uuid;

static GLOBAL_REGISTRY: OnceCell<Arc<PortRegistry>> = OnceCell::new();

/// Instance id → port.
#[derive(Debug, Default)]
pub struct PortRegistry {
    ports: Mutex<HashMap<Uuid, u16>>,
}

impl PortRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry shared by every instance created with
    /// [`crate::ConnectorInstance::new`].
    pub fn global() -> Arc<PortRegistry> {
        Arc::clone(GLOBAL_REGISTRY.get_or_init(|| Arc::new(PortRegistry::new())))
    }

    /// Records `port` for `instance`, replacing any earlier port.
    pub fn register(&self, instance: Uuid, port: u16) {
        self.lock().insert(instance, port);
    }

    /// Forgets `instance`.  Returns its port, or `None` if it was not
    /// registered.
    pub fn unregister(&self, instance: Uuid) -> Option<u16> {
        self.lock().remove(&instance)
    }

    /// Another instance already registered on `port`, if any.
    pub fn conflict_for(&self, instance: Uuid, port: u16) -> Option<Uuid> {
        self.lock()
            .iter()
            .find(|(id, p)| **id != instance && **p == port)
            .map(|(id, _)| *id)
    }

    pub fn port_of(&self, instance: Uuid) -> Option<u16> {
        self.lock().get(&instance).copied()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, u16>> {
        self.ports.lock().unwrap_or_else(|poison| poison.into_inner())
    }
}
