//! Static description of the connector type, as shown to the host.

use tracing::info;
use uuid::Uuid;

use crate::instance::ConnectorInstance;
use crate::properties::{self, PropertyDefinition};

/// Factory and metadata for transaction-server connector instances.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConnectorDefinition;

impl ConnectorDefinition {
    pub const ID: Uuid = Uuid::from_u128(0x6c41793e_4f7b_450c_a1ff_8ff258d5ffa3);
    pub const NAME: &'static str = "Cascadia Transaction Server";
    pub const VERSION: &'static str = "1.0";
    pub const MANUFACTURER: &'static str = "Cascadia Technology LLC";

    pub fn id(&self) -> Uuid {
        Self::ID
    }

    pub fn name(&self) -> &'static str {
        Self::NAME
    }

    pub fn display_name(&self) -> &'static str {
        Self::NAME
    }

    pub fn version(&self) -> &'static str {
        Self::VERSION
    }

    pub fn manufacturer(&self) -> &'static str {
        Self::MANUFACTURER
    }

    pub fn init(&self) {
        info!("initialized {} connector definition", Self::NAME);
    }

    pub fn create_instance(&self) -> ConnectorInstance {
        let instance = ConnectorInstance::new();
        info!(instance = %instance.id(), "creating a new {} connector instance", Self::NAME);
        instance
    }

    pub fn close(&self) {
        info!("closing {} connector definition", Self::NAME);
    }

    pub fn property_definitions(&self) -> Vec<PropertyDefinition> {
        properties::definitions()
    }
}
