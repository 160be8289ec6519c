//! Host-facing property model.
//!
//! The host stores instance configuration as a flat bag of typed key/value
//! entries ([`ConnectorProperty`]).  The connector declares which keys it
//! understands through [`PropertyDefinition`]s and turns a bag into
//! [`InstanceProperties`] with [`InstanceProperties::parse`].

use std::net::{Ipv4Addr, SocketAddr};

use cascadia_net::ServerOptions;

use crate::error::PropertyError;

/// TCP port the instance listens on.
pub const LOCAL_PORT: &str = "LocalPort";
/// Write received bytes back to the sender.
pub const ECHO: &str = "Echo";
/// Enable TCP keep-alive on accepted connections.
pub const ENABLE_KEEP_ALIVES: &str = "EnableKeepAlives";

pub const DEFAULT_LOCAL_PORT: u16 = 5123;
pub const DEFAULT_ECHO: bool = false;
pub const DEFAULT_ENABLE_KEEP_ALIVES: bool = true;

const PORT_MIN: i64 = 1;
const PORT_MAX: i64 = 65_535;

// ── Property bag ──────────────────────────────────────────────────────────────

/// One entry of the host's property bag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectorProperty {
    Integer { key: String, value: i64 },
    Boolean { key: String, value: bool },
}

impl ConnectorProperty {
    pub fn integer(key: impl Into<String>, value: i64) -> Self {
        Self::Integer {
            key: key.into(),
            value,
        }
    }

    pub fn boolean(key: impl Into<String>, value: bool) -> Self {
        Self::Boolean {
            key: key.into(),
            value,
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Self::Integer { key, .. } | Self::Boolean { key, .. } => key,
        }
    }
}

// ── Definitions ───────────────────────────────────────────────────────────────

/// Declares a property the host should offer in its configuration UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyDefinition {
    Integer {
        key: &'static str,
        display_name: &'static str,
        tooltip: &'static str,
        default: i64,
        min: i64,
        max: i64,
    },
    Boolean {
        key: &'static str,
        display_name: &'static str,
        tooltip: &'static str,
        default: bool,
    },
}

impl PropertyDefinition {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Integer { key, .. } | Self::Boolean { key, .. } => key,
        }
    }
}

/// The three properties every instance understands.
pub fn definitions() -> Vec<PropertyDefinition> {
    vec![
        PropertyDefinition::Integer {
            key: LOCAL_PORT,
            display_name: "Local port",
            tooltip: "TCP port on which to listen for transaction data",
            default: i64::from(DEFAULT_LOCAL_PORT),
            min: PORT_MIN,
            max: PORT_MAX,
        },
        PropertyDefinition::Boolean {
            key: ECHO,
            display_name: "Echo",
            tooltip: "Send every received byte back to the transaction source",
            default: DEFAULT_ECHO,
        },
        PropertyDefinition::Boolean {
            key: ENABLE_KEEP_ALIVES,
            display_name: "Enable keep-alives",
            tooltip: "Detect dead transaction sources with TCP keep-alive probes",
            default: DEFAULT_ENABLE_KEEP_ALIVES,
        },
    ]
}

// ── Parsed form ───────────────────────────────────────────────────────────────

/// Typed configuration of one connector instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstanceProperties {
    pub local_port: u16,
    pub echo: bool,
    pub enable_keep_alives: bool,
}

impl Default for InstanceProperties {
    fn default() -> Self {
        Self {
            local_port: DEFAULT_LOCAL_PORT,
            echo: DEFAULT_ECHO,
            enable_keep_alives: DEFAULT_ENABLE_KEEP_ALIVES,
        }
    }
}

impl InstanceProperties {
    /// Reads the known keys from `properties`.
    ///
    /// Unknown keys are ignored and missing keys keep their defaults.  A known
    /// key with the wrong value kind, or a port outside `1..=65535`, is an
    /// error.
    pub fn parse<'a, I>(properties: I) -> Result<Self, PropertyError>
    where
        I: IntoIterator<Item = &'a ConnectorProperty>,
    {
        let mut parsed = Self::default();

        for property in properties {
            match (property.key(), property) {
                (LOCAL_PORT, ConnectorProperty::Integer { value, .. }) => {
                    parsed.local_port = port_from(*value)?;
                }
                (ECHO, ConnectorProperty::Boolean { value, .. }) => parsed.echo = *value,
                (ENABLE_KEEP_ALIVES, ConnectorProperty::Boolean { value, .. }) => {
                    parsed.enable_keep_alives = *value;
                }
                (LOCAL_PORT, _) => return Err(mismatch(LOCAL_PORT, "an integer")),
                (key @ (ECHO | ENABLE_KEEP_ALIVES), _) => return Err(mismatch(key, "a boolean")),
                _ => {}
            }
        }

        Ok(parsed)
    }

    /// Server configuration for this instance: any interface, one client at
    /// a time, loopback peers only.
    pub fn server_options(&self) -> ServerOptions {
        ServerOptions {
            local_endpoint: SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.local_port)),
            allowed_remote_addresses: Vec::new(),
            max_connections: 1,
            echo: self.echo,
            keep_alive: self.enable_keep_alives,
            ..ServerOptions::default()
        }
    }
}

fn port_from(value: i64) -> Result<u16, PropertyError> {
    u16::try_from(value)
        .ok()
        .filter(|port| *port != 0)
        .ok_or_else(|| PropertyError::OutOfRange {
            key: LOCAL_PORT.to_string(),
            value,
            min: PORT_MIN,
            max: PORT_MAX,
        })
}

fn mismatch(key: &str, expected: &'static str) -> PropertyError {
    PropertyError::TypeMismatch {
        key: key.to_string(),
        expected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reads_all_known_keys() {
        // Arrange
        let bag = vec![
            ConnectorProperty::integer(LOCAL_PORT, 6000),
            ConnectorProperty::boolean(ECHO, true),
            ConnectorProperty::boolean(ENABLE_KEEP_ALIVES, false),
        ];

        // Act
        let parsed = InstanceProperties::parse(&bag).unwrap();

        // Assert
        assert_eq!(
            parsed,
            InstanceProperties {
                local_port: 6000,
                echo: true,
                enable_keep_alives: false,
            }
        );
    }

    #[test]
    fn test_parse_ignores_unknown_keys_and_keeps_defaults() {
        let bag = vec![
            ConnectorProperty::integer("Baud", 9600),
            ConnectorProperty::boolean("Verbose", true),
        ];

        let parsed = InstanceProperties::parse(&bag).unwrap();

        assert_eq!(parsed, InstanceProperties::default());
        assert_eq!(parsed.local_port, 5123);
        assert!(parsed.enable_keep_alives);
    }

    #[test]
    fn test_parse_rejects_wrong_kind() {
        let bag = vec![ConnectorProperty::boolean(LOCAL_PORT, true)];
        assert_eq!(
            InstanceProperties::parse(&bag),
            Err(PropertyError::TypeMismatch {
                key: LOCAL_PORT.to_string(),
                expected: "an integer",
            })
        );

        let bag = vec![ConnectorProperty::integer(ECHO, 1)];
        assert!(matches!(
            InstanceProperties::parse(&bag),
            Err(PropertyError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_ports_outside_range() {
        for bad in [0, -1, 65_536, i64::MAX] {
            let bag = vec![ConnectorProperty::integer(LOCAL_PORT, bad)];
            assert!(
                matches!(
                    InstanceProperties::parse(&bag),
                    Err(PropertyError::OutOfRange { value, .. }) if value == bad
                ),
                "port {bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_later_entries_win() {
        let bag = vec![
            ConnectorProperty::integer(LOCAL_PORT, 6000),
            ConnectorProperty::integer(LOCAL_PORT, 6001),
        ];
        assert_eq!(InstanceProperties::parse(&bag).unwrap().local_port, 6001);
    }

    #[test]
    fn test_server_options_admit_one_loopback_client() {
        let props = InstanceProperties {
            local_port: 7001,
            echo: true,
            enable_keep_alives: false,
        };

        let options = props.server_options();

        assert_eq!(options.local_endpoint, "0.0.0.0:7001".parse().unwrap());
        assert_eq!(options.max_connections, 1);
        let policy = options.allow_policy();
        assert!(!policy.allows_everyone());
        assert!(policy.is_allowed("127.0.0.1".parse().unwrap()));
        assert!(!policy.is_allowed("203.0.113.9".parse().unwrap()));
        assert!(options.echo);
        assert!(!options.keep_alive);
    }

    #[test]
    fn test_definitions_match_defaults() {
        let defs = definitions();
        let keys: Vec<_> = defs.iter().map(PropertyDefinition::key).collect();
        assert_eq!(keys, vec![LOCAL_PORT, ECHO, ENABLE_KEEP_ALIVES]);
        assert!(matches!(
            defs[0],
            PropertyDefinition::Integer { default: 5123, min: 1, max: 65_535, .. }
        ));
        assert!(matches!(defs[1], PropertyDefinition::Boolean { default: false, .. }));
        assert!(matches!(defs[2], PropertyDefinition::Boolean { default: true, .. }));
    }
}
