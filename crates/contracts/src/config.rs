//! CollectorConfig - Config Loader output
//!
//! Describes where the resource API lives and how to reach the transport.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::ContractError;

/// Port used when the broker address does not name one
pub const DEFAULT_MQTT_PORT: u16 = 1883;

/// Complete process configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CollectorConfig {
    /// Hypermedia resource API settings
    #[validate(nested)]
    pub resource_api: ResourceApiConfig,

    /// Pub/sub transport settings
    #[validate(nested)]
    pub transport: TransportConfig,
}

/// Resource API configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ResourceApiConfig {
    /// Root resource URL
    #[validate(url)]
    pub url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    #[validate(range(min = 1))]
    pub timeout_secs: u64,

    /// Relation names used to walk the resource graph
    #[serde(default)]
    #[validate(nested)]
    pub relations: RelationNames,
}

fn default_timeout_secs() -> u64 {
    30
}

/// Relation names used to traverse root -> devices -> sensors -> history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct RelationNames {
    #[validate(length(min = 1))]
    pub devices: String,

    #[validate(length(min = 1))]
    pub sensors: String,

    #[validate(length(min = 1))]
    pub data_history: String,
}

impl Default for RelationNames {
    fn default() -> Self {
        Self {
            devices: "ch:devices".to_string(),
            sensors: "ch:sensors".to_string(),
            data_history: "ch:dataHistory".to_string(),
        }
    }
}

/// MQTT transport configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TransportConfig {
    /// Broker address: `mqtt://host:port`, `tcp://host:port` or `host:port`
    #[validate(length(min = 1))]
    pub broker_url: String,

    /// MQTT client identifier
    #[serde(default = "default_client_id")]
    #[validate(length(min = 1))]
    pub client_id: String,

    /// Topic filter matching all device telemetry topics
    #[serde(default = "default_topic")]
    #[validate(length(min = 1))]
    pub topic: String,

    /// Keep-alive interval in seconds
    #[serde(default = "default_keep_alive_secs")]
    #[validate(range(min = 5))]
    pub keep_alive_secs: u64,

    /// Subscription QoS level (0, 1 or 2)
    #[serde(default = "default_qos")]
    #[validate(range(max = 2))]
    pub qos: u8,

    /// Capacity of the client request channel
    #[serde(default = "default_event_capacity")]
    #[validate(range(min = 1))]
    pub event_capacity: usize,
}

impl TransportConfig {
    /// Split the broker URL into host and port
    ///
    /// Accepts `mqtt://host:port`, `tcp://host:port`, `host:port` and `host`.
    pub fn broker_address(&self) -> Result<(String, u16), ContractError> {
        let url = self.broker_url.trim();
        let url = url.strip_prefix("mqtt://").unwrap_or(url);
        let url = url.strip_prefix("tcp://").unwrap_or(url);
        let url = url.trim_end_matches('/');

        let parts: Vec<&str> = url.split(':').collect();
        match parts.as_slice() {
            [host] if !host.is_empty() => Ok((host.to_string(), DEFAULT_MQTT_PORT)),
            [host, port] if !host.is_empty() => {
                let port = port.parse::<u16>().map_err(|_| {
                    ContractError::config_validation(
                        "transport.broker_url",
                        format!("invalid port in broker URL: {port}"),
                    )
                })?;
                Ok((host.to_string(), port))
            }
            _ => Err(ContractError::config_validation(
                "transport.broker_url",
                format!("invalid broker URL format: {}", self.broker_url),
            )),
        }
    }
}

fn default_client_id() -> String {
    "telemetry-bridge".to_string()
}

fn default_topic() -> String {
    "device/#".to_string()
}

fn default_keep_alive_secs() -> u64 {
    30
}

fn default_qos() -> u8 {
    1
}

fn default_event_capacity() -> usize {
    100
}
