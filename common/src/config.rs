use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_HTTP_PORT: u16 = 9990;

/// One configured heater. Read once at startup and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub name: String,
    pub id: String,
    pub key: String,
    #[serde(
        rename = "disableAfterSeconds",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub disable_after_seconds: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Keep-alive read of the full device schema while connected.
    pub poll_interval_ms: u64,
    pub reconcile_interval_ms: u64,
    pub default_target_temp: f32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            reconcile_interval_ms: 5_000,
            default_target_temp: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(rename = "httpPort", default = "default_http_port")]
    pub http_port: u16,
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
    #[serde(default)]
    pub timing: TimingConfig,
}

fn default_http_port() -> u16 {
    DEFAULT_HTTP_PORT
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            http_port: DEFAULT_HTTP_PORT,
            devices: Vec::new(),
            timing: TimingConfig::default(),
        }
    }
}

impl BridgeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timing.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidInterval {
                field: "poll_interval_ms",
            });
        }
        if self.timing.reconcile_interval_ms == 0 {
            return Err(ConfigError::InvalidInterval {
                field: "reconcile_interval_ms",
            });
        }

        let mut seen = HashSet::new();
        for device in &self.devices {
            if device.id.trim().is_empty() {
                return Err(ConfigError::EmptyDeviceId {
                    name: device.name.clone(),
                });
            }
            if !seen.insert(device.id.as_str()) {
                return Err(ConfigError::DuplicateDevice(device.id.clone()));
            }
        }
        Ok(())
    }
}
