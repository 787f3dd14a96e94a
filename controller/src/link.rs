use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

use heater_common::{ConnectionError, DPS_POWER};

/// Snapshot of device data points keyed by schema index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceState {
    pub dps: HashMap<String, Value>,
}

impl DeviceState {
    pub fn power(&self) -> Option<bool> {
        self.dps.get(DPS_POWER).and_then(Value::as_bool)
    }

    pub fn with_power(on: bool) -> Self {
        let mut dps = HashMap::new();
        dps.insert(DPS_POWER.to_string(), Value::Bool(on));
        Self { dps }
    }
}

/// Asynchronous pushes from the device session.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    Data(DeviceState),
    Error(String),
}

/// Wire-level session to one physical heater.
///
/// Discovery, encryption and RPC framing live behind this trait; callers only
/// see request/response calls plus a push channel.
#[async_trait]
pub trait DeviceLink: Send + Sync {
    async fn find(&self) -> Result<(), ConnectionError>;

    async fn connect(&self) -> Result<(), ConnectionError>;

    fn is_connected(&self) -> bool;

    /// Reads device state; `schema` requests every data point.
    async fn get(&self, schema: bool) -> Result<DeviceState, ConnectionError>;

    async fn set(&self, fields: DeviceState) -> Result<(), ConnectionError>;

    fn subscribe(&self) -> broadcast::Receiver<LinkEvent>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power_reads_boolean_switch() {
        assert_eq!(DeviceState::with_power(true).power(), Some(true));
        assert_eq!(DeviceState::default().power(), None);
    }

    #[test]
    fn power_ignores_non_boolean_values() {
        let mut state = DeviceState::default();
        state.dps.insert(DPS_POWER.to_string(), Value::from(1));
        assert_eq!(state.power(), None);
    }
}
