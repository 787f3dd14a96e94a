use std::{collections::BTreeMap, sync::Arc, time::Duration};

use tokio::task::JoinHandle;
use tracing::info;

use heater_common::{BridgeConfig, ConfigError, DeviceConfig};

use crate::{accessory::ThermostatAccessory, link::DeviceLink};

/// Devices by id. Built once at startup and read-only afterwards.
pub struct DeviceRegistry {
    devices: BTreeMap<String, Arc<ThermostatAccessory>>,
    reconcile_interval: Duration,
}

impl DeviceRegistry {
    pub fn build<F>(config: &BridgeConfig, mut link_for: F) -> Result<Self, ConfigError>
    where
        F: FnMut(&DeviceConfig) -> Arc<dyn DeviceLink>,
    {
        config.validate()?;

        let mut devices = BTreeMap::new();
        for device in &config.devices {
            info!("adding accessory {} ({})", device.name, device.id);
            let accessory = ThermostatAccessory::new(device, link_for(device), &config.timing);
            devices.insert(device.id.clone(), Arc::new(accessory));
        }

        Ok(Self {
            devices,
            reconcile_interval: Duration::from_millis(config.timing.reconcile_interval_ms),
        })
    }

    pub fn get(&self, device_id: &str) -> Option<&Arc<ThermostatAccessory>> {
        self.devices.get(device_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ThermostatAccessory>> {
        self.devices.values()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Starts one independent reconciliation loop per device.
    pub fn start_all(&self) -> Vec<JoinHandle<()>> {
        self.iter()
            .map(|accessory| accessory.start(self.reconcile_interval))
            .collect()
    }

    pub fn stop_all(&self) {
        for accessory in self.iter() {
            accessory.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::simulated::SimulatedLink;

    fn config(ids: &[&str]) -> BridgeConfig {
        BridgeConfig {
            devices: ids
                .iter()
                .map(|id| DeviceConfig {
                    name: format!("Heater {id}"),
                    id: id.to_string(),
                    key: "k".to_string(),
                    disable_after_seconds: None,
                })
                .collect(),
            ..BridgeConfig::default()
        }
    }

    fn simulated(device: &DeviceConfig) -> Arc<dyn DeviceLink> {
        Arc::new(SimulatedLink::new(device.id.clone()))
    }

    #[tokio::test]
    async fn looks_up_by_exact_id() {
        let registry = DeviceRegistry::build(&config(&["abc", "def"]), simulated).unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("abc").map(|a| a.device_id()), Some("abc"));
        assert!(registry.get("ABC").is_none());
        assert!(registry.get("ab").is_none());
    }

    #[tokio::test]
    async fn rejects_duplicate_devices() {
        let result = DeviceRegistry::build(&config(&["abc", "abc"]), simulated);
        assert!(matches!(result, Err(ConfigError::DuplicateDevice(id)) if id == "abc"));
    }

    #[tokio::test]
    async fn builds_one_link_per_device() {
        let mut requested = Vec::new();
        let registry = DeviceRegistry::build(&config(&["b", "a"]), |device| {
            requested.push(device.id.clone());
            simulated(device)
        })
        .unwrap();

        assert_eq!(requested, vec!["b".to_string(), "a".to_string()]);
        let ids: Vec<&str> = registry.iter().map(|a| a.device_id()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_all_ends_every_loop() {
        let registry = DeviceRegistry::build(&config(&["a", "b"]), simulated).unwrap();
        let handles = registry.start_all();

        registry.stop_all();
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert!(handles.iter().all(JoinHandle::is_finished));
        assert!(registry.iter().all(|a| a.controller().is_stopped()));
    }
}
