use std::{sync::Arc, time::Duration};

use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info};

use heater_common::{
    accessory_uuid,
    identity::{MANUFACTURER, MODEL},
    Active, ConnectionError, DeviceConfig, DeviceRecord, DeviceStatus, HeatingCoolingMode,
    TemperatureDisplayUnits, TimingConfig,
};

use crate::{
    link::DeviceLink,
    reconcile::{self, Reconciler},
    thermostat::ThermostatController,
};

const EVENT_CAPACITY: usize = 16;

/// Notifications for the hub when a characteristic changes outside a get.
#[derive(Debug, Clone, PartialEq)]
pub enum AccessoryEvent {
    ActiveChanged { device_id: String, warming: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessoryInfo {
    pub manufacturer: &'static str,
    pub model: &'static str,
    pub serial_number: String,
    pub uuid: String,
}

/// Hub-facing thermostat service for one heater.
///
/// Every setter goes through the controller; the record only mirrors what the
/// controller holds afterwards.
pub struct ThermostatAccessory {
    info: AccessoryInfo,
    name: String,
    controller: Arc<ThermostatController>,
    record: Arc<Mutex<DeviceRecord>>,
    events: broadcast::Sender<AccessoryEvent>,
}

impl ThermostatAccessory {
    pub fn new(config: &DeviceConfig, link: Arc<dyn DeviceLink>, timing: &TimingConfig) -> Self {
        let controller = ThermostatController::spawn(config.id.clone(), link, timing);
        let record = DeviceRecord::new(config, timing.default_target_temp);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            info: AccessoryInfo {
                manufacturer: MANUFACTURER,
                model: MODEL,
                serial_number: config.id.clone(),
                uuid: accessory_uuid(&config.id),
            },
            name: config.name.clone(),
            controller,
            record: Arc::new(Mutex::new(record)),
            events,
        }
    }

    pub fn device_id(&self) -> &str {
        self.controller.device_id()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn info(&self) -> &AccessoryInfo {
        &self.info
    }

    #[cfg(test)]
    pub fn controller(&self) -> &Arc<ThermostatController> {
        &self.controller
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AccessoryEvent> {
        self.events.subscribe()
    }

    /// Starts the reconciliation loop; it runs until [`Self::stop`].
    pub fn start(&self, period: Duration) -> JoinHandle<()> {
        Reconciler::new(Arc::clone(&self.controller), Arc::clone(&self.record)).spawn(period)
    }

    pub fn active(&self) -> Active {
        Active::from_on(self.controller.is_on())
    }

    pub async fn set_active(&self, value: Active) -> Result<(), ConnectionError> {
        match value {
            Active::Active => self.controller.turn_on().await,
            Active::Inactive => self.controller.turn_off().await,
        }
    }

    pub fn current_heating_cooling_state(&self) -> HeatingCoolingMode {
        if self.controller.is_warming() {
            HeatingCoolingMode::Heat
        } else {
            HeatingCoolingMode::Off
        }
    }

    pub async fn target_heating_cooling_state(&self) -> HeatingCoolingMode {
        if self.record.lock().await.state {
            HeatingCoolingMode::Heat
        } else {
            HeatingCoolingMode::Off
        }
    }

    /// Anything but `Heat` switches the heater off. Selecting `Heat` while the
    /// room is already warmer than the target raises the target to one degree
    /// above the current reading so the heater actually runs.
    pub async fn set_target_heating_cooling_state(
        &self,
        mode: HeatingCoolingMode,
    ) -> Result<(), ConnectionError> {
        info!("device {}: target mode {}", self.device_id(), mode.as_str());

        if mode != HeatingCoolingMode::Heat {
            self.controller.turn_off().await?;
        } else {
            self.controller.turn_on().await?;

            let (current, target) = {
                let record = self.record.lock().await;
                (record.current_temp, record.target_temp)
            };
            if current != 0.0 && target < current {
                let result = self
                    .controller
                    .set_target_temp(self.controller.current_temp() + 1.0)
                    .await;
                self.record.lock().await.target_temp = self.controller.target_temp();
                result?;
            }
        }

        self.notify_active();
        Ok(())
    }

    pub async fn current_temperature(&self) -> f32 {
        self.record.lock().await.current_temp
    }

    pub async fn target_temperature(&self) -> f32 {
        self.record.lock().await.target_temp
    }

    pub async fn set_target_temperature(&self, value: f32) -> Result<(), ConnectionError> {
        let result = self.controller.set_target_temp(value).await;
        self.record.lock().await.target_temp = self.controller.target_temp();
        result.map(|_| ())
    }

    /// Applies an externally sourced reading. The reading is kept even when
    /// the resulting power command could not reach the heater.
    pub async fn set_current_temperature(&self, value: f32) -> Result<(), ConnectionError> {
        let result = self.controller.set_current_temp(value).await;
        self.record.lock().await.current_temp = self.controller.current_temp();
        self.notify_active();
        result.map(|_| ())
    }

    pub fn display_units(&self) -> TemperatureDisplayUnits {
        TemperatureDisplayUnits::Celsius
    }

    pub fn set_display_units(&self, value: TemperatureDisplayUnits) {
        debug!("set display units -> {value:?} ignored");
    }

    /// Snapshot built from the same accessors the hub reads.
    pub async fn status(&self) -> DeviceStatus {
        self.status_at(reconcile::now_ms()).await
    }

    async fn status_at(&self, now_ms: u64) -> DeviceStatus {
        let record = self.record.lock().await.clone();
        DeviceStatus {
            id: record.id.clone(),
            name: record.name.clone(),
            manufacturer: self.info.manufacturer.to_string(),
            model: self.info.model.to_string(),
            serial_number: self.info.serial_number.clone(),
            accessory_uuid: self.info.uuid.clone(),
            connected: self.controller.is_connected(),
            on: self.controller.is_on(),
            warming: self.controller.is_warming(),
            active: self.active(),
            current_heating_cooling_state: self.current_heating_cooling_state(),
            target_heating_cooling_state: self.target_heating_cooling_state().await,
            current_temp: self.current_temperature().await,
            target_temp: self.target_temperature().await,
            heating_since_ms: record.heating_since_ms,
            heating_for_secs: record.heating_for_secs(now_ms),
            disable_after_seconds: record.disable_after_seconds,
            units: self.display_units(),
        }
    }

    pub fn stop(&self) {
        self.controller.stop();
    }

    fn notify_active(&self) {
        let _ = self.events.send(AccessoryEvent::ActiveChanged {
            device_id: self.device_id().to_string(),
            warming: self.controller.is_warming(),
        });
    }
}
