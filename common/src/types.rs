use serde::{Deserialize, Serialize};

use crate::config::DeviceConfig;

/// Hub `Active` characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Active {
    Inactive,
    Active,
}

impl Active {
    pub fn from_on(on: bool) -> Self {
        if on {
            Self::Active
        } else {
            Self::Inactive
        }
    }
}

/// Heating/cooling state as the hub encodes it. Only `Off` and `Heat` are
/// ever reported; `Cool` and `Auto` can arrive as target requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HeatingCoolingMode {
    Off,
    Heat,
    Cool,
    Auto,
}

impl HeatingCoolingMode {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Off),
            1 => Some(Self::Heat),
            2 => Some(Self::Cool),
            3 => Some(Self::Auto),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::Heat => "HEAT",
            Self::Cool => "COOL",
            Self::Auto => "AUTO",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TemperatureDisplayUnits {
    Celsius,
    Fahrenheit,
}

impl TemperatureDisplayUnits {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Celsius),
            1 => Some(Self::Fahrenheit),
            _ => None,
        }
    }
}

/// Cached logical state of one physical heater.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub id: String,
    pub name: String,
    pub state: bool,
    #[serde(rename = "currentTemp")]
    pub current_temp: f32,
    #[serde(rename = "targetTemp")]
    pub target_temp: f32,
    /// Epoch milliseconds at which the current heating episode was first observed.
    #[serde(rename = "heatingSince")]
    pub heating_since_ms: Option<u64>,
    #[serde(rename = "disableAfterSeconds")]
    pub disable_after_seconds: Option<u64>,
}

impl DeviceRecord {
    pub fn new(config: &DeviceConfig, default_target_temp: f32) -> Self {
        Self {
            id: config.id.clone(),
            name: config.name.clone(),
            state: false,
            current_temp: 0.0,
            target_temp: default_target_temp,
            heating_since_ms: None,
            disable_after_seconds: config.disable_after_seconds,
        }
    }
}

/// Body returned by the command bridge for every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub error: bool,
    pub message: String,
}

impl CommandResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            error: false,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error: true,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DeviceStatus {
    pub id: String,
    pub name: String,
    pub manufacturer: String,
    pub model: String,
    #[serde(rename = "serialNumber")]
    pub serial_number: String,
    #[serde(rename = "accessoryUuid")]
    pub accessory_uuid: String,
    pub connected: bool,
    pub on: bool,
    pub warming: bool,
    pub active: Active,
    #[serde(rename = "currentHeatingCoolingState")]
    pub current_heating_cooling_state: HeatingCoolingMode,
    #[serde(rename = "targetHeatingCoolingState")]
    pub target_heating_cooling_state: HeatingCoolingMode,
    #[serde(rename = "currentTemp")]
    pub current_temp: f32,
    #[serde(rename = "targetTemp")]
    pub target_temp: f32,
    #[serde(rename = "heatingSince")]
    pub heating_since_ms: Option<u64>,
    #[serde(rename = "heatingForSecs")]
    pub heating_for_secs: u64,
    #[serde(rename = "disableAfterSeconds")]
    pub disable_after_seconds: Option<u64>,
    pub units: TemperatureDisplayUnits,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn new_record_starts_off_with_default_target() {
        let config = DeviceConfig {
            name: "Bathroom".to_string(),
            id: "bfd909".to_string(),
            key: "k".to_string(),
            disable_after_seconds: Some(60),
        };

        let record = DeviceRecord::new(&config, 10.0);

        assert!(!record.state);
        assert_eq!(record.current_temp, 0.0);
        assert_eq!(record.target_temp, 10.0);
        assert_eq!(record.heating_since_ms, None);
        assert_eq!(record.disable_after_seconds, Some(60));
    }

    #[test]
    fn response_serializes_with_plain_field_names() {
        let body = serde_json::to_value(CommandResponse::failed("Malformed uri")).unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "error": true, "message": "Malformed uri" })
        );
    }

    #[test]
    fn heating_cooling_mode_reads_hub_values() {
        let modes: Vec<_> = (0..4).filter_map(HeatingCoolingMode::from_u8).collect();
        assert_eq!(
            modes,
            vec![
                HeatingCoolingMode::Off,
                HeatingCoolingMode::Heat,
                HeatingCoolingMode::Cool,
                HeatingCoolingMode::Auto,
            ]
        );
        assert_eq!(HeatingCoolingMode::from_u8(7), None);
    }

    #[test]
    fn display_units_read_hub_values() {
        assert_eq!(
            TemperatureDisplayUnits::from_u8(0),
            Some(TemperatureDisplayUnits::Celsius)
        );
        assert_eq!(
            TemperatureDisplayUnits::from_u8(1),
            Some(TemperatureDisplayUnits::Fahrenheit)
        );
        assert_eq!(TemperatureDisplayUnits::from_u8(2), None);
    }
}
