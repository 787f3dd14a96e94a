pub mod command;
pub mod config;
pub mod dps;
pub mod error;
pub mod identity;
pub mod safety;
pub mod thermostat;
pub mod types;

pub use command::{BridgeCommand, TEMP_COMMAND};
pub use config::{BridgeConfig, DeviceConfig, TimingConfig, DEFAULT_HTTP_PORT};
pub use dps::DPS_POWER;
pub use error::{CommandError, ConfigError, ConnectionError};
pub use identity::accessory_uuid;
pub use safety::SafetyDecision;
pub use thermostat::PowerCommand;
pub use types::{
    Active, CommandResponse, DeviceRecord, DeviceStatus, HeatingCoolingMode,
    TemperatureDisplayUnits,
};
