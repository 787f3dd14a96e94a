use tracing::{info, warn};

use heater_common::{
    command::{self, parse_temperature},
    BridgeCommand, CommandError, CommandResponse,
};

use crate::registry::DeviceRegistry;

#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Passthrough,
    NotFound { device_id: String },
    /// The value segment was missing or not a number; nothing was applied.
    InvalidValue { device_id: String, raw: String },
    Applied { device_id: String, temperature: f32 },
}

impl CommandOutcome {
    pub fn into_response(self) -> CommandResponse {
        match self {
            Self::Passthrough => CommandResponse::ok("OK"),
            Self::NotFound { device_id } => {
                CommandResponse::ok(format!("Device id: {device_id} not found"))
            }
            Self::InvalidValue { device_id, raw } => CommandResponse::ok(format!(
                "Ignored reading for accessory {device_id}: invalid temperature value {raw:?}"
            )),
            Self::Applied {
                device_id,
                temperature,
            } => CommandResponse::ok(format!(
                "Updated accessory {device_id} current temperature to: {temperature}"
            )),
        }
    }
}

/// Routes one raw command path to the matching device.
pub async fn dispatch(registry: &DeviceRegistry, uri: &str) -> Result<CommandOutcome, CommandError> {
    let BridgeCommand::CurrentTemp {
        device_id,
        raw_value,
    } = command::parse(uri)?
    else {
        return Ok(CommandOutcome::Passthrough);
    };

    info!("URL parts: device: {device_id} temp: {raw_value:?}");

    let Some(accessory) = registry.get(device_id) else {
        info!("Device id: {device_id} not found");
        return Ok(CommandOutcome::NotFound {
            device_id: device_id.to_string(),
        });
    };

    let raw = raw_value.unwrap_or_default();
    let temperature = match parse_temperature(raw) {
        Ok(temperature) => temperature,
        Err(err) => {
            warn!("device {device_id}: {err}");
            return Ok(CommandOutcome::InvalidValue {
                device_id: device_id.to_string(),
                raw: raw.to_string(),
            });
        }
    };
    if let Err(err) = accessory.set_current_temperature(temperature).await {
        warn!("device {device_id}: reading applied but heater unreachable: {err}");
    }

    Ok(CommandOutcome::Applied {
        device_id: device_id.to_string(),
        temperature,
    })
}

/// Never fails: only a malformed path yields an `error: true` body.
pub async fn handle(registry: &DeviceRegistry, uri: &str) -> CommandResponse {
    info!("Received request: {uri}");

    match dispatch(registry, uri).await {
        Ok(outcome) => {
            let response = outcome.into_response();
            info!("{}", response.message);
            response
        }
        Err(err) => {
            warn!("rejected command {uri}: {err}");
            CommandResponse::failed(err.to_string())
        }
    }
}
