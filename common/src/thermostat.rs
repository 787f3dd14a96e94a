/// Power command chosen by the threshold rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerCommand {
    On,
    Off,
}

impl PowerCommand {
    pub fn is_on(self) -> bool {
        matches!(self, Self::On)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Off => "off",
        }
    }
}

/// Bang-bang threshold: heat while strictly below target.
///
/// There is no dead band, so readings hovering at the target will toggle the
/// heater on every update.
pub fn decide(current_temp: f32, target_temp: f32) -> PowerCommand {
    if current_temp < target_temp {
        PowerCommand::On
    } else {
        PowerCommand::Off
    }
}

pub fn is_warming(on: bool, current_temp: f32, target_temp: f32) -> bool {
    on && current_temp < target_temp
}
