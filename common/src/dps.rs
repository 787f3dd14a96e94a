//! Data-point indices of the heater schema.

/// Boolean power switch.
pub const DPS_POWER: &str = "1";
