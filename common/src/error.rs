use thiserror::Error;

/// Discovery, handshake or transport failure on a device link.
///
/// Always recoverable: the next reconciliation tick retries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    #[error("device {device_id} was not found on the local network")]
    Discovery { device_id: String },
    #[error("handshake with device {device_id} failed: {reason}")]
    Handshake { device_id: String, reason: String },
    #[error("device link transport failure: {0}")]
    Transport(String),
    #[error("connection session for device {device_id} is closed")]
    SessionClosed { device_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("Malformed uri")]
    Malformed,
    #[error("Invalid temperature value: {raw:?}")]
    InvalidTemperature { raw: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("device id {0:?} is configured more than once")]
    DuplicateDevice(String),
    #[error("device {name:?} has an empty id")]
    EmptyDeviceId { name: String },
    #[error("{field} must be greater than zero")]
    InvalidInterval { field: &'static str },
}
