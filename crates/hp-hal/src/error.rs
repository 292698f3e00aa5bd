//! Error types for hardware access.

use hp_core::{RelayId, SensorId};
use thiserror::Error;

/// Result type for hardware operations.
pub type HwResult<T> = Result<T, HwError>;

/// Errors that can occur when talking to sensors and relays.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HwError {
    /// Sensor reads as a short circuit.
    #[error("sensor {0} short-circuited")]
    SensorShort(SensorId),

    /// Sensor reads as an open circuit.
    #[error("sensor {0} disconnected")]
    SensorDisconnected(SensorId),

    /// Sensor delivered a value outside its plausible range.
    #[error("sensor {0} reading invalid")]
    SensorInvalid(SensorId),

    /// Backend is not (or no longer) reachable.
    #[error("hardware backend offline")]
    Offline,

    /// No sensor is mapped to this id.
    #[error("unknown sensor id {0}")]
    UnknownSensor(SensorId),

    /// No relay is mapped to this id.
    #[error("unknown relay id {0}")]
    UnknownRelay(RelayId),

    /// Relay exists but has not been claimed by any component.
    #[error("relay {0} not configured")]
    NotConfigured(RelayId),

    /// Relay is already claimed by another component.
    #[error("relay {id} already claimed by {owner}")]
    Claimed { id: RelayId, owner: String },
}

impl HwError {
    /// True for the sensor fault variants (as opposed to wiring or
    /// lifecycle problems).
    pub fn is_sensor_fault(&self) -> bool {
        matches!(
            self,
            HwError::SensorShort(_)
                | HwError::SensorDisconnected(_)
                | HwError::SensorInvalid(_)
                | HwError::UnknownSensor(_)
        )
    }
}
