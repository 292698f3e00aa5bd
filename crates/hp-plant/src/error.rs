//! Error taxonomy for plant entities.
//!
//! Every failure an entity can report is one of these variants; the
//! orchestrator's handling (ignore, record, force safe mode) keys off
//! them rather than off strings.

use hp_controls::ControlError;
use hp_hal::HwError;
use thiserror::Error;

pub type PlantResult<T> = Result<T, PlantError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PlantError {
    /// Entity has no hardware assigned for the requested operation.
    #[error("not configured")]
    NotConfigured,

    /// Entity exists but has not been brought online.
    #[error("offline")]
    Offline,

    /// Entity was asked to run in a mode it cannot honor.
    #[error("invalid run mode")]
    InvalidMode,

    /// Hardware-level failure (sensor fault, unknown point, ...).
    #[error("hardware: {0}")]
    Hw(#[from] HwError),

    /// Requested valve course is below the actuator deadband.
    #[error("course within actuator deadband")]
    Deadband,

    /// Measurement within the control deadzone; nothing to do.
    #[error("measurement within control deadzone")]
    Deadzone,

    /// A safety limit tripped. No automatic recovery.
    #[error("safety lockout: {what}")]
    Safety { what: &'static str },

    /// Parameters that cannot work together.
    #[error("misconfigured: {what}")]
    Misconfigured { what: &'static str },
}

impl From<ControlError> for PlantError {
    fn from(err: ControlError) -> Self {
        match err {
            ControlError::Deadzone => PlantError::Deadzone,
            ControlError::Misconfigured { what } => PlantError::Misconfigured { what },
        }
    }
}

impl PlantError {
    /// Non-failures: the entity had nothing to do, not a problem.
    pub fn is_benign(&self) -> bool {
        matches!(self, PlantError::Deadzone | PlantError::Deadband)
    }

    /// Failures the entity has already responded to by failsafing
    /// itself; the orchestrator records them and moves on.
    pub fn is_handled(&self) -> bool {
        matches!(
            self,
            PlantError::Hw(_) | PlantError::NotConfigured | PlantError::Offline
        )
    }
}
