//! Error types for control law operations.

use thiserror::Error;

/// Result type for control law operations.
pub type ControlResult<T> = Result<T, ControlError>;

/// Errors that can occur when evaluating a control law.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ControlError {
    /// The measured value sits inside the law's deadzone; no correction
    /// is warranted. Callers treat this as information, not failure.
    #[error("measurement within control deadzone")]
    Deadzone,

    /// Law parameters are unusable.
    #[error("law misconfigured: {what}")]
    Misconfigured { what: &'static str },
}
