//! Runtime error taxonomy.

use thiserror::Error;

pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Configuration error: {0}")]
    Config(#[from] hp_config::ConfigError),

    #[error("Hardware error: {0}")]
    Hw(#[from] hp_hal::HwError),

    #[error("Plant error: {0}")]
    Plant(#[from] hp_plant::PlantError),

    #[error("State store error: {0}")]
    Store(#[from] hp_store::StoreError),

    #[error("Control law error: {0}")]
    Control(#[from] hp_controls::ControlError),

    #[error("Build error: {what}")]
    Build { what: String },
}
