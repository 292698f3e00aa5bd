//! Runtime glue between the configuration, the hardware backend and
//! the plant model: the control loop, the outdoor building model, the
//! weekly scheduler and state persistence.

pub mod builder;
pub mod controller;
pub mod error;
pub mod outdoor;
pub mod scheduler;
pub mod signals;

pub use builder::{build_plant, BuiltPlant};
pub use controller::Controller;
pub use error::{RuntimeError, RuntimeResult};
pub use outdoor::OutdoorModel;
pub use scheduler::{ScheduleChange, Scheduler};
pub use signals::{RuntimeSnapshot, SignalBlock};
