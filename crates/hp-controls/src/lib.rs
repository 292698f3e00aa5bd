//! hp-controls: pure control laws for the heating plant.
//!
//! Everything here is a state machine fed measured values; no hardware
//! access, no clock access. Contains:
//! - law (valve action type, bang-bang and successive approximation)
//! - pi (velocity-form PI controller with deadband accumulation)
//! - templaw (bilinear outdoor-to-water heating curve)
//! - ramp (rate-of-rise limiter for water temperature requests)
//! - sampled (sample-interval gating shared by the discrete laws)

pub mod error;
pub mod law;
pub mod pi;
pub mod ramp;
pub mod sampled;
pub mod templaw;

pub use error::{ControlError, ControlResult};
pub use law::{BangBang, LawAction, LawInputs, SApprox, ValveAlgo, COURSE_FULL};
pub use pi::{PiParams, PiVelocity};
pub use ramp::RorhLimiter;
pub use sampled::SampleGate;
pub use templaw::BilinearLaw;
