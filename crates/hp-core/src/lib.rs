//! hp-core: stable foundation for the heating plant controller.
//!
//! Contains:
//! - units (temperature newtypes + constructors)
//! - timing (monotonic controller time base)
//! - numeric (discrete filters shared by the control laws and models)
//! - mode (run modes shared by every plant entity)
//! - ids (stable compact IDs for plant entities)

pub mod ids;
pub mod mode;
pub mod numeric;
pub mod timing;
pub mod units;

// Re-exports: nice ergonomics for downstream crates
pub use ids::*;
pub use mode::RunMode;
pub use numeric::*;
pub use timing::*;
pub use units::*;
