//! hp-hal: hardware abstraction for the heating plant controller.
//!
//! Contains:
//! - backend (the `HwBackend` trait hardware drivers implement)
//! - mock (in-memory backend for tests and dry runs)
//! - inputs (per-cycle snapshot of sensor readings)
//! - relay (stateful relays: ownership, cooldown, wear accounting)
//!
//! Control code never talks to a backend directly: it reads from the
//! [`Inputs`] snapshot and writes through the [`RelayBank`], both of
//! which are synchronized with the backend once per cycle.

pub mod backend;
pub mod error;
pub mod inputs;
pub mod mock;
pub mod relay;

pub use backend::HwBackend;
pub use error::{HwError, HwResult};
pub use inputs::Inputs;
pub use mock::MockBackend;
pub use relay::{RelayBank, RelayCounters};
