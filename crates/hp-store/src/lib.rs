//! hp-store: on-disk persistence for controller state.
//!
//! State that must survive a restart (relay wear counters, DHW charge
//! state) is saved as versioned JSON blobs. A blob whose version does
//! not match what the code expects is discarded, not migrated: the
//! controller starts fresh rather than run on misread state.

pub mod error;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use store::StateStore;
