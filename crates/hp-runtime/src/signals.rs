//! Shared runtime state, readable from outside the control loop.

use hp_core::{RunMode, Temp};
use hp_plant::OutdoorConditions;
use std::sync::{PoisonError, RwLock};

/// Point-in-time view of the running plant.
#[derive(Clone, Debug, Default)]
pub struct RuntimeSnapshot {
    pub runmode: RunMode,
    pub dhwmode: RunMode,
    pub outdoor: Option<OutdoorConditions>,
    pub heat_request: Option<Temp>,
    pub could_sleep: bool,
    pub consumer_shift: i32,
    /// Entity names that failed during the last cycle.
    pub failures: Vec<String>,
    pub cycles: u64,
}

/// Lock-guarded snapshot the control loop publishes after every cycle.
#[derive(Default)]
pub struct SignalBlock {
    inner: RwLock<RuntimeSnapshot>,
}

impl SignalBlock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> RuntimeSnapshot {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn update(&self, f: impl FnOnce(&mut RuntimeSnapshot)) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard);
    }
}
