//! Per-cycle context handed to every entity.
//!
//! The context is a snapshot taken once at the top of the cycle: shared
//! signals read mid-cycle would let two entities see different worlds.
//! Aggregates computed during a cycle (could-sleep, consumer shift,
//! stop delay) feed the NEXT cycle's context; the one-cycle lag is
//! intentional.

use hp_core::{RunMode, Temp, Timestamp};
use std::time::Duration;

/// Damped outdoor temperatures and the flags derived from them.
#[derive(Clone, Copy, Debug)]
pub struct OutdoorConditions {
    /// Outdoor temp damped over one minute (spike rejection).
    pub t_60: Temp,
    /// Mean of the 1-minute and building-tau damped temps; drives the
    /// heating curves.
    pub t_mix: Temp,
    /// Twice-damped temp; models the thermal mass of the building.
    pub t_att: Temp,
    pub summer: bool,
    pub frost: bool,
}

#[derive(Clone, Copy, Debug)]
pub struct CycleContext {
    pub now: Timestamp,
    /// Global run mode (never `Auto`).
    pub runmode: RunMode,
    /// Global DHW mode (never `Auto`).
    pub dhwmode: RunMode,
    pub outdoor: OutdoorConditions,
    /// True when no heat source had demand last cycle.
    pub could_sleep: bool,
    /// Remaining heat source stop delay from last cycle.
    pub consumer_sdelay: Duration,
    /// Consumer shift in percent from last cycle; negative sheds load.
    pub consumer_shift: i32,
}
