//! Valve control laws and their shared action type.
//!
//! A law turns measured temperatures into a course request for a mixing
//! valve. Courses are signed per-thousand of full travel; positive
//! opens (more hot water), negative closes.

use crate::error::{ControlError, ControlResult};
use crate::pi::PiVelocity;
use crate::sampled::SampleGate;
use hp_core::{Temp, TempDelta, Timestamp};
use std::time::Duration;

/// Course request saturating the position integrator: guaranteed to
/// reach the end stop from any position.
pub const COURSE_FULL: i32 = 1200;

/// Output of one law evaluation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LawAction {
    /// Leave the current motion untouched (between samples).
    Hold,
    /// Actively stop the valve.
    Stop,
    /// Travel by this signed per-thousand amount.
    Course(i32),
}

/// Measurements a law evaluation works from.
#[derive(Clone, Copy, Debug)]
pub struct LawInputs {
    /// Requested mixed-water temperature.
    pub target: Temp,
    /// Measured temperature downstream of the valve.
    pub outlet: Temp,
    /// Hot inlet temperature, when instrumented.
    pub inlet_hot: Option<Temp>,
    /// Cold inlet temperature, when instrumented.
    pub inlet_cold: Option<Temp>,
    /// Temperature band around the target within which the valve is
    /// left alone.
    pub deadzone: TempDelta,
}

/// All-or-nothing law: outside the deadzone the valve is driven to the
/// corresponding end stop.
#[derive(Clone, Debug, Default)]
pub struct BangBang;

impl BangBang {
    pub fn control(&self, inputs: &LawInputs) -> ControlResult<LawAction> {
        let half = inputs.deadzone / 2.0;
        let error = inputs.target - inputs.outlet;
        if error.abs() <= half {
            return Ok(LawAction::Stop);
        }
        if error > TempDelta::ZERO {
            Ok(LawAction::Course(COURSE_FULL))
        } else {
            Ok(LawAction::Course(-COURSE_FULL))
        }
    }
}

/// Successive approximation: at most one fixed-size correction per
/// sample interval, in the direction of the error.
#[derive(Clone, Debug)]
pub struct SApprox {
    sample_intvl: Duration,
    amount: i32,
    gate: SampleGate,
}

impl SApprox {
    /// `amount` is the per-sample correction in per-thousand of travel.
    pub fn new(sample_intvl: Duration, amount: i32) -> ControlResult<Self> {
        if !(1..=100).contains(&amount) {
            return Err(ControlError::Misconfigured {
                what: "sapprox amount out of 1..=100‰",
            });
        }
        if sample_intvl.is_zero() {
            return Err(ControlError::Misconfigured {
                what: "sapprox sample interval is zero",
            });
        }
        Ok(Self {
            sample_intvl,
            amount,
            gate: SampleGate::new(),
        })
    }

    pub fn control(&mut self, now: Timestamp, inputs: &LawInputs) -> ControlResult<LawAction> {
        if !self.gate.ready(now, self.sample_intvl) {
            return Ok(LawAction::Hold);
        }
        self.gate.stamp(now);

        let half = inputs.deadzone / 2.0;
        if inputs.outlet < inputs.target - half {
            Ok(LawAction::Course(self.amount))
        } else if inputs.outlet > inputs.target + half {
            Ok(LawAction::Course(-self.amount))
        } else {
            Ok(LawAction::Stop)
        }
    }

    pub fn reset(&mut self, now: Timestamp) {
        self.gate.stamp(now);
    }
}

/// The closed set of valve control laws.
#[derive(Clone, Debug)]
pub enum ValveAlgo {
    BangBang(BangBang),
    SApprox(SApprox),
    Pi(PiVelocity),
}

impl ValveAlgo {
    /// Evaluate the law at `now`. `deadband` is the valve's minimum
    /// actionable course in per-thousand; only the PI law uses it (to
    /// accumulate sub-deadband output instead of losing it).
    pub fn control(
        &mut self,
        now: Timestamp,
        inputs: &LawInputs,
        deadband: u16,
    ) -> ControlResult<LawAction> {
        match self {
            ValveAlgo::BangBang(law) => law.control(inputs),
            ValveAlgo::SApprox(law) => law.control(now, inputs),
            ValveAlgo::Pi(law) => law.control(now, inputs, deadband),
        }
    }

    /// Whether the law wants both inlet temperatures instrumented.
    pub fn wants_inlets(&self) -> bool {
        matches!(self, ValveAlgo::Pi(_))
    }
}
