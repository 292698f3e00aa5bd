//! Three-way mixing valve.
//!
//! The valve has no position feedback: position is dead-reckoned by
//! integrating motor run time against the configured full-travel time,
//! trusted only after an end stop has been reached. Control laws
//! request signed courses; `run` turns them into relay states with
//! break-before-make switching of the two motor directions.

use crate::error::{PlantError, PlantResult};
use hp_controls::{LawAction, LawInputs, ValveAlgo, COURSE_FULL};
use hp_core::{RelayId, SensorId, Temp, TempDelta, Timestamp};
use hp_hal::{Inputs, RelayBank};
use std::time::Duration;

/// Direction the motor is (or should be) driven.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Motion {
    Stop,
    Open,
    Close,
}

#[derive(Clone, Copy, Debug)]
pub struct ValveSensors {
    /// Mixed-water temperature downstream of the valve.
    pub outlet: SensorId,
    pub inlet_hot: Option<SensorId>,
    pub inlet_cold: Option<SensorId>,
}

#[derive(Clone, Debug)]
pub struct ValveParams {
    pub rid_open: RelayId,
    pub rid_close: RelayId,
    /// Time for full travel from one end stop to the other.
    pub ete_time: Duration,
    /// Minimum actionable course in per-thousand of travel.
    pub deadband: u16,
    /// Temperature band around the target within which the valve is
    /// left alone.
    pub deadzone: TempDelta,
    pub sensors: ValveSensors,
}

pub struct Valve {
    name: String,
    params: ValveParams,
    algo: ValveAlgo,

    online: bool,
    /// Estimated position in per-thousand open.
    position: i32,
    /// Remaining course magnitude for the current request.
    target_course: i32,
    request: Motion,
    actual: Motion,
    acc_open: Duration,
    acc_close: Duration,
    /// Whether `position` has been anchored at an end stop.
    trusted: bool,
    last_run: Option<Timestamp>,
}

impl Valve {
    pub fn new(name: impl Into<String>, params: ValveParams, algo: ValveAlgo) -> PlantResult<Self> {
        if params.ete_time.is_zero() {
            return Err(PlantError::Misconfigured {
                what: "valve: full-travel time is zero",
            });
        }
        if i32::from(params.deadband) >= COURSE_FULL {
            return Err(PlantError::Misconfigured {
                what: "valve: deadband wider than full travel",
            });
        }
        Ok(Self {
            name: name.into(),
            params,
            algo,
            online: false,
            position: 0,
            target_course: 0,
            request: Motion::Stop,
            actual: Motion::Stop,
            acc_open: Duration::ZERO,
            acc_close: Duration::ZERO,
            trusted: false,
            last_run: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn position(&self) -> i32 {
        self.position
    }

    pub fn position_trusted(&self) -> bool {
        self.trusted
    }

    /// Bring the valve online. The position is unknown at this point,
    /// so a full close is requested to find the end stop.
    pub fn online(&mut self, now: Timestamp) -> PlantResult<()> {
        self.position = 0;
        self.trusted = false;
        self.acc_open = Duration::ZERO;
        self.acc_close = Duration::ZERO;
        self.last_run = Some(now);
        self.online = true;
        self.req_close_full();
        Ok(())
    }

    /// Request a signed course in per-thousand of travel.
    pub fn request_course(&mut self, perth: i32) -> PlantResult<()> {
        if !self.online {
            return Err(PlantError::Offline);
        }
        if perth.unsigned_abs() < u32::from(self.params.deadband) {
            return Err(PlantError::Deadband);
        }
        if perth > 0 {
            self.request = Motion::Open;
            self.target_course = perth;
        } else {
            self.request = Motion::Close;
            self.target_course = -perth;
        }
        Ok(())
    }

    pub fn req_stop(&mut self) {
        self.request = Motion::Stop;
        self.target_course = 0;
    }

    pub fn req_open_full(&mut self) {
        self.request = Motion::Open;
        self.target_course = COURSE_FULL;
    }

    pub fn req_close_full(&mut self) {
        self.request = Motion::Close;
        self.target_course = COURSE_FULL;
    }

    /// Evaluate the control law against the sensor snapshot and latch
    /// the resulting request. A failed outlet sensor propagates; failed
    /// inlet sensors degrade the law instead.
    pub fn control(&mut self, now: Timestamp, inputs: &Inputs, target: Temp) -> PlantResult<()> {
        if !self.online {
            return Err(PlantError::Offline);
        }
        let outlet = inputs.temperature(self.params.sensors.outlet)?;
        let inlet_hot = self
            .params
            .sensors
            .inlet_hot
            .and_then(|s| inputs.temperature(s).ok());
        let inlet_cold = self
            .params
            .sensors
            .inlet_cold
            .and_then(|s| inputs.temperature(s).ok());

        let law_inputs = LawInputs {
            target,
            outlet,
            inlet_hot,
            inlet_cold,
            deadzone: self.params.deadzone,
        };
        match self.algo.control(now, &law_inputs, self.params.deadband)? {
            LawAction::Hold => Ok(()),
            LawAction::Stop => {
                self.req_stop();
                Ok(())
            }
            LawAction::Course(perth) => self.request_course(perth),
        }
    }

    /// Integrate motion since the last run and drive the motor relays.
    pub fn run(&mut self, now: Timestamp, relays: &mut RelayBank) -> PlantResult<()> {
        if !self.online {
            return Err(PlantError::Offline);
        }
        let last = match self.last_run {
            Some(last) => last,
            None => {
                self.last_run = Some(now);
                return self.apply_motion(now, relays);
            }
        };
        let dt = now.elapsed_since(last);
        self.last_run = Some(now);

        // The valve cannot be asked to run in one direction for longer
        // than three full travels: by then it must be at the end stop,
        // whatever the estimate says.
        let max_run = self.params.ete_time * 3;
        match self.request {
            Motion::Open if self.acc_open >= max_run => {
                self.trusted = true;
                self.req_stop();
            }
            Motion::Close if self.acc_close >= max_run => {
                self.trusted = true;
                self.req_stop();
            }
            _ => {}
        }

        // Per-thousand of travel covered during dt at motor speed.
        let course =
            (dt.as_secs_f64() * 1000.0 / self.params.ete_time.as_secs_f64()).round() as i32;

        match self.actual {
            Motion::Open => {
                self.acc_close = Duration::ZERO;
                self.acc_open += dt;
                self.position += course;
                self.target_course -= course;
            }
            Motion::Close => {
                self.acc_open = Duration::ZERO;
                self.acc_close += dt;
                self.position -= course;
                self.target_course -= course;
            }
            Motion::Stop => {}
        }

        // End stops anchor the dead-reckoned position.
        let moved = self.actual != Motion::Stop && course > 0;
        if self.position >= 1000 {
            self.position = 1000;
            if moved {
                self.trusted = true;
            }
        } else if self.position <= 0 {
            self.position = 0;
            if moved {
                self.trusted = true;
            }
        }

        // Stop once the next run would overshoot by more than half its
        // course resolution; the residual is accepted error.
        if self.target_course < course / 2 {
            self.req_stop();
        }

        self.apply_motion(now, relays)
    }

    /// Break-before-make: on a direction change both relays are
    /// released before the new one is energized. Identical request and
    /// actual leave the relays untouched.
    fn apply_motion(&mut self, now: Timestamp, relays: &mut RelayBank) -> PlantResult<()> {
        if self.request == self.actual {
            return Ok(());
        }
        relays.set_state(self.params.rid_open, now, false, Duration::ZERO)?;
        relays.set_state(self.params.rid_close, now, false, Duration::ZERO)?;
        match self.request {
            Motion::Open => {
                relays.set_state(self.params.rid_open, now, true, Duration::ZERO)?;
            }
            Motion::Close => {
                relays.set_state(self.params.rid_close, now, true, Duration::ZERO)?;
            }
            Motion::Stop => {}
        }
        self.actual = self.request;
        Ok(())
    }

    pub fn offline(&mut self, now: Timestamp, relays: &mut RelayBank) -> PlantResult<()> {
        let open = relays.set_state(self.params.rid_open, now, false, Duration::ZERO);
        let close = relays.set_state(self.params.rid_close, now, false, Duration::ZERO);
        self.online = false;
        self.request = Motion::Stop;
        self.actual = Motion::Stop;
        self.target_course = 0;
        self.trusted = false;
        self.last_run = None;
        open?;
        close?;
        Ok(())
    }
}
