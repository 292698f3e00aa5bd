//! Velocity-form PI controller for mixing valves.
//!
//! The controller outputs course increments rather than absolute
//! positions, so it needs no knowledge of the valve position and cannot
//! wind up in the classical sense. Output too small for the valve's
//! deadband is accumulated and released once it breaks through.

use crate::error::{ControlError, ControlResult};
use crate::law::{LawAction, LawInputs, COURSE_FULL};
use crate::sampled::SampleGate;
use hp_core::{Temp, TempDelta, Timestamp};
use std::time::Duration;

/// Tuning inputs, identified from the plant's open-loop step response.
#[derive(Clone, Copy, Debug)]
pub struct PiParams {
    /// Controller sample interval.
    pub sample_intvl: Duration,
    /// Unit step response time of the controlled plant.
    pub tu: Duration,
    /// Dead time of the controlled plant.
    pub td: Duration,
    /// Maximum temperature swing achievable over full valve travel.
    pub ksmax: TempDelta,
    /// Tuning factor: 1 aggressive, 10 moderate, 100 conservative.
    pub tune_f: u32,
}

#[derive(Clone, Debug)]
pub struct PiVelocity {
    params: PiParams,
    /// Proportional gain referred to plant time constants.
    kp_t: f64,
    gate: SampleGate,
    prev_out: Temp,
    /// Output accumulated while below the valve deadband, in per-thousand.
    db_acc: f64,
    ctrl_reset: bool,
}

impl PiVelocity {
    pub fn new(params: PiParams) -> ControlResult<Self> {
        if params.tu.is_zero() {
            return Err(ControlError::Misconfigured {
                what: "pi: unit response time is zero",
            });
        }
        // Sampling theorem: the controller cannot sample slower than a
        // quarter of the plant response time.
        if params.sample_intvl > params.tu / 4 {
            return Err(ControlError::Misconfigured {
                what: "pi: sample interval above Tu/4",
            });
        }
        if params.ksmax <= TempDelta::ZERO {
            return Err(ControlError::Misconfigured {
                what: "pi: ksmax must be positive",
            });
        }
        if params.tune_f == 0 {
            return Err(ControlError::Misconfigured {
                what: "pi: tuning factor must be at least 1",
            });
        }

        let tu = params.tu.as_secs_f64();
        let td = params.td.as_secs_f64();
        let tc = tu.max(8.0 * td) * (params.tune_f as f64) / 10.0;
        let kp_t = tu / (td + tc);

        Ok(Self {
            params,
            kp_t,
            gate: SampleGate::new(),
            prev_out: hp_core::celsius(0.0),
            db_acc: 0.0,
            ctrl_reset: true,
        })
    }

    /// Ask for a bumpless restart on the next sample (used after the
    /// valve was driven outside the law, e.g. saturation or shutdown).
    pub fn request_reset(&mut self) {
        self.ctrl_reset = true;
    }

    pub fn control(
        &mut self,
        now: Timestamp,
        inputs: &LawInputs,
        deadband: u16,
    ) -> ControlResult<LawAction> {
        let dt = match self.gate.elapsed(now) {
            None => {
                // First evaluation: just latch the time base.
                self.gate.stamp(now);
                self.ctrl_reset = true;
                return Ok(LawAction::Hold);
            }
            Some(dt) => dt,
        };
        if dt < self.params.sample_intvl {
            return Ok(LawAction::Hold);
        }
        self.gate.stamp(now);

        // Inside the deadzone the valve is left alone and the next
        // active sample restarts cleanly.
        let half_dz = inputs.deadzone / 2.0;
        if (inputs.target - inputs.outlet).abs() <= half_dz {
            self.ctrl_reset = true;
            return Err(ControlError::Deadzone);
        }

        // Saturation: a target outside the inlet span cannot be mixed,
        // only approached from an end stop.
        if let (Some(hot), Some(cold)) = (inputs.inlet_hot, inputs.inlet_cold) {
            if inputs.target <= cold {
                self.ctrl_reset = true;
                return Ok(LawAction::Course(-COURSE_FULL));
            }
            if inputs.target >= hot {
                self.ctrl_reset = true;
                return Ok(LawAction::Course(COURSE_FULL));
            }
        }

        if self.ctrl_reset {
            self.prev_out = inputs.outlet;
            self.db_acc = 0.0;
            self.ctrl_reset = false;
            return Ok(LawAction::Hold);
        }

        // Process gain in Kelvin per per-thousand of travel. Measured
        // inlet span when instrumented, bounded by the configured max.
        let span = match (inputs.inlet_hot, inputs.inlet_cold) {
            (Some(hot), Some(cold)) => {
                let span = hot - cold;
                if span <= TempDelta::ZERO || span > self.params.ksmax {
                    self.params.ksmax
                } else {
                    span
                }
            }
            _ => self.params.ksmax,
        };
        let k = span.as_kelvin() / 1000.0;
        let kp = self.kp_t / k;
        let ki = kp / self.params.tu.as_secs_f64();

        let error = (inputs.target - inputs.outlet).as_kelvin();
        let iterm = ki * error * dt.as_secs_f64();
        let pterm = kp * (self.prev_out - inputs.outlet).as_kelvin();

        let pthfl = iterm + pterm + self.db_acc;
        let perth = pthfl.trunc() as i32;

        if perth.unsigned_abs() < u32::from(deadband) {
            // Too small to move the valve: bank the integral action,
            // keep the proportional reference where it was.
            self.db_acc += iterm;
            return Ok(LawAction::Hold);
        }

        self.prev_out = inputs.outlet;
        self.db_acc = 0.0;
        Ok(LawAction::Course(perth))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hp_core::{celsius, kelvin};

    fn params() -> PiParams {
        PiParams {
            sample_intvl: Duration::from_secs(100),
            tu: Duration::from_secs(400),
            td: Duration::from_secs(10),
            ksmax: kelvin(40.0),
            tune_f: 10,
        }
    }

    fn inputs(target: f64, outlet: f64) -> LawInputs {
        LawInputs {
            target: celsius(target),
            outlet: celsius(outlet),
            inlet_hot: Some(celsius(70.0)),
            inlet_cold: Some(celsius(30.0)),
            deadzone: TempDelta::ZERO,
        }
    }

    #[test]
    fn rejects_undersampled_config() {
        let mut p = params();
        p.sample_intvl = Duration::from_secs(101);
        assert!(matches!(
            PiVelocity::new(p),
            Err(ControlError::Misconfigured { .. })
        ));
    }

    #[test]
    fn skips_one_sample_after_reset() {
        let mut pi = PiVelocity::new(params()).unwrap();
        let m = inputs(50.0, 45.0);

        // First call latches time, second absorbs the reset, third acts.
        assert_eq!(
            pi.control(Timestamp::from_secs(0), &m, 0).unwrap(),
            LawAction::Hold
        );
        assert_eq!(
            pi.control(Timestamp::from_secs(100), &m, 0).unwrap(),
            LawAction::Hold
        );
        match pi.control(Timestamp::from_secs(200), &m, 0).unwrap() {
            LawAction::Course(perth) => assert!(perth > 0),
            other => panic!("expected a course, got {other:?}"),
        }
    }

    #[test]
    fn deadzone_reported_and_restarts_clean() {
        let mut pi = PiVelocity::new(params()).unwrap();
        let mut m = inputs(50.0, 45.0);
        m.deadzone = kelvin(2.0);

        pi.control(Timestamp::from_secs(0), &m, 0).unwrap();
        pi.control(Timestamp::from_secs(100), &m, 0).unwrap();

        // Converged into the deadzone.
        let settled = LawInputs {
            outlet: celsius(50.5),
            ..m
        };
        assert_eq!(
            pi.control(Timestamp::from_secs(200), &settled, 0),
            Err(ControlError::Deadzone)
        );
        // Leaving the deadzone costs one reset sample before action.
        assert_eq!(
            pi.control(Timestamp::from_secs(300), &m, 0).unwrap(),
            LawAction::Hold
        );
        match pi.control(Timestamp::from_secs(400), &m, 0).unwrap() {
            LawAction::Course(perth) => assert!(perth > 0),
            other => panic!("expected a course, got {other:?}"),
        }
    }

    #[test]
    fn saturation_drives_to_end_stop() {
        let mut pi = PiVelocity::new(params()).unwrap();
        pi.control(Timestamp::from_secs(0), &inputs(50.0, 45.0), 0)
            .unwrap();
        assert_eq!(
            pi.control(Timestamp::from_secs(100), &inputs(80.0, 45.0), 0)
                .unwrap(),
            LawAction::Course(COURSE_FULL)
        );
        assert_eq!(
            pi.control(Timestamp::from_secs(200), &inputs(20.0, 45.0), 0)
                .unwrap(),
            LawAction::Course(-COURSE_FULL)
        );
    }

    #[test]
    fn sub_deadband_output_accumulates_until_breakthrough() {
        let mut pi = PiVelocity::new(params()).unwrap();
        let m = inputs(45.05, 45.0);
        let deadband = 10;

        pi.control(Timestamp::from_secs(0), &m, deadband).unwrap();
        pi.control(Timestamp::from_secs(100), &m, deadband).unwrap();

        // A 0.05 K error yields well under 1‰ per sample; the integral
        // action must bank up until it clears the deadband.
        let mut emitted = None;
        for i in 2..200 {
            let t = Timestamp::from_secs(100 * i);
            match pi.control(t, &m, deadband).unwrap() {
                LawAction::Hold => continue,
                LawAction::Course(perth) => {
                    emitted = Some(perth);
                    break;
                }
                LawAction::Stop => panic!("pi never stops"),
            }
        }
        let perth = emitted.expect("accumulated output never broke through");
        assert!(perth >= deadband as i32);
    }

    #[test]
    fn between_samples_holds() {
        let mut pi = PiVelocity::new(params()).unwrap();
        let m = inputs(50.0, 45.0);
        pi.control(Timestamp::from_secs(0), &m, 0).unwrap();
        assert_eq!(
            pi.control(Timestamp::from_secs(50), &m, 0).unwrap(),
            LawAction::Hold
        );
    }
}
