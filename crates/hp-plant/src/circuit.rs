//! Weather-compensated heating circuit.
//!
//! Each cycle splits in two: `logic` resolves the run mode and the
//! outdoor-off condition, `run` turns the damped outdoor temperature
//! into a water temperature target through the bilinear curve, applies
//! rate-of-rise limiting and interference absorption, and drives the
//! circuit's valve and pump.

use crate::context::CycleContext;
use crate::error::{PlantError, PlantResult};
use crate::pump::Pump;
use crate::valve::Valve;
use hp_controls::{BilinearLaw, RorhLimiter};
use hp_core::{kelvin, PumpId, RunMode, SensorId, Temp, TempDelta, ValveId};
use hp_hal::Inputs;

/// Kelvin added to the water target per percent of consumer shift.
const SHIFT_PER_PERCENT: f64 = 0.25;

#[derive(Clone, Copy, Debug)]
pub struct AmbientSetpoints {
    pub comfort: Temp,
    pub eco: Temp,
    pub frostfree: Temp,
}

/// Per-mode outdoor temperatures above which the circuit shuts down.
/// `None` disables the cutoff for that mode.
#[derive(Clone, Copy, Debug, Default)]
pub struct OuthoffSettings {
    pub comfort: Option<Temp>,
    pub eco: Option<Temp>,
    pub frostfree: Option<Temp>,
    pub hysteresis: TempDelta,
}

#[derive(Clone, Debug)]
pub struct CircuitParams {
    pub runmode: RunMode,
    pub ambient: AmbientSetpoints,
    /// Offset applied to the ambient setpoint to form the request.
    pub t_offset: TempDelta,
    pub outhoff: OuthoffSettings,
    pub limit_wtmin: Temp,
    pub limit_wtmax: Temp,
    /// Offset added to the water target to form the heat request
    /// (covers losses between producer and circuit).
    pub temp_inoffset: TempDelta,
    /// Maximum water temperature rate of rise; `None` disables.
    pub wtemp_rorh: Option<TempDelta>,
    pub water_sensor: SensorId,
    pub valve: Option<ValveId>,
    pub pump: Option<PumpId>,
}

pub struct HCircuit {
    name: String,
    params: CircuitParams,
    law: BilinearLaw,

    online: bool,
    actual_runmode: RunMode,
    outhoff: bool,
    target_ambient: Temp,
    target_wtemp: Option<Temp>,
    heat_request: Option<Temp>,
    ramp: Option<RorhLimiter>,
}

impl HCircuit {
    pub fn new(name: impl Into<String>, params: CircuitParams, law: BilinearLaw) -> Self {
        let ramp = params.wtemp_rorh.map(RorhLimiter::new);
        Self {
            name: name.into(),
            params,
            law,
            online: false,
            actual_runmode: RunMode::Off,
            outhoff: false,
            target_ambient: hp_core::celsius(20.0),
            target_wtemp: None,
            heat_request: None,
            ramp,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn heat_request(&self) -> Option<Temp> {
        self.heat_request
    }

    pub fn target_wtemp(&self) -> Option<Temp> {
        self.target_wtemp
    }

    pub fn actual_runmode(&self) -> RunMode {
        self.actual_runmode
    }

    /// Degraded-but-safe configuration for unrecoverable mode errors.
    pub fn force_frostfree(&mut self) {
        self.params.runmode = RunMode::FrostFree;
    }

    pub fn online(&mut self) -> PlantResult<()> {
        if self.params.limit_wtmin >= self.params.limit_wtmax {
            return Err(PlantError::Misconfigured {
                what: "circuit: water temp limits inverted",
            });
        }
        self.outhoff = false;
        self.target_wtemp = None;
        self.heat_request = None;
        if let Some(ramp) = &mut self.ramp {
            ramp.reset();
        }
        self.online = true;
        Ok(())
    }

    /// Resolve the run mode and the outdoor-off condition for this cycle.
    pub fn logic(&mut self, ctx: &CycleContext) -> PlantResult<()> {
        if !self.online {
            return Err(PlantError::Offline);
        }

        let mode = match self.params.runmode.resolve(ctx.runmode) {
            // DHW-only shuts space heating down.
            RunMode::DhwOnly => RunMode::Off,
            mode => mode,
        };

        let (setpoint, cutoff) = match mode {
            RunMode::Comfort => (self.params.ambient.comfort, self.params.outhoff.comfort),
            RunMode::Eco => (self.params.ambient.eco, self.params.outhoff.eco),
            RunMode::FrostFree => (self.params.ambient.frostfree, self.params.outhoff.frostfree),
            _ => {
                self.actual_runmode = mode;
                self.outhoff = false;
                return Ok(());
            }
        };
        self.target_ambient = setpoint + self.params.t_offset;

        // Outdoor cutoff: engage when ANY damped outdoor temp exceeds
        // the trip point, release only when ALL have fallen a
        // hysteresis below it. The trip point never exceeds the ambient
        // request (no point heating to outdoor levels).
        match cutoff {
            Some(setting) => {
                let trip = setting.min(self.target_ambient);
                let release = trip - self.params.outhoff.hysteresis;
                let temps = [ctx.outdoor.t_60, ctx.outdoor.t_mix, ctx.outdoor.t_att];
                if temps.iter().any(|t| *t > trip) {
                    self.outhoff = true;
                } else if temps.iter().all(|t| *t < release) {
                    self.outhoff = false;
                }
            }
            None => self.outhoff = false,
        }

        // Cutoff suspends the circuit for the cycle without touching
        // the configured mode.
        self.actual_runmode = if self.outhoff { RunMode::Off } else { mode };
        Ok(())
    }

    pub fn run(
        &mut self,
        ctx: &CycleContext,
        inputs: &Inputs,
        valves: &mut [Valve],
        pumps: &mut [Pump],
    ) -> PlantResult<()> {
        if !self.online {
            return Err(PlantError::Offline);
        }

        match self.actual_runmode {
            RunMode::Off => return self.run_off(ctx, inputs, valves, pumps),
            RunMode::Manual | RunMode::Test => {
                // Operator drive: valve untouched by laws, pump on.
                if let Some(valve) = self.valve_mut(valves) {
                    valve.req_stop();
                }
                if let Some(pump) = self.pump_mut(pumps) {
                    pump.set_state(true, true)?;
                }
                return Ok(());
            }
            RunMode::Comfort | RunMode::Eco | RunMode::FrostFree => {}
            RunMode::Auto | RunMode::DhwOnly => return Err(PlantError::InvalidMode),
        }

        let curr_temp = match inputs.temperature(self.params.water_sensor) {
            Ok(t) => t,
            Err(e) => {
                self.failsafe(valves, pumps)?;
                return Err(e.into());
            }
        };

        let mut water_temp = self.law.water_temp(ctx.outdoor.t_mix, self.target_ambient);
        if let Some(ramp) = &mut self.ramp {
            water_temp = ramp.limit(ctx.now, water_temp, curr_temp);
        }
        if water_temp < self.params.limit_wtmin {
            water_temp = self.params.limit_wtmin;
        }
        let mut saved_temp = water_temp;

        // Interference: while a producer winds down the circuit absorbs
        // its residual heat; a consumer shift biases the target.
        let mut interference = false;
        if !ctx.consumer_sdelay.is_zero() {
            if let Some(prev) = self.target_wtemp {
                water_temp = water_temp.max(prev);
                interference = true;
            }
        }
        if ctx.consumer_shift != 0 {
            water_temp += kelvin(SHIFT_PER_PERCENT * f64::from(ctx.consumer_shift));
            interference = true;
        }

        // The high limit is never overridable.
        water_temp = water_temp.min(self.params.limit_wtmax);
        saved_temp = saved_temp.min(self.params.limit_wtmax);

        self.heat_request = Some(saved_temp + self.params.temp_inoffset);
        if !interference {
            self.target_wtemp = Some(water_temp);
        }

        if let Some(valve) = self.valve_mut(valves) {
            match valve.control(ctx.now, inputs, water_temp) {
                Ok(()) | Err(PlantError::Deadzone) => {}
                Err(e) => return Err(e),
            }
        }
        if let Some(pump) = self.pump_mut(pumps) {
            pump.set_state(true, false)?;
        }
        Ok(())
    }

    /// Off handling: while a producer stop-delay runs and a previous
    /// target exists, keep absorbing residual heat; otherwise shut down.
    fn run_off(
        &mut self,
        ctx: &CycleContext,
        inputs: &Inputs,
        valves: &mut [Valve],
        pumps: &mut [Pump],
    ) -> PlantResult<()> {
        let cooldown = self.target_wtemp.is_some() && !ctx.consumer_sdelay.is_zero();
        if cooldown {
            let target = self.target_wtemp.ok_or(PlantError::InvalidMode)?;
            if let Some(valve) = self.valve_mut(valves) {
                match valve.control(ctx.now, inputs, target) {
                    Ok(()) | Err(PlantError::Deadzone) => {}
                    Err(e) => return Err(e),
                }
            }
            if let Some(pump) = self.pump_mut(pumps) {
                pump.set_state(true, false)?;
            }
            return Ok(());
        }

        self.heat_request = None;
        self.target_wtemp = None;
        if let Some(ramp) = &mut self.ramp {
            ramp.reset();
        }
        if let Some(valve) = self.valve_mut(valves) {
            valve.req_close_full();
        }
        if let Some(pump) = self.pump_mut(pumps) {
            pump.set_state(false, false)?;
        }
        Ok(())
    }

    /// Water sensor lost: close the valve, run the pump, let the error
    /// propagate.
    fn failsafe(&mut self, valves: &mut [Valve], pumps: &mut [Pump]) -> PlantResult<()> {
        tracing::warn!(circuit = %self.name, "water sensor lost, failsafe");
        if let Some(valve) = self.valve_mut(valves) {
            valve.req_close_full();
        }
        if let Some(pump) = self.pump_mut(pumps) {
            pump.set_state(true, true)?;
        }
        Ok(())
    }

    pub fn offline(&mut self, valves: &mut [Valve], pumps: &mut [Pump]) -> PlantResult<()> {
        if let Some(valve) = self.valve_mut(valves) {
            valve.req_close_full();
        }
        if let Some(pump) = self.pump_mut(pumps) {
            let _ = pump.set_state(false, true);
        }
        self.online = false;
        self.outhoff = false;
        self.target_wtemp = None;
        self.heat_request = None;
        if let Some(ramp) = &mut self.ramp {
            ramp.reset();
        }
        Ok(())
    }

    fn valve_mut<'a>(&self, valves: &'a mut [Valve]) -> Option<&'a mut Valve> {
        self.params
            .valve
            .and_then(|id| valves.get_mut(id.index() as usize))
    }

    fn pump_mut<'a>(&self, pumps: &'a mut [Pump]) -> Option<&'a mut Pump> {
        self.params
            .pump
            .and_then(|id| pumps.get_mut(id.index() as usize))
    }
}
