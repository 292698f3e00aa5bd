//! Domestic hot water tank.
//!
//! Charging is hysteresis-driven between two tank sensors: the top one
//! (first to cool under draw) decides when to start, the bottom one
//! (last to heat through) decides when charging is complete. Heat comes
//! from the plant's producer or, when the plant could sleep, from an
//! optional electric self-heater.

use crate::context::CycleContext;
use crate::error::{PlantError, PlantResult};
use crate::pump::Pump;
use hp_core::{kelvin, PumpId, RelayId, RunMode, SensorId, Temp, TempDelta, Timestamp};
use hp_hal::{Inputs, RelayBank};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Charge flags persisted across controller restarts: a charge in
/// progress resumes, an overtime rest is honored.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DhwtChargeState {
    pub charging: bool,
    pub charge_overtime: bool,
}

#[derive(Clone, Copy, Debug)]
pub struct DhwtSetpoints {
    pub comfort: Temp,
    pub eco: Temp,
    pub frostfree: Temp,
    /// Anti-legionella target; a sanitation cycle raises the charge
    /// target to this.
    pub legionella: Option<Temp>,
}

#[derive(Clone, Debug)]
pub struct DhwtParams {
    pub runmode: RunMode,
    pub setpoints: DhwtSetpoints,
    pub hysteresis: TempDelta,
    /// Offset added to the target to form the heat request.
    pub temp_inoffset: TempDelta,
    pub limit_tmin: Temp,
    pub limit_tmax: Temp,
    /// Maximum water input temperature (scalding/material limit).
    pub limit_wintmax: Temp,
    /// Maximum continuous charge time; `None` disables the guard.
    pub charge_limit: Option<Duration>,
    pub sensor_top: Option<SensorId>,
    pub sensor_bottom: Option<SensorId>,
    /// Feed water temperature upstream of the feed pump.
    pub sensor_win: Option<SensorId>,
    pub feedpump: Option<PumpId>,
    pub recyclepump: Option<PumpId>,
    pub selfheater: Option<RelayId>,
}

pub struct Dhwt {
    name: String,
    params: DhwtParams,

    online: bool,
    actual_runmode: RunMode,
    charging: bool,
    /// Charge requested regardless of mode (sanitation, manual boost).
    force_on: bool,
    recycle_on: bool,
    legionella_due: bool,
    electric_mode: bool,
    charge_overtime: bool,
    mode_since: Timestamp,
    target: Option<Temp>,
    heat_request: Option<Temp>,
}

impl Dhwt {
    pub fn new(name: impl Into<String>, params: DhwtParams) -> PlantResult<Self> {
        if params.sensor_top.is_none() && params.sensor_bottom.is_none() {
            return Err(PlantError::Misconfigured {
                what: "dhwt: no tank sensor configured",
            });
        }
        if params.limit_tmin >= params.limit_tmax {
            return Err(PlantError::Misconfigured {
                what: "dhwt: temp limits inverted",
            });
        }
        Ok(Self {
            name: name.into(),
            params,
            online: false,
            actual_runmode: RunMode::Off,
            charging: false,
            force_on: false,
            recycle_on: false,
            legionella_due: false,
            electric_mode: false,
            charge_overtime: false,
            mode_since: Timestamp::ZERO,
            target: None,
            heat_request: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn heat_request(&self) -> Option<Temp> {
        self.heat_request
    }

    pub fn is_charging(&self) -> bool {
        self.charging
    }

    pub fn electric_mode(&self) -> bool {
        self.electric_mode
    }

    /// Degraded-but-safe configuration for unrecoverable mode errors.
    pub fn force_frostfree(&mut self) {
        self.params.runmode = RunMode::FrostFree;
    }

    /// Schedule an anti-legionella sanitation charge.
    pub fn request_legionella(&mut self) {
        if self.params.setpoints.legionella.is_some() {
            self.legionella_due = true;
        }
    }

    /// External recycle-loop request (comfort circulation).
    pub fn set_recycle(&mut self, on: bool) {
        self.recycle_on = on;
    }

    pub fn charge_state(&self) -> DhwtChargeState {
        DhwtChargeState {
            charging: self.charging,
            charge_overtime: self.charge_overtime,
        }
    }

    /// Restore persisted charge flags after coming online. The rest
    /// timer restarts from `now`; monotonic time does not survive a
    /// restart.
    pub fn restore_charge_state(&mut self, state: DhwtChargeState, now: Timestamp) {
        self.charging = state.charging;
        self.charge_overtime = state.charge_overtime;
        self.mode_since = now;
    }

    pub fn online(&mut self, now: Timestamp) -> PlantResult<()> {
        self.charging = false;
        self.force_on = false;
        self.electric_mode = false;
        self.charge_overtime = false;
        self.heat_request = None;
        self.mode_since = now;
        self.online = true;
        Ok(())
    }

    /// Resolve the mode and the charge target for this cycle.
    pub fn logic(&mut self, ctx: &CycleContext) -> PlantResult<()> {
        if !self.online {
            return Err(PlantError::Offline);
        }
        let mode = self.params.runmode.resolve(ctx.dhwmode);
        self.actual_runmode = mode;

        let setpoint = match mode {
            RunMode::Off => {
                self.target = None;
                return Ok(());
            }
            RunMode::Comfort | RunMode::DhwOnly => self.params.setpoints.comfort,
            RunMode::Eco => self.params.setpoints.eco,
            RunMode::FrostFree => self.params.setpoints.frostfree,
            RunMode::Test | RunMode::Manual => self.params.limit_tmax,
            RunMode::Auto => return Err(PlantError::InvalidMode),
        };

        let mut target = setpoint;
        if self.legionella_due {
            if let Some(legionella) = self.params.setpoints.legionella {
                target = target.max(legionella);
                self.force_on = true;
                self.recycle_on = true;
            }
        }

        self.target = Some(
            target
                .max(self.params.limit_tmin)
                .min(self.params.limit_tmax),
        );
        Ok(())
    }

    pub fn run(
        &mut self,
        ctx: &CycleContext,
        inputs: &Inputs,
        relays: &mut RelayBank,
        pumps: &mut [Pump],
    ) -> PlantResult<()> {
        if !self.online {
            return Err(PlantError::Offline);
        }
        let now = ctx.now;

        if self.actual_runmode == RunMode::Off || self.target.is_none() {
            self.untrip(now, relays)?;
            self.all_off(now, relays, pumps)?;
            return Ok(());
        }

        let top = self
            .params
            .sensor_top
            .map(|s| inputs.temperature(s))
            .and_then(Result::ok);
        let bottom = self
            .params
            .sensor_bottom
            .map(|s| inputs.temperature(s))
            .and_then(Result::ok);

        // Trip prefers the top sensor (first to cool), untrip prefers
        // the bottom one (last to heat through).
        let (trip_temp, untrip_temp) = match (top, bottom) {
            (Some(top), Some(bottom)) => (top, bottom),
            (Some(top), None) => (top, top),
            (None, Some(bottom)) => (bottom, bottom),
            (None, None) => {
                self.failsafe(now, relays, pumps)?;
                let sensor = self
                    .params
                    .sensor_top
                    .or(self.params.sensor_bottom)
                    .ok_or(PlantError::NotConfigured)?;
                return Err(hp_hal::HwError::SensorInvalid(sensor).into());
            }
        };
        let target = self.target.ok_or(PlantError::InvalidMode)?;

        if !self.charging {
            // Forced charges bypass the configured hysteresis.
            let hysteresis = if self.force_on {
                kelvin(1.0)
            } else {
                self.params.hysteresis
            };
            let mut want_charge = trip_temp < target - hysteresis;

            // A charge that overran its limit earns the tank an equally
            // long rest before the next attempt.
            if want_charge && self.charge_overtime {
                if let Some(limit) = self.params.charge_limit {
                    want_charge = now.elapsed_since(self.mode_since) >= limit;
                }
            }

            if want_charge {
                if ctx.could_sleep && self.params.selfheater.is_some() {
                    // Producer asleep: electric charging is cheaper than
                    // waking the whole plant.
                    if let Some(rid) = self.params.selfheater {
                        relays.set_state(rid, now, true, Duration::ZERO)?;
                    }
                    self.electric_mode = true;
                    self.heat_request = None;
                    tracing::debug!(dhwt = %self.name, "electric charge start");
                } else {
                    self.electric_mode = false;
                    if let Some(rid) = self.params.selfheater {
                        relays.set_state(rid, now, false, Duration::ZERO)?;
                    }
                    self.heat_request = Some(
                        (target + self.params.temp_inoffset).min(self.params.limit_wintmax),
                    );
                    tracing::debug!(dhwt = %self.name, "charge start");
                }
                self.charging = true;
                self.charge_overtime = false;
                self.mode_since = now;
            }
        } else {
            // A restored charge carries no request yet; re-assert it so
            // the producer picks the charge back up.
            if !self.electric_mode && self.heat_request.is_none() {
                self.heat_request =
                    Some((target + self.params.temp_inoffset).min(self.params.limit_wintmax));
            }

            let mut done = untrip_temp >= target;

            if let Some(limit) = self.params.charge_limit {
                if !self.electric_mode && now.elapsed_since(self.mode_since) > limit {
                    tracing::warn!(dhwt = %self.name, "charge overtime");
                    self.charge_overtime = true;
                    done = true;
                }
            }

            if done {
                self.untrip(now, relays)?;
            }
        }

        self.run_feedpump(now, inputs, untrip_temp, pumps)?;

        if let Some(pump) = self.recycle_mut(pumps) {
            pump.set_state(self.recycle_on, false)?;
        }
        Ok(())
    }

    /// End the charge: silence the heat request and the self-heater.
    fn untrip(&mut self, now: Timestamp, relays: &mut RelayBank) -> PlantResult<()> {
        if !self.charging {
            return Ok(());
        }
        if let Some(rid) = self.params.selfheater {
            relays.set_state(rid, now, false, Duration::ZERO)?;
        }
        self.charging = false;
        self.force_on = false;
        self.legionella_due = false;
        self.electric_mode = false;
        self.heat_request = None;
        self.mode_since = now;
        tracing::debug!(dhwt = %self.name, "charge done");
        Ok(())
    }

    /// Feed pump policy: move producer heat in while charging, guard
    /// against discharging the tank through a cold feed, and against
    /// thermosiphoning while idle.
    fn run_feedpump(
        &mut self,
        _now: Timestamp,
        inputs: &Inputs,
        tank_temp: Temp,
        pumps: &mut [Pump],
    ) -> PlantResult<()> {
        let Some(pump) = self
            .params
            .feedpump
            .and_then(|id| pumps.get_mut(id.index() as usize))
        else {
            return Ok(());
        };

        let win = self
            .params
            .sensor_win
            .map(|s| inputs.temperature(s))
            .and_then(Result::ok);

        if self.charging && !self.electric_mode {
            match win {
                Some(win) if win < tank_temp => {
                    // Feed colder than the tank would discharge it.
                    pump.set_state(false, true)?;
                }
                Some(win) if win >= tank_temp + kelvin(1.0) => {
                    pump.set_state(true, false)?;
                }
                Some(_) => {} // within the band: leave it as is
                None => {
                    // No usable feed reading: keep moving water.
                    pump.set_state(true, false)?;
                }
            }
        } else {
            match win {
                // Feed warmer than the tank thermosiphons heat in; an
                // ordinary cooldown stop is enough.
                Some(win) if win > tank_temp => pump.set_state(false, false)?,
                _ => pump.set_state(false, true)?,
            }
        }
        Ok(())
    }

    fn failsafe(
        &mut self,
        now: Timestamp,
        relays: &mut RelayBank,
        pumps: &mut [Pump],
    ) -> PlantResult<()> {
        tracing::warn!(dhwt = %self.name, "tank sensors lost, failsafe");
        self.heat_request = None;
        self.all_off(now, relays, pumps)
    }

    fn all_off(
        &mut self,
        now: Timestamp,
        relays: &mut RelayBank,
        pumps: &mut [Pump],
    ) -> PlantResult<()> {
        if let Some(rid) = self.params.selfheater {
            relays.set_state(rid, now, false, Duration::ZERO)?;
        }
        if let Some(pump) = self
            .params
            .feedpump
            .and_then(|id| pumps.get_mut(id.index() as usize))
        {
            pump.set_state(false, true)?;
        }
        if let Some(pump) = self.recycle_mut(pumps) {
            pump.set_state(false, false)?;
        }
        Ok(())
    }

    pub fn offline(
        &mut self,
        now: Timestamp,
        relays: &mut RelayBank,
        pumps: &mut [Pump],
    ) -> PlantResult<()> {
        let res = self.all_off(now, relays, pumps);
        self.online = false;
        self.charging = false;
        self.force_on = false;
        self.recycle_on = false;
        self.legionella_due = false;
        self.electric_mode = false;
        self.charge_overtime = false;
        self.heat_request = None;
        self.target = None;
        res
    }

    fn recycle_mut<'a>(&self, pumps: &'a mut [Pump]) -> Option<&'a mut Pump> {
        self.params
            .recyclepump
            .and_then(|id| pumps.get_mut(id.index() as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::OutdoorConditions;
    use hp_core::celsius;

    const TOP: u32 = 0;
    const BOT: u32 = 1;

    fn params() -> DhwtParams {
        DhwtParams {
            runmode: RunMode::Auto,
            setpoints: DhwtSetpoints {
                comfort: celsius(55.0),
                eco: celsius(45.0),
                frostfree: celsius(10.0),
                legionella: Some(celsius(65.0)),
            },
            hysteresis: kelvin(5.0),
            temp_inoffset: kelvin(7.0),
            limit_tmin: celsius(5.0),
            limit_tmax: celsius(70.0),
            limit_wintmax: celsius(75.0),
            charge_limit: Some(Duration::from_secs(3 * 3600)),
            sensor_top: Some(SensorId::from_index(TOP)),
            sensor_bottom: Some(SensorId::from_index(BOT)),
            sensor_win: None,
            feedpump: None,
            recyclepump: None,
            selfheater: None,
        }
    }

    fn ctx(now: u64) -> CycleContext {
        CycleContext {
            now: Timestamp::from_secs(now),
            runmode: RunMode::Comfort,
            dhwmode: RunMode::Comfort,
            outdoor: OutdoorConditions {
                t_60: celsius(5.0),
                t_mix: celsius(5.0),
                t_att: celsius(5.0),
                summer: false,
                frost: false,
            },
            could_sleep: false,
            consumer_sdelay: Duration::ZERO,
            consumer_shift: 0,
        }
    }

    fn tank(top: f64, bottom: f64) -> Inputs {
        let mut inputs = Inputs::new();
        inputs.insert(SensorId::from_index(TOP), Ok(celsius(top)));
        inputs.insert(SensorId::from_index(BOT), Ok(celsius(bottom)));
        inputs
    }

    fn online_dhwt() -> (Dhwt, RelayBank) {
        let mut dhwt = Dhwt::new("tank", params()).unwrap();
        dhwt.online(Timestamp::from_secs(0)).unwrap();
        (dhwt, RelayBank::new(4))
    }

    fn step(
        dhwt: &mut Dhwt,
        now: u64,
        top: f64,
        bottom: f64,
        relays: &mut RelayBank,
    ) -> PlantResult<()> {
        let context = ctx(now);
        dhwt.logic(&context)?;
        dhwt.run(&context, &tank(top, bottom), relays, &mut [])
    }

    #[test]
    fn charge_cycle_trips_on_top_and_untrips_on_bottom() {
        let (mut dhwt, mut relays) = online_dhwt();

        // Top at 51°C: above target-hysteresis, no charge.
        step(&mut dhwt, 100, 51.0, 30.0, &mut relays).unwrap();
        assert!(!dhwt.is_charging());
        assert_eq!(dhwt.heat_request(), None);

        // Top below 50°C: charge starts, request = target+offset.
        step(&mut dhwt, 200, 49.5, 30.0, &mut relays).unwrap();
        assert!(dhwt.is_charging());
        assert_eq!(dhwt.heat_request(), Some(celsius(62.0)));

        // Top recovered but bottom still cold: keep charging.
        step(&mut dhwt, 300, 56.0, 50.0, &mut relays).unwrap();
        assert!(dhwt.is_charging());

        // Bottom reaches target: done.
        step(&mut dhwt, 400, 57.0, 55.0, &mut relays).unwrap();
        assert!(!dhwt.is_charging());
        assert_eq!(dhwt.heat_request(), None);
    }

    #[test]
    fn heat_request_clamped_to_wintmax() {
        let mut p = params();
        p.limit_wintmax = celsius(60.0);
        let mut dhwt = Dhwt::new("tank", p).unwrap();
        dhwt.online(Timestamp::from_secs(0)).unwrap();
        let mut relays = RelayBank::new(4);

        step(&mut dhwt, 100, 40.0, 30.0, &mut relays).unwrap();
        assert_eq!(dhwt.heat_request(), Some(celsius(60.0)));
    }

    #[test]
    fn overtime_forces_idle_rest() {
        let (mut dhwt, mut relays) = online_dhwt();

        step(&mut dhwt, 0, 40.0, 30.0, &mut relays).unwrap();
        assert!(dhwt.is_charging());

        // Past the 3h limit with the bottom still cold: abort.
        let after_limit = 3 * 3600 + 60;
        step(&mut dhwt, after_limit, 40.0, 30.0, &mut relays).unwrap();
        assert!(!dhwt.is_charging());

        // Still cold shortly after: the rest period blocks a restart.
        step(&mut dhwt, after_limit + 600, 40.0, 30.0, &mut relays).unwrap();
        assert!(!dhwt.is_charging());

        // After a full limit of rest, charging resumes.
        step(&mut dhwt, after_limit + 3 * 3600, 40.0, 30.0, &mut relays).unwrap();
        assert!(dhwt.is_charging());
    }

    #[test]
    fn electric_charge_when_plant_sleeps() {
        let mut p = params();
        p.selfheater = Some(RelayId::from_index(0));
        let mut dhwt = Dhwt::new("tank", p).unwrap();
        dhwt.online(Timestamp::from_secs(0)).unwrap();
        let mut relays = RelayBank::new(4);
        relays.claim(RelayId::from_index(0), "dhwt heater").unwrap();

        let mut context = ctx(100);
        context.could_sleep = true;
        dhwt.logic(&context).unwrap();
        dhwt.run(&context, &tank(40.0, 30.0), &mut relays, &mut [])
            .unwrap();

        assert!(dhwt.is_charging());
        assert!(dhwt.electric_mode());
        assert_eq!(dhwt.heat_request(), None);
        assert!(relays
            .is_on(RelayId::from_index(0), Timestamp::from_secs(100))
            .unwrap());
    }

    #[test]
    fn legionella_charge_raises_target_and_forces_on() {
        let (mut dhwt, mut relays) = online_dhwt();
        dhwt.request_legionella();

        // 63°C top would normally never trip a 55°C target; the
        // sanitation cycle (65°C target, 1K hysteresis) does.
        step(&mut dhwt, 100, 63.0, 60.0, &mut relays).unwrap();
        assert!(dhwt.is_charging());
        assert_eq!(dhwt.heat_request(), Some(celsius(72.0)));

        // Bottom at the sanitation target ends it and clears the flag.
        step(&mut dhwt, 200, 66.0, 65.0, &mut relays).unwrap();
        assert!(!dhwt.is_charging());
        step(&mut dhwt, 300, 63.0, 60.0, &mut relays).unwrap();
        assert!(!dhwt.is_charging());
    }

    #[test]
    fn both_sensors_lost_is_a_fault() {
        let (mut dhwt, mut relays) = online_dhwt();
        let context = ctx(100);
        dhwt.logic(&context).unwrap();

        let mut inputs = Inputs::new();
        inputs.insert(
            SensorId::from_index(TOP),
            Err(hp_hal::HwError::SensorShort(SensorId::from_index(TOP))),
        );
        inputs.insert(
            SensorId::from_index(BOT),
            Err(hp_hal::HwError::SensorDisconnected(SensorId::from_index(BOT))),
        );
        let err = dhwt.run(&context, &inputs, &mut relays, &mut []).unwrap_err();
        assert!(matches!(err, PlantError::Hw(_)));
    }

    #[test]
    fn restored_charge_reasserts_the_heat_request() {
        let (mut dhwt, mut relays) = online_dhwt();
        dhwt.restore_charge_state(
            DhwtChargeState {
                charging: true,
                charge_overtime: false,
            },
            Timestamp::from_secs(0),
        );

        // Bottom still below target: the resumed charge asks for heat
        // again even though the request did not survive the restart.
        step(&mut dhwt, 100, 52.0, 45.0, &mut relays).unwrap();
        assert!(dhwt.is_charging());
        assert_eq!(dhwt.heat_request(), Some(celsius(62.0)));
    }

    #[test]
    fn single_sensor_serves_both_roles() {
        let mut p = params();
        p.sensor_bottom = None;
        let mut dhwt = Dhwt::new("tank", p).unwrap();
        dhwt.online(Timestamp::from_secs(0)).unwrap();
        let mut relays = RelayBank::new(4);

        let context = ctx(100);
        dhwt.logic(&context).unwrap();
        let mut inputs = Inputs::new();
        inputs.insert(SensorId::from_index(TOP), Ok(celsius(40.0)));
        dhwt.run(&context, &inputs, &mut relays, &mut []).unwrap();
        assert!(dhwt.is_charging());

        inputs.insert(SensorId::from_index(TOP), Ok(celsius(55.0)));
        let later = ctx(200);
        dhwt.logic(&later).unwrap();
        dhwt.run(&later, &inputs, &mut relays, &mut []).unwrap();
        assert!(!dhwt.is_charging());
    }
}
