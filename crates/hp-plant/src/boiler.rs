//! Gas/oil boiler: burner hysteresis, antifreeze, hard safety limit
//! and load shedding.

use crate::context::CycleContext;
use crate::error::{PlantError, PlantResult};
use crate::heatsource::HsSignals;
use crate::pump::Pump;
use hp_core::{PumpId, RelayId, RunMode, SensorId, Temp, TempDelta, Timestamp};
use hp_hal::{Inputs, RelayBank};
use std::time::Duration;

/// Consumer shift applied when the boiler trips its hard limit: every
/// consumer is asked to absorb as much heat as it can.
pub const CSHIFT_MAX: i32 = 100;

/// Percent of consumer shift shed per Kelvin below the minimum
/// operating temperature (condensation protection).
const SHED_PER_KELVIN: f64 = 10.0;

/// What the boiler does when nothing requests heat.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdleMode {
    /// Always hold the minimum temperature.
    Never,
    /// Hold the minimum unless running frost protection only.
    FrostOnly,
    /// Allowed to go fully cold whenever the plant could sleep.
    Always,
}

#[derive(Clone, Debug)]
pub struct BoilerParams {
    pub idle_mode: IdleMode,
    pub hysteresis: TempDelta,
    /// Minimum operating temperature (condensation limit).
    pub limit_tmin: Temp,
    /// Maximum setpoint the burner control may aim for.
    pub limit_tmax: Temp,
    /// Absolute limit; crossing it is a safety event.
    pub limit_thardmax: Temp,
    pub t_freeze: Temp,
    /// Minimum burner on/off time (anti short-cycle).
    pub burner_min_time: Duration,
    /// Stop delay granted to consumers after the burner stops.
    pub consumer_sdelay: Duration,
    pub body_sensor: SensorId,
    pub burner_relay: RelayId,
    pub loadpump: Option<PumpId>,
}

pub struct Boiler {
    params: BoilerParams,
    antifreeze: bool,
    target: Option<Temp>,
    last_run: Option<Timestamp>,
}

impl Boiler {
    pub fn new(params: BoilerParams) -> PlantResult<Self> {
        if params.limit_tmin >= params.limit_tmax {
            return Err(PlantError::Misconfigured {
                what: "boiler: tmin above tmax",
            });
        }
        if params.limit_thardmax < params.limit_tmax {
            return Err(PlantError::Misconfigured {
                what: "boiler: hard limit below tmax",
            });
        }
        if params.hysteresis <= TempDelta::ZERO {
            return Err(PlantError::Misconfigured {
                what: "boiler: hysteresis must be positive",
            });
        }
        Ok(Self {
            params,
            antifreeze: false,
            target: None,
            last_run: None,
        })
    }

    pub fn target(&self) -> Option<Temp> {
        self.target
    }

    pub fn antifreeze_active(&self) -> bool {
        self.antifreeze
    }

    /// Latch frost protection on the body temperature. Trips at the
    /// freeze limit, releases only clear of the minimum temperature.
    fn update_antifreeze(&mut self, inputs: &Inputs) {
        if let Ok(temp) = inputs.temperature(self.params.body_sensor) {
            if temp <= self.params.t_freeze {
                if !self.antifreeze {
                    tracing::warn!("boiler antifreeze tripped");
                }
                self.antifreeze = true;
            } else if self.antifreeze
                && temp > self.params.limit_tmin + self.params.hysteresis / 2.0
            {
                self.antifreeze = false;
            }
        }
    }

    pub fn logic(
        &mut self,
        mode: RunMode,
        ctx: &CycleContext,
        inputs: &Inputs,
        heat_request: Option<Temp>,
        signals: &mut HsSignals,
    ) -> PlantResult<()> {
        self.update_antifreeze(inputs);

        let mut target = match mode {
            RunMode::Off => None,
            RunMode::Comfort | RunMode::Eco | RunMode::DhwOnly | RunMode::FrostFree => heat_request,
            RunMode::Test | RunMode::Manual => Some(self.params.limit_tmax),
            RunMode::Auto => return Err(PlantError::InvalidMode),
        };

        signals.could_sleep = target.is_none() && !self.antifreeze;

        if self.antifreeze {
            target = Some(target.map_or(self.params.limit_tmin, |t| t.max(self.params.limit_tmin)));
        }

        self.target = match target {
            Some(t) => Some(t.max(self.params.limit_tmin).min(self.params.limit_tmax)),
            None => match self.params.idle_mode {
                IdleMode::Never => Some(self.params.limit_tmin),
                IdleMode::FrostOnly if mode != RunMode::FrostFree => Some(self.params.limit_tmin),
                // Idle and allowed to: go cold once the plant sleeps.
                _ if !ctx.could_sleep => Some(self.params.limit_tmin),
                _ => None,
            },
        };
        Ok(())
    }

    pub fn run(
        &mut self,
        mode: RunMode,
        ctx: &CycleContext,
        inputs: &Inputs,
        relays: &mut RelayBank,
        pumps: &mut [Pump],
        signals: &mut HsSignals,
    ) -> PlantResult<()> {
        let now = ctx.now;
        let dt = match self.last_run {
            Some(last) => now.elapsed_since(last),
            None => Duration::ZERO,
        };
        self.last_run = Some(now);

        if mode == RunMode::Off && !self.antifreeze {
            relays
                .set_state(self.params.burner_relay, now, false, Duration::ZERO)?;
            if let Some(pump) = self.loadpump_mut(pumps) {
                pump.set_state(false, false)?;
            }
            return Ok(());
        }

        let temp = match inputs.temperature(self.params.body_sensor) {
            Ok(t) => t,
            Err(e) => {
                self.failsafe(now, relays, pumps)?;
                return Err(e.into());
            }
        };

        if temp > self.params.limit_thardmax {
            self.failsafe(now, relays, pumps)?;
            signals.cshift_crit = CSHIFT_MAX;
            return Err(PlantError::Safety {
                what: "boiler over hard temperature limit",
            });
        }

        // Below the condensation limit consumers are shed progressively.
        signals.cshift_crit = if temp < self.params.limit_tmin {
            let below = (self.params.limit_tmin - temp).as_kelvin();
            -((SHED_PER_KELVIN * below).round() as i32)
        } else {
            0
        };

        if let Some(pump) = self.loadpump_mut(pumps) {
            pump.set_state(true, false)?;
        }

        let target = match self.target {
            Some(t) => t,
            None => {
                relays.set_state(
                    self.params.burner_relay,
                    now,
                    false,
                    self.params.burner_min_time,
                )?;
                signals.target_consumer_sdelay =
                    signals.target_consumer_sdelay.saturating_sub(dt);
                return Ok(());
            }
        };

        // Burner hysteresis around the target, bounded by the operating
        // envelope; both switch directions honor the minimum burner time.
        let half = self.params.hysteresis / 2.0;
        let trip = (target - half).max(self.params.limit_tmin);
        let untrip = (target + half).min(self.params.limit_tmax);

        let burner_on = relays.is_on(self.params.burner_relay, now)?;
        if temp < trip && !burner_on {
            relays.set_state(
                self.params.burner_relay,
                now,
                true,
                self.params.burner_min_time,
            )?;
        } else if temp > untrip && burner_on {
            relays.set_state(
                self.params.burner_relay,
                now,
                false,
                self.params.burner_min_time,
            )?;
        }

        if relays.is_on(self.params.burner_relay, now)? {
            // While firing, consumers are promised the full stop delay.
            signals.target_consumer_sdelay = self.params.consumer_sdelay;
        } else {
            signals.target_consumer_sdelay = signals.target_consumer_sdelay.saturating_sub(dt);
        }
        Ok(())
    }

    /// Burner off immediately, load pump forced on to spread the heat.
    fn failsafe(
        &mut self,
        now: Timestamp,
        relays: &mut RelayBank,
        pumps: &mut [Pump],
    ) -> PlantResult<()> {
        tracing::error!("boiler failsafe");
        relays.set_state(self.params.burner_relay, now, false, Duration::ZERO)?;
        if let Some(pump) = self.loadpump_mut(pumps) {
            pump.set_state(true, true)?;
        }
        Ok(())
    }

    pub fn offline(
        &mut self,
        now: Timestamp,
        relays: &mut RelayBank,
        pumps: &mut [Pump],
    ) -> PlantResult<()> {
        let res = relays.set_state(self.params.burner_relay, now, false, Duration::ZERO);
        if let Some(pump) = self.loadpump_mut(pumps) {
            let _ = pump.set_state(false, true);
        }
        self.target = None;
        self.antifreeze = false;
        self.last_run = None;
        res?;
        Ok(())
    }

    fn loadpump_mut<'a>(&self, pumps: &'a mut [Pump]) -> Option<&'a mut Pump> {
        self.params
            .loadpump
            .and_then(|id| pumps.get_mut(id.index() as usize))
    }
}
