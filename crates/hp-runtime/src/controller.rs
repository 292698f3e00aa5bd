//! The control loop: sample, schedule, run the plant, write back.

use crate::builder::{build_plant, BuiltPlant};
use crate::error::{RuntimeError, RuntimeResult};
use crate::outdoor::OutdoorModel;
use crate::scheduler::Scheduler;
use crate::signals::SignalBlock;
use chrono::NaiveDateTime;
use hp_config::Config;
use hp_core::{celsius, RunMode, SensorId, Timestamp};
use hp_hal::{HwBackend, Inputs, RelayCounters};
use hp_plant::{CycleReport, Dhwt, DhwtChargeState, OutdoorConditions, Plant};
use hp_store::StateStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Persisted-state schema versions.
const COUNTERS_VERSION: u32 = 1;
const COUNTERS_KEY: &str = "relay_counters";
const DHW_VERSION: u32 = 1;
const DHW_KEY: &str = "dhw_charge";
/// How often accumulated state is written back to disk.
const PERSIST_INTERVAL: Duration = Duration::from_secs(15 * 60);

pub struct Controller {
    plant: Plant,
    backend: Box<dyn HwBackend>,
    inputs: Inputs,
    sensors: Vec<SensorId>,
    outdoor_sensor: SensorId,
    outdoor: OutdoorModel,
    last_outdoor: Option<OutdoorConditions>,
    scheduler: Scheduler,
    signals: Arc<SignalBlock>,
    store: Option<StateStore>,
    /// DHW charge flags loaded from the store, applied once the tanks
    /// are online.
    restored_dhw: Option<Vec<DhwtChargeState>>,
    runmode: RunMode,
    dhwmode: RunMode,
    loop_period: Duration,
    last_persist: Option<Timestamp>,
    cycles: u64,
}

impl Controller {
    pub fn new(config: &Config, backend: Box<dyn HwBackend>) -> RuntimeResult<Self> {
        if config.defaults.runmode == RunMode::Auto || config.defaults.dhwmode == RunMode::Auto {
            return Err(RuntimeError::Build {
                what: "default modes must not be auto".to_string(),
            });
        }

        let BuiltPlant {
            mut plant,
            sensors,
            outdoor_sensor,
        } = build_plant(config)?;

        let store = match &config.state_dir {
            Some(dir) => Some(StateStore::new(dir.clone())?),
            None => None,
        };
        let mut restored_dhw = None;
        if let Some(store) = &store {
            if let Some(counters) =
                store.load::<Vec<RelayCounters>>(COUNTERS_KEY, COUNTERS_VERSION)?
            {
                plant.relays_mut().restore_counters(counters);
            }
            restored_dhw = store.load::<Vec<DhwtChargeState>>(DHW_KEY, DHW_VERSION)?;
        }

        Ok(Self {
            plant,
            backend,
            inputs: Inputs::new(),
            sensors,
            outdoor_sensor,
            outdoor: OutdoorModel::new(
                Duration::from_secs(config.building.tau_s),
                celsius(config.building.limit_tsummer_c),
                celsius(config.building.limit_tfrost_c),
            ),
            last_outdoor: None,
            scheduler: Scheduler::from_config(&config.schedule),
            signals: Arc::new(SignalBlock::new()),
            store,
            restored_dhw,
            runmode: config.defaults.runmode,
            dhwmode: config.defaults.dhwmode,
            loop_period: Duration::from_secs(config.loop_period_s),
            last_persist: None,
            cycles: 0,
        })
    }

    /// Shared snapshot handle for status reporting.
    pub fn signals(&self) -> Arc<SignalBlock> {
        Arc::clone(&self.signals)
    }

    pub fn online(&mut self, now: Timestamp) -> RuntimeResult<()> {
        let failures = self.plant.online(now);
        if let Some((name, err)) = failures.into_iter().next() {
            return Err(RuntimeError::Build {
                what: format!("entity '{}' failed to come online: {}", name, err),
            });
        }
        if let Some(states) = self.restored_dhw.take() {
            for (dhwt, state) in self.plant.dhwts_mut().iter_mut().zip(states) {
                dhwt.restore_charge_state(state, now);
            }
        }
        Ok(())
    }

    /// One full control cycle at the given monotonic and wall time.
    pub fn step(&mut self, now: Timestamp, wall: NaiveDateTime) -> RuntimeResult<CycleReport> {
        self.inputs.refresh(self.backend.as_ref(), &self.sensors, now);

        if let Some(change) = self.scheduler.tick(wall) {
            if let Some(mode) = change.runmode {
                self.runmode = mode;
            }
            if let Some(mode) = change.dhwmode {
                self.dhwmode = mode;
            }
            if change.legionella {
                for dhwt in self.plant.dhwts_mut() {
                    dhwt.request_legionella();
                }
            }
        }

        // Outdoor sensor loss keeps the last damped view: a stale
        // building model beats no model, and the fault is already logged
        // by the input refresh.
        let outdoor = match self.inputs.temperature(self.outdoor_sensor) {
            Ok(raw) => {
                let conditions = self.outdoor.update(now, raw);
                self.last_outdoor = Some(conditions);
                conditions
            }
            Err(err) => match self.last_outdoor {
                Some(conditions) => conditions,
                None => return Err(err.into()),
            },
        };

        let report = self
            .plant
            .run_cycle(now, self.runmode, self.dhwmode, outdoor, &self.inputs);

        self.plant.relays().flush(self.backend.as_mut())?;
        self.cycles += 1;

        let runmode = self.runmode;
        let dhwmode = self.dhwmode;
        let cycles = self.cycles;
        self.signals.update(|s| {
            s.runmode = runmode;
            s.dhwmode = dhwmode;
            s.outdoor = Some(outdoor);
            s.heat_request = report.heat_request;
            s.could_sleep = report.could_sleep;
            s.consumer_shift = report.consumer_shift;
            s.failures = report.failures.iter().map(|(name, _)| name.clone()).collect();
            s.cycles = cycles;
        });

        let due = match self.last_persist {
            Some(last) => now.elapsed_since(last) >= PERSIST_INTERVAL,
            None => true,
        };
        if due {
            self.persist()?;
            self.last_persist = Some(now);
        }

        Ok(report)
    }

    /// Run cycles until the stop flag is raised. Per-cycle failures are
    /// logged and the loop keeps going; only setup-class errors abort.
    pub fn run(&mut self, stop: &AtomicBool) -> RuntimeResult<()> {
        let started = Instant::now();
        self.online(Timestamp::ZERO)?;

        while !stop.load(Ordering::Relaxed) {
            let now = Timestamp::ZERO + started.elapsed();
            let wall = chrono::Local::now().naive_local();
            match self.step(now, wall) {
                Ok(report) => {
                    for (name, err) in &report.failures {
                        tracing::error!(entity = %name, error = %err, "cycle failure");
                    }
                }
                Err(err) => tracing::error!(error = %err, "cycle aborted"),
            }
            std::thread::sleep(self.loop_period);
        }

        let now = Timestamp::ZERO + started.elapsed();
        self.shutdown(now)
    }

    /// Take the plant down and flush the final hardware state.
    pub fn shutdown(&mut self, now: Timestamp) -> RuntimeResult<()> {
        // Capture the charge flags before offline clears them.
        let dhw_states = self.dhw_states();
        for (name, err) in self.plant.offline(now) {
            tracing::error!(entity = %name, error = %err, "offline failure");
        }
        self.plant.relays().flush(self.backend.as_mut())?;
        if let Some(store) = &self.store {
            store.save(
                COUNTERS_KEY,
                COUNTERS_VERSION,
                &self.plant.relays().snapshot_counters(),
            )?;
            store.save(DHW_KEY, DHW_VERSION, &dhw_states)?;
        }
        Ok(())
    }

    fn dhw_states(&self) -> Vec<DhwtChargeState> {
        self.plant.dhwts().iter().map(Dhwt::charge_state).collect()
    }

    fn persist(&self) -> RuntimeResult<()> {
        if let Some(store) = &self.store {
            store.save(
                COUNTERS_KEY,
                COUNTERS_VERSION,
                &self.plant.relays().snapshot_counters(),
            )?;
            store.save(DHW_KEY, DHW_VERSION, &self.dhw_states())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use hp_config::from_yaml_str;
    use hp_core::celsius;
    use hp_hal::MockBackend;

    const YAML: &str = r#"
version: 1
name: test plant
defaults:
  runmode: comfort
  dhwmode: comfort
building:
  outdoor_sensor: outdoor
  tau_s: 36000
  limit_tsummer_c: 18.0
  limit_tfrost_c: 3.0
sensors:
  - { name: outdoor, channel: 0 }
  - { name: circuit water, channel: 1 }
  - { name: boiler body, channel: 2 }
relays:
  - { name: burner, channel: 0 }
  - { name: pump, channel: 1 }
pumps:
  - { name: circuit pump, relay: pump }
circuits:
  - name: ground floor
    comfort_c: 20.0
    eco_c: 17.0
    frostfree_c: 7.0
    limit_wtmin_c: 15.0
    limit_wtmax_c: 85.0
    temp_inoffset_k: 5.0
    law:
      tout1_c: -5.0
      twater1_c: 66.5
      tout2_c: 15.0
      twater2_c: 27.0
      nh100: 130
    water_sensor: circuit water
    pump: circuit pump
boiler:
  name: boiler
  idle_mode: frost_only
  hysteresis_k: 6.0
  limit_tmin_c: 50.0
  limit_tmax_c: 90.0
  limit_thardmax_c: 95.0
  body_sensor: boiler body
  burner_relay: burner
schedule:
  - { weekday: 0, hour: 6, minute: 0, runmode: comfort }
  - { weekday: 0, hour: 22, minute: 0, runmode: eco }
"#;

    fn backend() -> MockBackend {
        let mut backend = MockBackend::new();
        backend.set_temperature(SensorId::from_index(0), celsius(-2.0));
        backend.set_temperature(SensorId::from_index(1), celsius(40.0));
        backend.set_temperature(SensorId::from_index(2), celsius(40.0));
        backend
    }

    fn wall(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 8, 24)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn cold_cycle_produces_demand_and_fires() {
        let config = from_yaml_str(YAML).unwrap();
        let mut controller = Controller::new(&config, Box::new(backend())).unwrap();
        controller.online(Timestamp::ZERO).unwrap();

        let report = controller.step(Timestamp::from_secs(1), wall(7)).unwrap();
        assert!(report.failures.is_empty());
        assert!(report.heat_request.is_some());

        let snap = controller.signals().snapshot();
        assert_eq!(snap.cycles, 1);
        // The Sunday 22:00 eco entry was the last transition before
        // Monday morning.
        assert_eq!(snap.runmode, RunMode::Eco);
        assert!(snap.outdoor.is_some());
    }

    #[test]
    fn outdoor_sensor_loss_reuses_last_conditions() {
        let config = from_yaml_str(YAML).unwrap();
        let mut controller = Controller::new(&config, Box::new(backend())).unwrap();
        controller.online(Timestamp::ZERO).unwrap();
        controller.step(Timestamp::from_secs(1), wall(7)).unwrap();

        let mut faulty = backend();
        faulty.remove_sensor(SensorId::from_index(0));
        controller.backend = Box::new(faulty);
        let report = controller.step(Timestamp::from_secs(2), wall(8)).unwrap();
        assert!(report.heat_request.is_some());
    }

    #[test]
    fn auto_default_mode_is_rejected() {
        let yaml = YAML.replace("runmode: comfort\n  dhwmode", "runmode: auto\n  dhwmode");
        let config = from_yaml_str(&yaml).unwrap();
        assert!(matches!(
            Controller::new(&config, Box::new(backend())),
            Err(RuntimeError::Build { .. })
        ));
    }
}
