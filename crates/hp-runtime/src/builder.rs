//! Turns a validated configuration into a live plant.
//!
//! Names resolve to typed ids here: sensors and relays map to their
//! backend channels, entities claim their relays, and every control law
//! is constructed with its checked parameters.

use crate::error::{RuntimeError, RuntimeResult};
use hp_config::{Config, IdleModeDef, ValveAlgoDef};
use hp_controls::{BangBang, BilinearLaw, PiParams, PiVelocity, SApprox, ValveAlgo};
use hp_core::{celsius, kelvin, PumpId, RelayId, SensorId, ValveId};
use hp_hal::RelayBank;
use hp_plant::{
    boiler::BoilerParams, circuit::AmbientSetpoints, circuit::CircuitParams,
    circuit::OuthoffSettings, dhwt::DhwtParams, dhwt::DhwtSetpoints, valve::ValveParams,
    valve::ValveSensors, Boiler, Dhwt, HCircuit, HeatSource, HeatSourceKind, IdleMode, Plant,
    Pump, Valve,
};
use std::collections::HashMap;
use std::time::Duration;

pub struct BuiltPlant {
    pub plant: Plant,
    /// Every sensor to poll each cycle.
    pub sensors: Vec<SensorId>,
    pub outdoor_sensor: SensorId,
}

pub fn build_plant(config: &Config) -> RuntimeResult<BuiltPlant> {
    let sensors: HashMap<&str, SensorId> = config
        .sensors
        .iter()
        .map(|s| (s.name.as_str(), SensorId::from_index(s.channel)))
        .collect();
    let relays: HashMap<&str, RelayId> = config
        .relays
        .iter()
        .map(|r| (r.name.as_str(), RelayId::from_index(r.channel)))
        .collect();

    let relay_count = config
        .relays
        .iter()
        .map(|r| r.channel + 1)
        .max()
        .unwrap_or(0);
    let mut bank = RelayBank::new(relay_count);

    let mut plant_pumps: HashMap<&str, PumpId> = HashMap::new();
    let mut plant_valves: HashMap<&str, ValveId> = HashMap::new();

    // Claim relays before handing the bank to the plant so a conflict
    // surfaces as an error here, not as a surprise mid-cycle.
    let mut plant = {
        for pump in &config.pumps {
            bank.claim(lookup(&relays, &pump.relay, "relay")?, &pump.name)?;
        }
        for valve in &config.valves {
            bank.claim(lookup(&relays, &valve.relay_open, "relay")?, &valve.name)?;
            bank.claim(lookup(&relays, &valve.relay_close, "relay")?, &valve.name)?;
        }
        if let Some(boiler) = &config.boiler {
            bank.claim(lookup(&relays, &boiler.burner_relay, "relay")?, &boiler.name)?;
        }
        for dhwt in &config.dhwts {
            if let Some(heater) = &dhwt.selfheater {
                bank.claim(lookup(&relays, heater, "relay")?, &dhwt.name)?;
            }
        }
        Plant::new(bank)
    };

    for def in &config.pumps {
        let id = plant.add_pump(Pump::new(
            &def.name,
            lookup(&relays, &def.relay, "relay")?,
            Duration::from_secs(def.cooldown_time_s),
        ));
        plant_pumps.insert(&def.name, id);
    }

    for def in &config.valves {
        let algo = match &def.algo {
            ValveAlgoDef::BangBang => ValveAlgo::BangBang(BangBang),
            ValveAlgoDef::SApprox {
                sample_intvl_s,
                amount_pmil,
            } => ValveAlgo::SApprox(SApprox::new(
                Duration::from_secs(*sample_intvl_s),
                i32::from(*amount_pmil),
            )?),
            ValveAlgoDef::Pi {
                sample_intvl_s,
                tu_s,
                td_s,
                ksmax_k,
                tune_f,
            } => ValveAlgo::Pi(PiVelocity::new(PiParams {
                sample_intvl: Duration::from_secs(*sample_intvl_s),
                tu: Duration::from_secs(*tu_s),
                td: Duration::from_secs(*td_s),
                ksmax: kelvin(*ksmax_k),
                tune_f: u32::from(*tune_f),
            })?),
        };

        let params = ValveParams {
            rid_open: lookup(&relays, &def.relay_open, "relay")?,
            rid_close: lookup(&relays, &def.relay_close, "relay")?,
            ete_time: Duration::from_secs(def.ete_time_s),
            deadband: def.deadband_pmil,
            deadzone: kelvin(def.deadzone_k),
            sensors: ValveSensors {
                outlet: lookup(&sensors, &def.outlet_sensor, "sensor")?,
                inlet_hot: lookup_opt(&sensors, def.inlet_hot_sensor.as_deref(), "sensor")?,
                inlet_cold: lookup_opt(&sensors, def.inlet_cold_sensor.as_deref(), "sensor")?,
            },
        };
        let id = plant.add_valve(Valve::new(&def.name, params, algo)?);
        plant_valves.insert(&def.name, id);
    }

    for def in &config.circuits {
        let law = BilinearLaw::new(
            celsius(def.law.tout1_c),
            celsius(def.law.twater1_c),
            celsius(def.law.tout2_c),
            celsius(def.law.twater2_c),
            u32::from(def.law.nh100),
        )?;
        let params = CircuitParams {
            runmode: def.runmode,
            ambient: AmbientSetpoints {
                comfort: celsius(def.comfort_c),
                eco: celsius(def.eco_c),
                frostfree: celsius(def.frostfree_c),
            },
            t_offset: kelvin(def.t_offset_k),
            outhoff: OuthoffSettings {
                comfort: def.outhoff.comfort_c.map(celsius),
                eco: def.outhoff.eco_c.map(celsius),
                frostfree: def.outhoff.frostfree_c.map(celsius),
                hysteresis: kelvin(def.outhoff.hysteresis_k),
            },
            limit_wtmin: celsius(def.limit_wtmin_c),
            limit_wtmax: celsius(def.limit_wtmax_c),
            temp_inoffset: kelvin(def.temp_inoffset_k),
            wtemp_rorh: def.wtemp_rorh_k.map(kelvin),
            water_sensor: lookup(&sensors, &def.water_sensor, "sensor")?,
            valve: lookup_opt(&plant_valves, def.valve.as_deref(), "valve")?,
            pump: lookup_opt(&plant_pumps, def.pump.as_deref(), "pump")?,
        };
        plant.add_circuit(HCircuit::new(&def.name, params, law));
    }

    if let Some(def) = &config.boiler {
        let boiler = Boiler::new(BoilerParams {
            idle_mode: match def.idle_mode {
                IdleModeDef::Never => IdleMode::Never,
                IdleModeDef::FrostOnly => IdleMode::FrostOnly,
                IdleModeDef::Always => IdleMode::Always,
            },
            hysteresis: kelvin(def.hysteresis_k),
            limit_tmin: celsius(def.limit_tmin_c),
            limit_tmax: celsius(def.limit_tmax_c),
            limit_thardmax: celsius(def.limit_thardmax_c),
            t_freeze: celsius(def.t_freeze_c),
            burner_min_time: Duration::from_secs(def.burner_min_time_s),
            consumer_sdelay: Duration::from_secs(def.consumer_sdelay_s),
            body_sensor: lookup(&sensors, &def.body_sensor, "sensor")?,
            burner_relay: lookup(&relays, &def.burner_relay, "relay")?,
            loadpump: lookup_opt(&plant_pumps, def.loadpump.as_deref(), "pump")?,
        })?;
        plant.set_heatsource(HeatSource::new(
            &def.name,
            def.runmode,
            HeatSourceKind::Boiler(boiler),
        ));
    }

    for def in &config.dhwts {
        let dhwt = Dhwt::new(
            &def.name,
            DhwtParams {
                runmode: def.runmode,
                setpoints: DhwtSetpoints {
                    comfort: celsius(def.comfort_c),
                    eco: celsius(def.eco_c),
                    frostfree: celsius(def.frostfree_c),
                    legionella: def.legionella_c.map(celsius),
                },
                hysteresis: kelvin(def.hysteresis_k),
                temp_inoffset: kelvin(def.temp_inoffset_k),
                limit_tmin: celsius(def.limit_tmin_c),
                limit_tmax: celsius(def.limit_tmax_c),
                limit_wintmax: celsius(def.limit_wintmax_c),
                charge_limit: def.charge_limit_s.map(Duration::from_secs),
                sensor_top: lookup_opt(&sensors, def.sensor_top.as_deref(), "sensor")?,
                sensor_bottom: lookup_opt(&sensors, def.sensor_bottom.as_deref(), "sensor")?,
                sensor_win: lookup_opt(&sensors, def.sensor_win.as_deref(), "sensor")?,
                feedpump: lookup_opt(&plant_pumps, def.feedpump.as_deref(), "pump")?,
                recyclepump: lookup_opt(&plant_pumps, def.recyclepump.as_deref(), "pump")?,
                selfheater: lookup_opt(&relays, def.selfheater.as_deref(), "relay")?,
            },
        )?;
        plant.add_dhwt(dhwt);
    }

    let outdoor_sensor = lookup(&sensors, &config.building.outdoor_sensor, "sensor")?;
    let mut poll: Vec<SensorId> = sensors.values().copied().collect();
    poll.sort_by_key(|s| s.index());

    Ok(BuiltPlant {
        plant,
        sensors: poll,
        outdoor_sensor,
    })
}

fn lookup<T: Copy>(map: &HashMap<&str, T>, name: &str, what: &str) -> RuntimeResult<T> {
    map.get(name).copied().ok_or_else(|| RuntimeError::Build {
        what: format!("unknown {} '{}'", what, name),
    })
}

fn lookup_opt<T: Copy>(
    map: &HashMap<&str, T>,
    name: Option<&str>,
    what: &str,
) -> RuntimeResult<Option<T>> {
    match name {
        Some(name) => Ok(Some(lookup(map, name, what)?)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hp_config::from_yaml_str;

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
  - { name: valve open, channel: 1 }
  - { name: valve close, channel: 2 }
  - { name: pump, channel: 3 }
pumps:
  - { name: circuit pump, relay: pump }
valves:
  - name: mixing valve
    relay_open: valve open
    relay_close: valve close
    ete_time_s: 120
    deadband_pmil: 20
    deadzone_k: 1.0
    outlet_sensor: circuit water
    algo: { type: Pi, sample_intvl_s: 100, tu_s: 400, td_s: 60, ksmax_k: 40.0 }
circuits:
  - name: ground floor
    comfort_c: 20.0
    eco_c: 17.0
    frostfree_c: 7.0
    limit_wtmin_c: 15.0
    limit_wtmax_c: 85.0
    law:
      tout1_c: -5.0
      twater1_c: 66.5
      tout2_c: 15.0
      twater2_c: 27.0
      nh100: 130
    water_sensor: circuit water
    valve: mixing valve
    pump: circuit pump
boiler:
  name: boiler
  idle_mode: frost_only
  hysteresis_k: 6.0
  limit_tmin_c: 50.0
  limit_tmax_c: 90.0
  limit_thardmax_c: 95.0
  burner_min_time_s: 120
  consumer_sdelay_s: 360
  body_sensor: boiler body
  burner_relay: burner
"#;

    #[test]
    fn builds_full_plant_from_config() {
        let config = from_yaml_str(YAML).unwrap();
        hp_config::validate_config(&config).unwrap();
        let built = build_plant(&config).unwrap();

        assert_eq!(built.sensors.len(), 3);
        assert_eq!(built.outdoor_sensor, SensorId::from_index(0));
        assert_eq!(built.plant.circuits().len(), 1);
        assert!(built.plant.heatsource().is_some());
    }

    #[test]
    fn unknown_reference_is_a_build_error() {
        let yaml = YAML.replace("water_sensor: circuit water", "water_sensor: missing");
        let config = from_yaml_str(&yaml).unwrap();
        assert!(matches!(
            build_plant(&config),
            Err(RuntimeError::Build { .. })
        ));
    }
}
