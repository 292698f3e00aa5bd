//! Configuration validation logic.
//!
//! Checks run before any hardware is touched: duplicate names, dangling
//! references, relays claimed twice and parameter combinations the
//! control laws cannot work with.

use crate::schema::{
    BoilerDef, CircuitDef, Config, DhwtDef, TempLawDef, ValveAlgoDef, ValveDef, CONFIG_VERSION,
};
use std::collections::HashSet;

#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("Duplicate name: {name} in {context}")]
    DuplicateName { name: String, context: String },

    #[error("Missing reference: {name} in {context}")]
    MissingReference { name: String, context: String },

    #[error("Relay {name} claimed by both {first} and {second}")]
    RelayConflict {
        name: String,
        first: String,
        second: String,
    },

    #[error("Invalid value: {field} = {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Unsupported version: {version}")]
    UnsupportedVersion { version: u32 },
}

/// Bookkeeping for exclusive relay ownership.
struct RelayClaims<'a> {
    claims: Vec<(&'a str, String)>,
}

impl<'a> RelayClaims<'a> {
    fn new() -> Self {
        Self { claims: Vec::new() }
    }

    fn claim(&mut self, relay: &'a str, owner: String) -> Result<(), ValidationError> {
        if let Some((_, first)) = self.claims.iter().find(|(name, _)| *name == relay) {
            return Err(ValidationError::RelayConflict {
                name: relay.to_string(),
                first: first.clone(),
                second: owner,
            });
        }
        self.claims.push((relay, owner));
        Ok(())
    }
}

pub fn validate_config(config: &Config) -> Result<(), ValidationError> {
    if config.version > CONFIG_VERSION {
        return Err(ValidationError::UnsupportedVersion {
            version: config.version,
        });
    }
    if config.loop_period_s == 0 {
        return Err(ValidationError::InvalidValue {
            field: "loop_period_s".to_string(),
            value: "0".to_string(),
            reason: "must be at least one second".to_string(),
        });
    }

    let sensors = unique_names(config.sensors.iter().map(|s| s.name.as_str()), "sensors")?;
    let relays = unique_names(config.relays.iter().map(|r| r.name.as_str()), "relays")?;
    let pumps = unique_names(config.pumps.iter().map(|p| p.name.as_str()), "pumps")?;
    let valves = unique_names(config.valves.iter().map(|v| v.name.as_str()), "valves")?;
    unique_names(config.circuits.iter().map(|c| c.name.as_str()), "circuits")?;
    unique_names(config.dhwts.iter().map(|d| d.name.as_str()), "dhwts")?;

    if !sensors.contains(config.building.outdoor_sensor.as_str()) {
        return Err(ValidationError::MissingReference {
            name: config.building.outdoor_sensor.clone(),
            context: "building outdoor_sensor".to_string(),
        });
    }
    if config.building.tau_s == 0 {
        return Err(ValidationError::InvalidValue {
            field: "building tau_s".to_string(),
            value: "0".to_string(),
            reason: "must be positive".to_string(),
        });
    }
    if config.building.limit_tfrost_c >= config.building.limit_tsummer_c {
        return Err(ValidationError::InvalidValue {
            field: "building limit_tfrost_c".to_string(),
            value: config.building.limit_tfrost_c.to_string(),
            reason: "must be below limit_tsummer_c".to_string(),
        });
    }

    let mut claims = RelayClaims::new();

    for pump in &config.pumps {
        require(&relays, &pump.relay, format!("pump '{}' relay", pump.name))?;
        claims.claim(&pump.relay, format!("pump '{}'", pump.name))?;
    }

    for valve in &config.valves {
        validate_valve(valve, &sensors, &relays)?;
        claims.claim(&valve.relay_open, format!("valve '{}'", valve.name))?;
        claims.claim(&valve.relay_close, format!("valve '{}'", valve.name))?;
    }

    for circuit in &config.circuits {
        validate_circuit(circuit, &sensors, &valves, &pumps)?;
    }

    if let Some(boiler) = &config.boiler {
        validate_boiler(boiler, &sensors, &relays, &pumps)?;
        claims.claim(&boiler.burner_relay, format!("boiler '{}'", boiler.name))?;
    }

    for dhwt in &config.dhwts {
        validate_dhwt(dhwt, &sensors, &relays, &pumps)?;
        if let Some(heater) = &dhwt.selfheater {
            claims.claim(heater, format!("dhwt '{}'", dhwt.name))?;
        }
    }

    for entry in &config.schedule {
        if entry.weekday > 6 || entry.hour > 23 || entry.minute > 59 {
            return Err(ValidationError::InvalidValue {
                field: "schedule entry".to_string(),
                value: format!(
                    "weekday {} {:02}:{:02}",
                    entry.weekday, entry.hour, entry.minute
                ),
                reason: "weekday must be 0-6 (0 = Sunday), time must be valid".to_string(),
            });
        }
    }

    Ok(())
}

fn validate_valve(
    valve: &ValveDef,
    sensors: &HashSet<&str>,
    relays: &HashSet<&str>,
) -> Result<(), ValidationError> {
    let ctx = |what: &str| format!("valve '{}' {}", valve.name, what);
    require(relays, &valve.relay_open, ctx("relay_open"))?;
    require(relays, &valve.relay_close, ctx("relay_close"))?;
    require(sensors, &valve.outlet_sensor, ctx("outlet_sensor"))?;
    if let Some(sensor) = &valve.inlet_hot_sensor {
        require(sensors, sensor, ctx("inlet_hot_sensor"))?;
    }
    if let Some(sensor) = &valve.inlet_cold_sensor {
        require(sensors, sensor, ctx("inlet_cold_sensor"))?;
    }
    if valve.relay_open == valve.relay_close {
        return Err(ValidationError::InvalidValue {
            field: ctx("relay_close"),
            value: valve.relay_close.clone(),
            reason: "open and close must drive different relays".to_string(),
        });
    }

    if valve.ete_time_s == 0 {
        return Err(ValidationError::InvalidValue {
            field: ctx("ete_time_s"),
            value: "0".to_string(),
            reason: "full-travel time must be positive".to_string(),
        });
    }
    if valve.deadband_pmil >= 1000 {
        return Err(ValidationError::InvalidValue {
            field: ctx("deadband_pmil"),
            value: valve.deadband_pmil.to_string(),
            reason: "must be below full travel (1000)".to_string(),
        });
    }
    validate_non_negative_finite(&ctx("deadzone_k"), valve.deadzone_k)?;

    match &valve.algo {
        ValveAlgoDef::BangBang => {}
        ValveAlgoDef::SApprox {
            sample_intvl_s,
            amount_pmil,
        } => {
            if *sample_intvl_s == 0 {
                return Err(ValidationError::InvalidValue {
                    field: ctx("algo sample_intvl_s"),
                    value: "0".to_string(),
                    reason: "must be positive".to_string(),
                });
            }
            if !(1..=100).contains(amount_pmil) {
                return Err(ValidationError::InvalidValue {
                    field: ctx("algo amount_pmil"),
                    value: amount_pmil.to_string(),
                    reason: "must be in 1..=100".to_string(),
                });
            }
        }
        ValveAlgoDef::Pi {
            sample_intvl_s,
            tu_s,
            ksmax_k,
            tune_f,
            ..
        } => {
            if *sample_intvl_s == 0 || *tu_s == 0 {
                return Err(ValidationError::InvalidValue {
                    field: ctx("algo"),
                    value: format!("sample_intvl_s {} tu_s {}", sample_intvl_s, tu_s),
                    reason: "times must be positive".to_string(),
                });
            }
            // Nyquist: sampling must be at least four times faster than
            // the loop's unit response.
            if *sample_intvl_s * 4 > *tu_s {
                return Err(ValidationError::InvalidValue {
                    field: ctx("algo sample_intvl_s"),
                    value: sample_intvl_s.to_string(),
                    reason: format!("must not exceed tu_s / 4 ({})", tu_s / 4),
                });
            }
            validate_positive_finite(&ctx("algo ksmax_k"), *ksmax_k)?;
            if !(1..=10).contains(tune_f) {
                return Err(ValidationError::InvalidValue {
                    field: ctx("algo tune_f"),
                    value: tune_f.to_string(),
                    reason: "must be in 1..=10".to_string(),
                });
            }
        }
    }
    Ok(())
}

fn validate_law(law: &TempLawDef, circuit: &str) -> Result<(), ValidationError> {
    if law.tout1_c >= law.tout2_c {
        return Err(ValidationError::InvalidValue {
            field: format!("circuit '{}' law tout1_c", circuit),
            value: law.tout1_c.to_string(),
            reason: "first calibration point must be colder than the second".to_string(),
        });
    }
    if law.twater1_c <= law.twater2_c {
        return Err(ValidationError::InvalidValue {
            field: format!("circuit '{}' law twater1_c", circuit),
            value: law.twater1_c.to_string(),
            reason: "water temp must decrease with rising outdoor temp".to_string(),
        });
    }
    if !(100..=200).contains(&law.nh100) {
        return Err(ValidationError::InvalidValue {
            field: format!("circuit '{}' law nh100", circuit),
            value: law.nh100.to_string(),
            reason: "must be in 100..=200".to_string(),
        });
    }
    Ok(())
}

fn validate_circuit(
    circuit: &CircuitDef,
    sensors: &HashSet<&str>,
    valves: &HashSet<&str>,
    pumps: &HashSet<&str>,
) -> Result<(), ValidationError> {
    let ctx = |what: &str| format!("circuit '{}' {}", circuit.name, what);
    require(sensors, &circuit.water_sensor, ctx("water_sensor"))?;
    if let Some(valve) = &circuit.valve {
        require(valves, valve, ctx("valve"))?;
    }
    if let Some(pump) = &circuit.pump {
        require(pumps, pump, ctx("pump"))?;
    }

    if circuit.limit_wtmin_c >= circuit.limit_wtmax_c {
        return Err(ValidationError::InvalidValue {
            field: ctx("limit_wtmin_c"),
            value: circuit.limit_wtmin_c.to_string(),
            reason: "must be below limit_wtmax_c".to_string(),
        });
    }
    if let Some(rorh) = circuit.wtemp_rorh_k {
        validate_positive_finite(&ctx("wtemp_rorh_k"), rorh)?;
    }
    validate_non_negative_finite(&ctx("outhoff hysteresis_k"), circuit.outhoff.hysteresis_k)?;
    validate_law(&circuit.law, &circuit.name)
}

fn validate_boiler(
    boiler: &BoilerDef,
    sensors: &HashSet<&str>,
    relays: &HashSet<&str>,
    pumps: &HashSet<&str>,
) -> Result<(), ValidationError> {
    let ctx = |what: &str| format!("boiler '{}' {}", boiler.name, what);
    require(sensors, &boiler.body_sensor, ctx("body_sensor"))?;
    require(relays, &boiler.burner_relay, ctx("burner_relay"))?;
    if let Some(pump) = &boiler.loadpump {
        require(pumps, pump, ctx("loadpump"))?;
    }

    if boiler.limit_tmin_c >= boiler.limit_tmax_c {
        return Err(ValidationError::InvalidValue {
            field: ctx("limit_tmin_c"),
            value: boiler.limit_tmin_c.to_string(),
            reason: "must be below limit_tmax_c".to_string(),
        });
    }
    if boiler.limit_thardmax_c < boiler.limit_tmax_c {
        return Err(ValidationError::InvalidValue {
            field: ctx("limit_thardmax_c"),
            value: boiler.limit_thardmax_c.to_string(),
            reason: "hard limit must not be below limit_tmax_c".to_string(),
        });
    }
    validate_positive_finite(&ctx("hysteresis_k"), boiler.hysteresis_k)?;
    Ok(())
}

fn validate_dhwt(
    dhwt: &DhwtDef,
    sensors: &HashSet<&str>,
    relays: &HashSet<&str>,
    pumps: &HashSet<&str>,
) -> Result<(), ValidationError> {
    let ctx = |what: &str| format!("dhwt '{}' {}", dhwt.name, what);
    if dhwt.sensor_top.is_none() && dhwt.sensor_bottom.is_none() {
        return Err(ValidationError::InvalidValue {
            field: ctx("sensors"),
            value: "none".to_string(),
            reason: "at least one tank sensor is required".to_string(),
        });
    }
    for sensor in [&dhwt.sensor_top, &dhwt.sensor_bottom, &dhwt.sensor_win]
        .into_iter()
        .flatten()
    {
        require(sensors, sensor, ctx("sensor"))?;
    }
    for pump in [&dhwt.feedpump, &dhwt.recyclepump].into_iter().flatten() {
        require(pumps, pump, ctx("pump"))?;
    }
    if let Some(heater) = &dhwt.selfheater {
        require(relays, heater, ctx("selfheater"))?;
    }

    if dhwt.limit_tmin_c >= dhwt.limit_tmax_c {
        return Err(ValidationError::InvalidValue {
            field: ctx("limit_tmin_c"),
            value: dhwt.limit_tmin_c.to_string(),
            reason: "must be below limit_tmax_c".to_string(),
        });
    }
    validate_positive_finite(&ctx("hysteresis_k"), dhwt.hysteresis_k)?;
    if let Some(legionella) = dhwt.legionella_c {
        if legionella > dhwt.limit_tmax_c {
            return Err(ValidationError::InvalidValue {
                field: ctx("legionella_c"),
                value: legionella.to_string(),
                reason: "must not exceed limit_tmax_c".to_string(),
            });
        }
    }
    Ok(())
}

fn unique_names<'a>(
    names: impl Iterator<Item = &'a str>,
    context: &str,
) -> Result<HashSet<&'a str>, ValidationError> {
    let mut set = HashSet::new();
    for name in names {
        if !set.insert(name) {
            return Err(ValidationError::DuplicateName {
                name: name.to_string(),
                context: context.to_string(),
            });
        }
    }
    Ok(set)
}

fn require(set: &HashSet<&str>, name: &str, context: String) -> Result<(), ValidationError> {
    if set.contains(name) {
        Ok(())
    } else {
        Err(ValidationError::MissingReference {
            name: name.to_string(),
            context,
        })
    }
}

fn validate_positive_finite(field: &str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ValidationError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
            reason: "must be positive and finite".to_string(),
        });
    }
    Ok(())
}

fn validate_non_negative_finite(field: &str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ValidationError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
            reason: "must be non-negative and finite".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::from_yaml_str;

    fn minimal() -> String {
        r#"
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
    algo: { type: SApprox, sample_intvl_s: 30, amount_pmil: 50 }
circuits:
  - name: ground floor
    comfort_c: 20.0
    eco_c: 17.0
    frostfree_c: 7.0
    outhoff: { comfort_c: 18.0, eco_c: 16.0, hysteresis_k: 2.0 }
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
"#
        .to_string()
    }

    #[test]
    fn minimal_config_validates() {
        let config = from_yaml_str(&minimal()).unwrap();
        validate_config(&config).unwrap();
    }

    #[test]
    fn dangling_relay_reference_rejected() {
        let yaml = minimal().replace("relay: pump", "relay: nonexistent");
        let config = from_yaml_str(&yaml).unwrap();
        assert!(matches!(
            validate_config(&config),
            Err(ValidationError::MissingReference { .. })
        ));
    }

    #[test]
    fn double_claimed_relay_rejected() {
        let yaml = minimal().replace("burner_relay: burner", "burner_relay: pump");
        let config = from_yaml_str(&yaml).unwrap();
        assert!(matches!(
            validate_config(&config),
            Err(ValidationError::RelayConflict { .. })
        ));
    }

    #[test]
    fn pi_sampling_must_respect_nyquist() {
        let yaml = minimal().replace(
            "algo: { type: SApprox, sample_intvl_s: 30, amount_pmil: 50 }",
            "algo: { type: Pi, sample_intvl_s: 200, tu_s: 400, td_s: 60, ksmax_k: 40.0 }",
        );
        let config = from_yaml_str(&yaml).unwrap();
        assert!(matches!(
            validate_config(&config),
            Err(ValidationError::InvalidValue { .. })
        ));
    }

    #[test]
    fn inverted_curve_rejected() {
        let yaml = minimal().replace("twater1_c: 66.5", "twater1_c: 20.0");
        let config = from_yaml_str(&yaml).unwrap();
        assert!(matches!(
            validate_config(&config),
            Err(ValidationError::InvalidValue { .. })
        ));
    }

    #[test]
    fn future_version_rejected() {
        let yaml = minimal().replace("version: 1", "version: 99");
        let config = from_yaml_str(&yaml).unwrap();
        assert!(matches!(
            validate_config(&config),
            Err(ValidationError::UnsupportedVersion { .. })
        ));
    }
}
