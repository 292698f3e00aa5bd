//! Plant configuration schema.
//!
//! Field naming carries the unit: `_c` Celsius, `_k` Kelvin (deltas),
//! `_s` seconds, `_pmil` per-thousand. Hardware points and entities are
//! referenced by name; the runtime builder resolves names to ids.

use hp_core::RunMode;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const CONFIG_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub version: u32,
    pub name: String,
    /// Main loop period. Entities sample no faster than this.
    #[serde(default = "default_loop_period")]
    pub loop_period_s: u64,
    /// Where persistent state (relay counters, tank state) lives.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<PathBuf>,
    pub defaults: DefaultsDef,
    pub building: BuildingDef,
    #[serde(default)]
    pub sensors: Vec<SensorDef>,
    #[serde(default)]
    pub relays: Vec<RelayDef>,
    #[serde(default)]
    pub pumps: Vec<PumpDef>,
    #[serde(default)]
    pub valves: Vec<ValveDef>,
    #[serde(default)]
    pub circuits: Vec<CircuitDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boiler: Option<BoilerDef>,
    #[serde(default)]
    pub dhwts: Vec<DhwtDef>,
    #[serde(default)]
    pub schedule: Vec<ScheduleEntryDef>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DefaultsDef {
    /// Run mode applied at startup until the scheduler says otherwise.
    pub runmode: RunMode,
    pub dhwmode: RunMode,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BuildingDef {
    pub outdoor_sensor: String,
    /// Building thermal time constant for outdoor damping.
    pub tau_s: u64,
    /// Outdoor temperature above which the plant is in summer.
    pub limit_tsummer_c: f64,
    /// Outdoor temperature below which frost protection engages.
    pub limit_tfrost_c: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SensorDef {
    pub name: String,
    /// Backend channel the sensor is wired to.
    pub channel: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelayDef {
    pub name: String,
    pub channel: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PumpDef {
    pub name: String,
    pub relay: String,
    #[serde(default)]
    pub cooldown_time_s: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValveDef {
    pub name: String,
    pub relay_open: String,
    pub relay_close: String,
    /// Full-travel time between end stops.
    pub ete_time_s: u64,
    /// Minimum actionable course in per-thousand of travel.
    pub deadband_pmil: u16,
    /// Temperature band around the target left uncorrected.
    pub deadzone_k: f64,
    pub outlet_sensor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inlet_hot_sensor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inlet_cold_sensor: Option<String>,
    pub algo: ValveAlgoDef,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ValveAlgoDef {
    BangBang,
    SApprox {
        sample_intvl_s: u64,
        /// Course per sample in per-thousand of travel.
        amount_pmil: u16,
    },
    Pi {
        sample_intvl_s: u64,
        /// Unit step response time of the controlled loop.
        tu_s: u64,
        /// Loop dead time.
        td_s: u64,
        /// Inlet temperature span at full travel.
        ksmax_k: f64,
        /// Aggressiveness, 1 (slowest) to 10 (nominal).
        #[serde(default = "default_tune_f")]
        tune_f: u8,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TempLawDef {
    /// First calibration point (coldest).
    pub tout1_c: f64,
    pub twater1_c: f64,
    /// Second calibration point (warmest).
    pub tout2_c: f64,
    pub twater2_c: f64,
    /// Curve bending in percent; 100 is a straight line.
    #[serde(default = "default_nh100")]
    pub nh100: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CircuitDef {
    pub name: String,
    #[serde(default = "default_runmode")]
    pub runmode: RunMode,
    pub comfort_c: f64,
    pub eco_c: f64,
    pub frostfree_c: f64,
    /// Offset applied to the ambient setpoint.
    #[serde(default)]
    pub t_offset_k: f64,
    #[serde(default)]
    pub outhoff: OuthoffDef,
    pub limit_wtmin_c: f64,
    pub limit_wtmax_c: f64,
    /// Offset added to the water target to form the heat request.
    #[serde(default)]
    pub temp_inoffset_k: f64,
    /// Maximum water temperature rate of rise per hour.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wtemp_rorh_k: Option<f64>,
    pub law: TempLawDef,
    pub water_sensor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valve: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pump: Option<String>,
}

/// Outdoor temperatures above which the circuit shuts down, per mode.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct OuthoffDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comfort_c: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eco_c: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frostfree_c: Option<f64>,
    #[serde(default = "default_outhoff_hysteresis")]
    pub hysteresis_k: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IdleModeDef {
    Never,
    FrostOnly,
    Always,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BoilerDef {
    pub name: String,
    #[serde(default = "default_runmode")]
    pub runmode: RunMode,
    pub idle_mode: IdleModeDef,
    pub hysteresis_k: f64,
    /// Minimum operating temperature (condensation limit).
    pub limit_tmin_c: f64,
    pub limit_tmax_c: f64,
    /// Absolute limit; crossing it is a safety event.
    pub limit_thardmax_c: f64,
    #[serde(default = "default_t_freeze")]
    pub t_freeze_c: f64,
    /// Minimum burner on/off time (anti short-cycle).
    #[serde(default)]
    pub burner_min_time_s: u64,
    /// Stop delay granted to consumers after the burner stops.
    #[serde(default)]
    pub consumer_sdelay_s: u64,
    pub body_sensor: String,
    pub burner_relay: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loadpump: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DhwtDef {
    pub name: String,
    #[serde(default = "default_runmode")]
    pub runmode: RunMode,
    pub comfort_c: f64,
    pub eco_c: f64,
    pub frostfree_c: f64,
    /// Anti-legionella target; absent disables sanitation cycles.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legionella_c: Option<f64>,
    pub hysteresis_k: f64,
    #[serde(default)]
    pub temp_inoffset_k: f64,
    pub limit_tmin_c: f64,
    pub limit_tmax_c: f64,
    /// Maximum feed water temperature (scalding/material limit).
    pub limit_wintmax_c: f64,
    /// Maximum continuous charge time; absent disables the guard.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charge_limit_s: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensor_top: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensor_bottom: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensor_win: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedpump: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recyclepump: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selfheater: Option<String>,
}

/// Weekly schedule entry. Weekday 0 is Sunday.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ScheduleEntryDef {
    pub weekday: u8,
    pub hour: u8,
    pub minute: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runmode: Option<RunMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dhwmode: Option<RunMode>,
    /// Request an anti-legionella charge on every configured tank.
    #[serde(default)]
    pub legionella: bool,
}

fn default_loop_period() -> u64 {
    1
}

fn default_runmode() -> RunMode {
    RunMode::Auto
}

fn default_tune_f() -> u8 {
    10
}

fn default_nh100() -> u16 {
    100
}

fn default_outhoff_hysteresis() -> f64 {
    1.0
}

fn default_t_freeze() -> f64 {
    3.0
}
