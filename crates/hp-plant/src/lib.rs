//! hp-plant: the heating plant entities and their orchestrator.
//!
//! Contains:
//! - pump (relay-driven circulator with cooldown bookkeeping)
//! - valve (three-way mixing valve: position integration + control laws)
//! - circuit (weather-compensated heating circuit)
//! - boiler / heatsource (burner hysteresis, antifreeze, load shedding)
//! - dhwt (domestic hot water tank charging)
//! - plant (per-cycle orchestration, failure isolation, aggregation)
//!
//! Entities are plain structs addressed by typed ids into the plant's
//! vectors. Every `logic`/`run` call receives the cycle context and the
//! hardware snapshot explicitly; nothing here touches a clock or a
//! backend directly.

pub mod boiler;
pub mod circuit;
pub mod context;
pub mod dhwt;
pub mod error;
pub mod heatsource;
pub mod plant;
pub mod pump;
pub mod valve;

pub use boiler::{Boiler, BoilerParams, IdleMode, CSHIFT_MAX};
pub use circuit::{AmbientSetpoints, CircuitParams, HCircuit, OuthoffSettings};
pub use context::{CycleContext, OutdoorConditions};
pub use dhwt::{Dhwt, DhwtChargeState, DhwtParams, DhwtSetpoints};
pub use error::{PlantError, PlantResult};
pub use heatsource::{HeatSource, HeatSourceKind, HsSignals};
pub use plant::{CycleReport, Plant};
pub use pump::Pump;
pub use valve::{Motion, Valve, ValveParams, ValveSensors};
