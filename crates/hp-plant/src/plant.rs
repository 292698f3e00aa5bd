//! Plant orchestrator.
//!
//! Runs every entity once per cycle in a fixed order (consumers first,
//! producer, then actuators), isolates per-entity failures, and
//! aggregates the shared signals that feed the next cycle's context.

use crate::circuit::HCircuit;
use crate::context::{CycleContext, OutdoorConditions};
use crate::dhwt::Dhwt;
use crate::error::PlantError;
use crate::heatsource::HeatSource;
use crate::pump::Pump;
use crate::valve::Valve;
use hp_core::{PumpId, RunMode, Temp, Timestamp, ValveId};
use hp_hal::{Inputs, RelayBank};
use std::time::Duration;

/// How often and for how long idle actuators are exercised in summer.
const SUMMER_MAINT_INTERVAL: Duration = Duration::from_secs(7 * 24 * 3600);
const SUMMER_MAINT_DURATION: Duration = Duration::from_secs(5 * 60);

/// What one cycle produced, for logging and the next cycle's context.
#[derive(Debug, Default)]
pub struct CycleReport {
    pub failures: Vec<(String, PlantError)>,
    pub heat_request: Option<Temp>,
    pub could_sleep: bool,
    pub consumer_sdelay: Duration,
    pub consumer_shift: i32,
    pub summer_maintenance: bool,
}

#[derive(Default)]
struct SummerMaint {
    active_since: Option<Timestamp>,
    last_done: Option<Timestamp>,
}

pub struct Plant {
    relays: RelayBank,
    pumps: Vec<Pump>,
    valves: Vec<Valve>,
    circuits: Vec<HCircuit>,
    heatsource: Option<HeatSource>,
    dhwts: Vec<Dhwt>,

    // Aggregates carried into the next cycle's context.
    could_sleep: bool,
    consumer_sdelay: Duration,
    consumer_shift: i32,
    summer_maint: SummerMaint,
}

impl Plant {
    pub fn new(relays: RelayBank) -> Self {
        Self {
            relays,
            pumps: Vec::new(),
            valves: Vec::new(),
            circuits: Vec::new(),
            heatsource: None,
            dhwts: Vec::new(),
            could_sleep: false,
            consumer_sdelay: Duration::ZERO,
            consumer_shift: 0,
            summer_maint: SummerMaint::default(),
        }
    }

    pub fn relays(&self) -> &RelayBank {
        &self.relays
    }

    pub fn relays_mut(&mut self) -> &mut RelayBank {
        &mut self.relays
    }

    pub fn add_pump(&mut self, pump: Pump) -> PumpId {
        self.pumps.push(pump);
        PumpId::from_index(self.pumps.len() as u32 - 1)
    }

    pub fn add_valve(&mut self, valve: Valve) -> ValveId {
        self.valves.push(valve);
        ValveId::from_index(self.valves.len() as u32 - 1)
    }

    pub fn add_circuit(&mut self, circuit: HCircuit) {
        self.circuits.push(circuit);
    }

    pub fn set_heatsource(&mut self, heatsource: HeatSource) {
        self.heatsource = Some(heatsource);
    }

    pub fn add_dhwt(&mut self, dhwt: Dhwt) {
        self.dhwts.push(dhwt);
    }

    pub fn valve(&self, id: ValveId) -> Option<&Valve> {
        self.valves.get(id.index() as usize)
    }

    pub fn pump(&self, id: PumpId) -> Option<&Pump> {
        self.pumps.get(id.index() as usize)
    }

    pub fn circuits(&self) -> &[HCircuit] {
        &self.circuits
    }

    pub fn dhwts(&self) -> &[Dhwt] {
        &self.dhwts
    }

    pub fn dhwts_mut(&mut self) -> &mut [Dhwt] {
        &mut self.dhwts
    }

    pub fn heatsource(&self) -> Option<&HeatSource> {
        self.heatsource.as_ref()
    }

    /// Bring every entity online. Walks the whole plant even after
    /// failures; a failed entity stays offline and is reported.
    pub fn online(&mut self, now: Timestamp) -> Vec<(String, PlantError)> {
        let mut failures = Vec::new();
        for pump in &mut self.pumps {
            if let Err(e) = pump.online() {
                failures.push((pump.name().to_string(), e));
            }
        }
        for valve in &mut self.valves {
            if let Err(e) = valve.online(now) {
                failures.push((valve.name().to_string(), e));
            }
        }
        for circuit in &mut self.circuits {
            if let Err(e) = circuit.online() {
                failures.push((circuit.name().to_string(), e));
            }
        }
        if let Some(hs) = &mut self.heatsource {
            if let Err(e) = hs.online() {
                failures.push((hs.name().to_string(), e));
            }
        }
        for dhwt in &mut self.dhwts {
            if let Err(e) = dhwt.online(now) {
                failures.push((dhwt.name().to_string(), e));
            }
        }
        for (name, err) in &failures {
            tracing::error!(entity = %name, error = %err, "failed to come online");
        }
        failures
    }

    /// Take every entity offline, consumers before the producer.
    pub fn offline(&mut self, now: Timestamp) -> Vec<(String, PlantError)> {
        let mut failures = Vec::new();
        for circuit in &mut self.circuits {
            if let Err(e) = circuit.offline(&mut self.valves, &mut self.pumps) {
                failures.push((circuit.name().to_string(), e));
            }
        }
        for dhwt in &mut self.dhwts {
            if let Err(e) = dhwt.offline(now, &mut self.relays, &mut self.pumps) {
                failures.push((dhwt.name().to_string(), e));
            }
        }
        if let Some(hs) = &mut self.heatsource {
            if let Err(e) = hs.offline(now, &mut self.relays, &mut self.pumps) {
                failures.push((hs.name().to_string(), e));
            }
        }
        for valve in &mut self.valves {
            if let Err(e) = valve.offline(now, &mut self.relays) {
                failures.push((valve.name().to_string(), e));
            }
        }
        for pump in &mut self.pumps {
            if let Err(e) = pump.offline(now, &mut self.relays) {
                failures.push((pump.name().to_string(), e));
            }
        }
        failures
    }

    /// One full control cycle.
    pub fn run_cycle(
        &mut self,
        now: Timestamp,
        runmode: RunMode,
        dhwmode: RunMode,
        outdoor: OutdoorConditions,
        inputs: &Inputs,
    ) -> CycleReport {
        let ctx = CycleContext {
            now,
            runmode,
            dhwmode,
            outdoor,
            could_sleep: self.could_sleep,
            consumer_sdelay: self.consumer_sdelay,
            consumer_shift: self.consumer_shift,
        };
        let mut report = CycleReport::default();

        // Consumers first: they produce the heat request the producer
        // answers within the same cycle.
        for circuit in &mut self.circuits {
            let res = circuit.logic(&ctx).and_then(|()| {
                circuit.run(&ctx, inputs, &mut self.valves, &mut self.pumps)
            });
            if let Err(e) = res {
                record(circuit.name(), &e, &mut report.failures);
                if needs_safe_config(&e) {
                    circuit.force_frostfree();
                }
            }
        }
        for dhwt in &mut self.dhwts {
            let res = dhwt
                .logic(&ctx)
                .and_then(|()| dhwt.run(&ctx, inputs, &mut self.relays, &mut self.pumps));
            if let Err(e) = res {
                record(dhwt.name(), &e, &mut report.failures);
                if needs_safe_config(&e) {
                    dhwt.force_frostfree();
                }
            }
        }

        let heat_request = self.aggregate_heat_request();
        report.heat_request = heat_request;

        if let Some(hs) = &mut self.heatsource {
            let res = hs.logic(&ctx, inputs, heat_request).and_then(|()| {
                hs.run(&ctx, inputs, &mut self.relays, &mut self.pumps)
            });
            if let Err(e) = res {
                record(hs.name(), &e, &mut report.failures);
            }
        }

        // Aggregates for the next cycle, derived from the producer.
        match &self.heatsource {
            Some(hs) => {
                let signals = *hs.signals();
                self.could_sleep = signals.could_sleep;
                self.consumer_shift = if signals.cshift_crit != 0 {
                    signals.cshift_crit
                } else {
                    signals.cshift_noncrit
                };
                self.consumer_sdelay = signals.target_consumer_sdelay;
            }
            None => {
                self.could_sleep = true;
                self.consumer_shift = 0;
                self.consumer_sdelay = Duration::ZERO;
            }
        }

        // Exercise idle actuators in summer so they don't seize.
        report.summer_maintenance = self.summer_maintenance(now, outdoor.summer);
        if report.summer_maintenance {
            for valve in &mut self.valves {
                valve.req_open_full();
            }
            for pump in &mut self.pumps {
                let _ = pump.set_state(true, false);
            }
        }

        // Actuators last: apply everything the entity passes latched.
        for valve in &mut self.valves {
            if let Err(e) = valve.run(now, &mut self.relays) {
                record(valve.name(), &e, &mut report.failures);
            }
        }
        for pump in &mut self.pumps {
            if let Err(e) = pump.run(now, &mut self.relays) {
                record(pump.name(), &e, &mut report.failures);
            }
        }

        report.could_sleep = self.could_sleep;
        report.consumer_sdelay = self.consumer_sdelay;
        report.consumer_shift = self.consumer_shift;
        report
    }

    fn aggregate_heat_request(&self) -> Option<Temp> {
        let mut request: Option<Temp> = None;
        for circuit in &self.circuits {
            request = max_opt(request, circuit.heat_request());
        }
        for dhwt in &self.dhwts {
            request = max_opt(request, dhwt.heat_request());
        }
        request
    }

    /// Summer maintenance window bookkeeping. Only advances while the
    /// plant is in summer AND could sleep; any lapse restarts the
    /// interval from scratch.
    fn summer_maintenance(&mut self, now: Timestamp, summer: bool) -> bool {
        if !(summer && self.could_sleep) {
            self.summer_maint.active_since = None;
            self.summer_maint.last_done = Some(now);
            return false;
        }

        match self.summer_maint.active_since {
            Some(start) => {
                if now.elapsed_since(start) >= SUMMER_MAINT_DURATION {
                    self.summer_maint.active_since = None;
                    self.summer_maint.last_done = Some(now);
                    false
                } else {
                    true
                }
            }
            None => {
                let due = match self.summer_maint.last_done {
                    Some(done) => now.elapsed_since(done) >= SUMMER_MAINT_INTERVAL,
                    None => true,
                };
                if due {
                    tracing::info!("summer maintenance run");
                    self.summer_maint.active_since = Some(now);
                }
                due
            }
        }
    }
}

fn record(name: &str, err: &PlantError, failures: &mut Vec<(String, PlantError)>) {
    if err.is_benign() {
        return;
    }
    tracing::warn!(entity = %name, error = %err, "entity failed");
    failures.push((name.to_string(), err.clone()));
}

/// Unhandled, non-safety failures get the entity forced to a safe
/// configuration; safety lockouts must never auto-recover.
fn needs_safe_config(err: &PlantError) -> bool {
    !err.is_benign() && !err.is_handled() && !matches!(err, PlantError::Safety { .. })
}

fn max_opt(a: Option<Temp>, b: Option<Temp>) -> Option<Temp> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, None) => a,
        (None, b) => b,
    }
}
