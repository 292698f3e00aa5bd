//! Heat source wrapper: the closed set of producer types and the
//! signals they feed back to the plant.

use crate::boiler::Boiler;
use crate::context::CycleContext;
use crate::error::{PlantError, PlantResult};
use crate::pump::Pump;
use hp_core::{RunMode, Temp, Timestamp};
use hp_hal::{Inputs, RelayBank};
use std::time::Duration;

/// Signals a heat source feeds back to the plant each cycle.
#[derive(Clone, Copy, Debug, Default)]
pub struct HsSignals {
    /// No demand: the plant may treat this producer as asleep.
    pub could_sleep: bool,
    /// Critical consumer shift in percent (load shedding / heat dump).
    pub cshift_crit: i32,
    /// Non-critical consumer shift in percent.
    pub cshift_noncrit: i32,
    /// Remaining stop delay consumers should honor after the producer
    /// stops.
    pub target_consumer_sdelay: Duration,
}

/// The producer types the plant knows how to drive.
pub enum HeatSourceKind {
    Boiler(Boiler),
}

pub struct HeatSource {
    name: String,
    runmode: RunMode,
    kind: HeatSourceKind,
    online: bool,
    signals: HsSignals,
}

impl HeatSource {
    pub fn new(name: impl Into<String>, runmode: RunMode, kind: HeatSourceKind) -> Self {
        Self {
            name: name.into(),
            runmode,
            kind,
            online: false,
            signals: HsSignals::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signals(&self) -> &HsSignals {
        &self.signals
    }

    pub fn online(&mut self) -> PlantResult<()> {
        self.signals = HsSignals::default();
        self.online = true;
        Ok(())
    }

    /// Work out this cycle's temperature target from the aggregated
    /// heat request.
    pub fn logic(
        &mut self,
        ctx: &CycleContext,
        inputs: &Inputs,
        heat_request: Option<Temp>,
    ) -> PlantResult<()> {
        if !self.online {
            return Err(PlantError::Offline);
        }
        let mode = self.runmode.resolve(ctx.runmode);
        match &mut self.kind {
            HeatSourceKind::Boiler(boiler) => {
                boiler.logic(mode, ctx, inputs, heat_request, &mut self.signals)
            }
        }
    }

    /// Drive the producer towards its target.
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
        let mode = self.runmode.resolve(ctx.runmode);
        match &mut self.kind {
            HeatSourceKind::Boiler(boiler) => {
                boiler.run(mode, ctx, inputs, relays, pumps, &mut self.signals)
            }
        }
    }

    pub fn offline(
        &mut self,
        now: Timestamp,
        relays: &mut RelayBank,
        pumps: &mut [Pump],
    ) -> PlantResult<()> {
        let res = match &mut self.kind {
            HeatSourceKind::Boiler(boiler) => boiler.offline(now, relays, pumps),
        };
        self.online = false;
        self.signals = HsSignals::default();
        res
    }
}
