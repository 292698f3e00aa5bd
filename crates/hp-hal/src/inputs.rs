//! Per-cycle snapshot of sensor readings.
//!
//! The snapshot is refreshed once at the top of each control cycle and
//! control code only ever reads from it, so every consumer within a
//! cycle sees the same coherent set of values.

use crate::backend::HwBackend;
use crate::error::{HwError, HwResult};
use hp_core::{SensorId, Temp, Timestamp};
use std::collections::HashMap;

#[derive(Default)]
pub struct Inputs {
    readings: HashMap<SensorId, HwResult<Temp>>,
    refreshed_at: Timestamp,
}

impl Inputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-read every listed sensor from the backend. Faults are stored
    /// as faults, never as stale successes.
    pub fn refresh(&mut self, backend: &dyn HwBackend, sensors: &[SensorId], now: Timestamp) {
        self.readings.clear();
        for &sensor in sensors {
            let reading = backend.read_temperature(sensor);
            if let Err(fault) = &reading {
                tracing::warn!(%sensor, %fault, "sensor fault");
            }
            self.readings.insert(sensor, reading);
        }
        self.refreshed_at = now;
    }

    /// The snapshot value for `sensor`.
    pub fn temperature(&self, sensor: SensorId) -> HwResult<Temp> {
        match self.readings.get(&sensor) {
            Some(reading) => reading.clone(),
            None => Err(HwError::UnknownSensor(sensor)),
        }
    }

    pub fn refreshed_at(&self) -> Timestamp {
        self.refreshed_at
    }

    /// Inject a reading directly, bypassing any backend.
    pub fn insert(&mut self, sensor: SensorId, reading: HwResult<Temp>) {
        self.readings.insert(sensor, reading);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockBackend;
    use hp_core::celsius;

    #[test]
    fn snapshot_is_coherent_per_refresh() {
        let mut hw = MockBackend::new();
        let s = SensorId::from_index(0);
        hw.set_temperature(s, celsius(50.0));

        let mut inputs = Inputs::new();
        inputs.refresh(&hw, &[s], Timestamp::from_secs(1));
        assert_eq!(inputs.temperature(s), Ok(celsius(50.0)));

        // Backend moves on; the snapshot does not until refreshed.
        hw.set_temperature(s, celsius(60.0));
        assert_eq!(inputs.temperature(s), Ok(celsius(50.0)));

        inputs.refresh(&hw, &[s], Timestamp::from_secs(2));
        assert_eq!(inputs.temperature(s), Ok(celsius(60.0)));
    }

    #[test]
    fn fault_is_not_a_stale_success() {
        let mut hw = MockBackend::new();
        let s = SensorId::from_index(0);
        hw.set_temperature(s, celsius(50.0));

        let mut inputs = Inputs::new();
        inputs.refresh(&hw, &[s], Timestamp::from_secs(1));

        hw.set_fault(s, HwError::SensorDisconnected(s));
        inputs.refresh(&hw, &[s], Timestamp::from_secs(2));
        assert_eq!(inputs.temperature(s), Err(HwError::SensorDisconnected(s)));
    }
}
