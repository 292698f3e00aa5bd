//! In-memory backend for tests and dry runs.

use crate::backend::HwBackend;
use crate::error::{HwError, HwResult};
use hp_core::{RelayId, SensorId, Temp};
use std::collections::HashMap;

/// HashMap-backed [`HwBackend`] with settable readings and faults.
#[derive(Default)]
pub struct MockBackend {
    temps: HashMap<SensorId, HwResult<Temp>>,
    relays: HashMap<RelayId, bool>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install or update a sensor reading.
    pub fn set_temperature(&mut self, sensor: SensorId, temp: Temp) {
        self.temps.insert(sensor, Ok(temp));
    }

    /// Put a sensor into a fault state.
    pub fn set_fault(&mut self, sensor: SensorId, fault: HwError) {
        self.temps.insert(sensor, Err(fault));
    }

    /// Remove a sensor entirely (reads become `UnknownSensor`).
    pub fn remove_sensor(&mut self, sensor: SensorId) {
        self.temps.remove(&sensor);
    }

    /// Last state written to a relay output (false if never written).
    pub fn relay_is_on(&self, relay: RelayId) -> bool {
        self.relays.get(&relay).copied().unwrap_or(false)
    }
}

impl HwBackend for MockBackend {
    fn read_temperature(&self, sensor: SensorId) -> HwResult<Temp> {
        match self.temps.get(&sensor) {
            Some(reading) => reading.clone(),
            None => Err(HwError::UnknownSensor(sensor)),
        }
    }

    fn sensor_available(&self, sensor: SensorId) -> bool {
        self.temps.contains_key(&sensor)
    }

    fn write_relay(&mut self, relay: RelayId, on: bool) -> HwResult<()> {
        self.relays.insert(relay, on);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hp_core::celsius;

    #[test]
    fn readings_and_faults() {
        let mut hw = MockBackend::new();
        let s = SensorId::from_index(0);
        hw.set_temperature(s, celsius(21.5));
        assert_eq!(hw.read_temperature(s), Ok(celsius(21.5)));

        hw.set_fault(s, HwError::SensorShort(s));
        assert_eq!(hw.read_temperature(s), Err(HwError::SensorShort(s)));

        let missing = SensorId::from_index(9);
        assert!(!hw.sensor_available(missing));
        assert_eq!(
            hw.read_temperature(missing),
            Err(HwError::UnknownSensor(missing))
        );
    }
}
