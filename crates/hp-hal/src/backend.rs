//! Backend trait implemented by hardware drivers.

use crate::error::HwResult;
use hp_core::{RelayId, SensorId, Temp};

/// Raw hardware access: temperature acquisition and relay output.
///
/// Implementations are expected to be cheap to poll; the controller
/// reads every configured sensor once per cycle and flushes relay
/// states once per cycle.
pub trait HwBackend {
    /// Latest temperature for `sensor`, or the fault it is in.
    fn read_temperature(&self, sensor: SensorId) -> HwResult<Temp>;

    /// Whether `sensor` exists on this backend at all.
    fn sensor_available(&self, sensor: SensorId) -> bool;

    /// Drive the physical relay output.
    fn write_relay(&mut self, relay: RelayId, on: bool) -> HwResult<()>;
}
