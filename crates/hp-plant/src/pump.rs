//! Circulator pump: a relay with a shutdown cooldown.
//!
//! Requests are latched during the entity passes and applied once per
//! cycle by `run`. The cooldown keeps a pump moving residual heat out
//! of a stopped producer instead of cutting off abruptly.

use crate::error::{PlantError, PlantResult};
use hp_core::{RelayId, Timestamp};
use hp_hal::RelayBank;
use std::time::Duration;

pub struct Pump {
    name: String,
    relay: RelayId,
    cooldown_time: Duration,

    online: bool,
    req_on: bool,
    forced: bool,
    /// Cooldown still to serve on an ongoing off-switch.
    actual_cooldown: Duration,
}

impl Pump {
    pub fn new(name: impl Into<String>, relay: RelayId, cooldown_time: Duration) -> Self {
        Self {
            name: name.into(),
            relay,
            cooldown_time,
            online: false,
            req_on: false,
            forced: false,
            actual_cooldown: Duration::ZERO,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn online(&mut self) -> PlantResult<()> {
        self.req_on = false;
        self.forced = false;
        self.actual_cooldown = Duration::ZERO;
        self.online = true;
        Ok(())
    }

    /// Latch the requested state. `force` bypasses the cooldown on the
    /// next `run` (failsafe paths use this).
    pub fn set_state(&mut self, req_on: bool, force: bool) -> PlantResult<()> {
        if !self.online {
            return Err(PlantError::Offline);
        }
        self.req_on = req_on;
        self.forced = force;
        Ok(())
    }

    pub fn get_state(&self, relays: &mut RelayBank, now: Timestamp) -> PlantResult<bool> {
        if !self.online {
            return Err(PlantError::Offline);
        }
        Ok(relays.is_on(self.relay, now)?)
    }

    /// Apply the latched request to the relay.
    pub fn run(&mut self, now: Timestamp, relays: &mut RelayBank) -> PlantResult<()> {
        if !self.online {
            return Err(PlantError::Offline);
        }

        // An ongoing cooldown keeps its original deadline; otherwise the
        // configured time applies. Turn-ons and forced requests wait for
        // nothing.
        let cooldown = if self.req_on || self.forced {
            Duration::ZERO
        } else if !self.actual_cooldown.is_zero() {
            self.actual_cooldown
        } else {
            self.cooldown_time
        };

        self.actual_cooldown = relays.set_state(self.relay, now, self.req_on, cooldown)?;
        Ok(())
    }

    pub fn offline(&mut self, now: Timestamp, relays: &mut RelayBank) -> PlantResult<()> {
        let res = relays.set_state(self.relay, now, false, Duration::ZERO);
        self.online = false;
        self.req_on = false;
        self.forced = false;
        self.actual_cooldown = Duration::ZERO;
        res?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Pump, RelayBank) {
        let mut relays = RelayBank::new(2);
        let rid = RelayId::from_index(0);
        relays.claim(rid, "pump").unwrap();
        let mut pump = Pump::new("pump", rid, Duration::from_secs(300));
        pump.online().unwrap();
        (pump, relays)
    }

    #[test]
    fn offline_pump_rejects_requests() {
        let rid = RelayId::from_index(0);
        let mut pump = Pump::new("pump", rid, Duration::ZERO);
        assert_eq!(pump.set_state(true, false), Err(PlantError::Offline));
    }

    #[test]
    fn off_request_respects_cooldown() {
        let (mut pump, mut relays) = setup();
        pump.set_state(true, false).unwrap();
        pump.run(Timestamp::from_secs(0), &mut relays).unwrap();
        assert!(pump.get_state(&mut relays, Timestamp::from_secs(0)).unwrap());

        // Too early to stop: the remaining wait is remembered.
        pump.set_state(false, false).unwrap();
        pump.run(Timestamp::from_secs(100), &mut relays).unwrap();
        assert!(pump.get_state(&mut relays, Timestamp::from_secs(100)).unwrap());
        assert_eq!(pump.actual_cooldown, Duration::from_secs(200));

        pump.run(Timestamp::from_secs(300), &mut relays).unwrap();
        assert!(!pump.get_state(&mut relays, Timestamp::from_secs(300)).unwrap());
        assert_eq!(pump.actual_cooldown, Duration::ZERO);
    }

    #[test]
    fn forced_off_skips_cooldown() {
        let (mut pump, mut relays) = setup();
        pump.set_state(true, false).unwrap();
        pump.run(Timestamp::from_secs(0), &mut relays).unwrap();

        pump.set_state(false, true).unwrap();
        pump.run(Timestamp::from_secs(10), &mut relays).unwrap();
        assert!(!pump.get_state(&mut relays, Timestamp::from_secs(10)).unwrap());
    }
}
