//! Stateful relays: ownership, minimum-state-time enforcement and wear
//! accounting.
//!
//! Components never drive outputs directly. They claim a relay once at
//! configuration time, request states through [`RelayBank::set_state`]
//! during the cycle, and the bank flushes the resulting states to the
//! backend once per cycle.

use crate::backend::HwBackend;
use crate::error::{HwError, HwResult};
use hp_core::{RelayId, Timestamp};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Wear counters, persisted across controller restarts.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayCounters {
    /// Number of turn-ons over the relay's recorded lifetime.
    pub cycles: u32,
    /// Total time spent on.
    pub on_tottime: Duration,
    /// Total time spent off.
    pub off_tottime: Duration,
}

#[derive(Debug)]
struct Relay {
    owner: Option<String>,
    is_on: bool,
    /// Instant of the last state flip.
    since: Timestamp,
    /// Time spent in the current state, refreshed on access.
    state_time: Duration,
    counters: RelayCounters,
}

impl Relay {
    fn new() -> Self {
        Self {
            owner: None,
            is_on: false,
            since: Timestamp::ZERO,
            state_time: Duration::ZERO,
            counters: RelayCounters::default(),
        }
    }
}

/// All relays known to the controller, indexed by [`RelayId`].
pub struct RelayBank {
    relays: Vec<Relay>,
}

impl RelayBank {
    /// A bank of `count` unclaimed relays, all off.
    pub fn new(count: u32) -> Self {
        Self {
            relays: (0..count).map(|_| Relay::new()).collect(),
        }
    }

    fn relay_mut(&mut self, id: RelayId) -> HwResult<&mut Relay> {
        self.relays
            .get_mut(id.index() as usize)
            .ok_or(HwError::UnknownRelay(id))
    }

    /// Claim exclusive ownership of a relay. Fails if another owner
    /// already holds it.
    pub fn claim(&mut self, id: RelayId, owner: &str) -> HwResult<()> {
        let relay = self.relay_mut(id)?;
        match &relay.owner {
            Some(existing) => Err(HwError::Claimed {
                id,
                owner: existing.clone(),
            }),
            None => {
                relay.owner = Some(owner.to_string());
                tracing::debug!(relay = %id, owner, "relay claimed");
                Ok(())
            }
        }
    }

    /// Release a claim. Leaves the relay off.
    pub fn release(&mut self, id: RelayId) -> HwResult<()> {
        let relay = self.relay_mut(id)?;
        relay.owner = None;
        Ok(())
    }

    /// Request a relay state, enforcing `min_state_time` in the current
    /// state before a flip.
    ///
    /// Returns `Ok(Duration::ZERO)` when the request took effect (or was
    /// already in effect), or the remaining wait when the relay has not
    /// yet spent `min_state_time` in its current state. The wait is
    /// advisory: the caller retries on a later cycle.
    pub fn set_state(
        &mut self,
        id: RelayId,
        now: Timestamp,
        on: bool,
        min_state_time: Duration,
    ) -> HwResult<Duration> {
        let relay = self.relay_mut(id)?;
        if relay.owner.is_none() {
            return Err(HwError::NotConfigured(id));
        }

        relay.state_time = now.elapsed_since(relay.since);
        if on == relay.is_on {
            return Ok(Duration::ZERO);
        }
        if relay.state_time < min_state_time {
            return Ok(min_state_time - relay.state_time);
        }

        if on {
            relay.counters.cycles += 1;
            relay.counters.off_tottime += relay.state_time;
        } else {
            relay.counters.on_tottime += relay.state_time;
        }
        relay.is_on = on;
        relay.since = now;
        relay.state_time = Duration::ZERO;
        tracing::debug!(relay = %id, on, "relay switched");
        Ok(Duration::ZERO)
    }

    /// Current state, refreshing the relay's time-in-state.
    pub fn is_on(&mut self, id: RelayId, now: Timestamp) -> HwResult<bool> {
        let relay = self.relay_mut(id)?;
        relay.state_time = now.elapsed_since(relay.since);
        Ok(relay.is_on)
    }

    /// Time spent in the current state as of `now`.
    pub fn state_time(&mut self, id: RelayId, now: Timestamp) -> HwResult<Duration> {
        let relay = self.relay_mut(id)?;
        relay.state_time = now.elapsed_since(relay.since);
        Ok(relay.state_time)
    }

    pub fn counters(&self, id: RelayId) -> HwResult<&RelayCounters> {
        self.relays
            .get(id.index() as usize)
            .map(|r| &r.counters)
            .ok_or(HwError::UnknownRelay(id))
    }

    /// Write every relay state to the backend. Keeps going past
    /// individual output failures and reports the first one.
    pub fn flush(&self, backend: &mut dyn HwBackend) -> HwResult<()> {
        let mut first_err = None;
        for (index, relay) in self.relays.iter().enumerate() {
            let id = RelayId::from_index(index as u32);
            if let Err(e) = backend.write_relay(id, relay.is_on) {
                tracing::error!(relay = %id, error = %e, "relay output failed");
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Counter snapshot for persistence, one entry per relay.
    pub fn snapshot_counters(&self) -> Vec<RelayCounters> {
        self.relays.iter().map(|r| r.counters.clone()).collect()
    }

    /// Restore persisted counters. Entries beyond the configured relay
    /// count are ignored (the plant shrank since the snapshot).
    pub fn restore_counters(&mut self, counters: Vec<RelayCounters>) {
        for (relay, saved) in self.relays.iter_mut().zip(counters) {
            relay.counters = saved;
        }
    }
}
