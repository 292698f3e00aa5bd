//! Sample-interval gating for discrete-time laws.

use hp_core::Timestamp;
use std::time::Duration;

/// Tracks when a discrete law last produced a sample and whether enough
/// time has passed for the next one.
#[derive(Clone, Debug, Default)]
pub struct SampleGate {
    last_sample: Option<Timestamp>,
}

impl SampleGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a sample taken at `now` would respect `interval`.
    /// The first call is always ready.
    pub fn ready(&self, now: Timestamp, interval: Duration) -> bool {
        match self.last_sample {
            None => true,
            Some(last) => now.elapsed_since(last) >= interval,
        }
    }

    /// Elapsed time since the last sample, if any.
    pub fn elapsed(&self, now: Timestamp) -> Option<Duration> {
        self.last_sample.map(|last| now.elapsed_since(last))
    }

    /// Record that a sample was taken at `now`.
    pub fn stamp(&mut self, now: Timestamp) {
        self.last_sample = Some(now);
    }

    /// Forget the sampling history (law reset).
    pub fn reset(&mut self) {
        self.last_sample = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sample_always_ready() {
        let gate = SampleGate::new();
        assert!(gate.ready(Timestamp::from_secs(0), Duration::from_secs(10)));
    }

    #[test]
    fn respects_interval() {
        let mut gate = SampleGate::new();
        let intvl = Duration::from_secs(10);
        gate.stamp(Timestamp::from_secs(100));
        assert!(!gate.ready(Timestamp::from_secs(105), intvl));
        assert!(gate.ready(Timestamp::from_secs(110), intvl));
    }
}
