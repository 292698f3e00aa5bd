//! Monotonic controller time base.
//!
//! Every periodic operation receives the current [`Timestamp`] explicitly
//! instead of reading a clock, which keeps the control paths deterministic
//! under test. Wall-clock concerns (scheduling) live elsewhere.

use core::ops::Add;
use std::time::Duration;

/// Instant on the controller's monotonic clock, as time since start.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Timestamp(Duration);

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp(Duration::ZERO);

    pub fn from_secs(secs: u64) -> Self {
        Timestamp(Duration::from_secs(secs))
    }

    pub fn since_start(&self) -> Duration {
        self.0
    }

    /// Time elapsed since `earlier`; saturates to zero if `earlier` is in
    /// the future (a clock anomaly, not an error).
    pub fn elapsed_since(&self, earlier: Timestamp) -> Duration {
        self.0.saturating_sub(earlier.0)
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;
    fn add(self, rhs: Duration) -> Timestamp {
        Timestamp(self.0 + rhs)
    }
}
