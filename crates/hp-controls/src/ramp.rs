//! Rate-of-rise limiter for water temperature requests.
//!
//! A sudden jump in the requested water temperature (morning boost,
//! mode change) would slam the heat source; the limiter releases the
//! increase gradually, bounded by a configured Kelvin-per-hour slope.
//! Decreasing requests pass through untouched.

use hp_core::{expw_mavg, Temp, TempDelta, Timestamp};
use std::time::Duration;

/// Recompute no finer than this: the filter needs a meaningful dt.
const MIN_STEP: Duration = Duration::from_secs(60);
const ONE_HOUR: Duration = Duration::from_secs(3600);

#[derive(Clone, Copy, Debug)]
pub struct RorhLimiter {
    /// Maximum temperature rise per hour.
    rorh: TempDelta,
    tracked: Option<(Temp, Timestamp)>,
}

impl RorhLimiter {
    pub fn new(rorh: TempDelta) -> Self {
        Self {
            rorh,
            tracked: None,
        }
    }

    /// Limit `requested` based on the measured water temp `current`.
    pub fn limit(&mut self, now: Timestamp, requested: Temp, current: Temp) -> Temp {
        let (tracked, updated) = match self.tracked {
            None => {
                // First sample: start tracking from where the water is.
                self.tracked = Some((current, now));
                (current, now)
            }
            Some(t) => t,
        };

        if requested > tracked {
            let dt = now.elapsed_since(updated);
            let allowed = if dt >= MIN_STEP {
                let next = expw_mavg(tracked, tracked + self.rorh, ONE_HOUR, dt);
                self.tracked = Some((next, now));
                next
            } else {
                tracked
            };
            requested.min(allowed)
        } else {
            // Holding or cooling: follow the water, no limiting needed.
            self.tracked = Some((current, now));
            requested
        }
    }

    pub fn reset(&mut self) {
        self.tracked = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hp_core::{celsius, kelvin};
    use proptest::prelude::*;

    #[test]
    fn step_increase_released_gradually() {
        let mut ramp = RorhLimiter::new(kelvin(10.0));
        let t0 = Timestamp::from_secs(0);

        // Tracking starts at the current water temp.
        let out = ramp.limit(t0, celsius(60.0), celsius(30.0));
        assert_eq!(out.as_celsius(), 30.0);

        // One hour later the release must stay within the slope.
        let out = ramp.limit(Timestamp::from_secs(3600), celsius(60.0), celsius(31.0));
        assert!(out.as_celsius() <= 40.0 + 1e-9);
        assert!(out > celsius(30.0));
    }

    #[test]
    fn decrease_passes_through_and_resets_tracking() {
        let mut ramp = RorhLimiter::new(kelvin(10.0));
        ramp.limit(Timestamp::from_secs(0), celsius(60.0), celsius(50.0));

        let out = ramp.limit(Timestamp::from_secs(120), celsius(40.0), celsius(50.0));
        assert_eq!(out.as_celsius(), 40.0);

        // Tracking restarted at the measured temp: a new rise is
        // limited from there, not from the old envelope.
        let out = ramp.limit(Timestamp::from_secs(3720), celsius(80.0), celsius(50.0));
        assert!(out < celsius(61.0));
    }

    #[test]
    fn sub_minute_calls_do_not_advance_envelope() {
        let mut ramp = RorhLimiter::new(kelvin(10.0));
        ramp.limit(Timestamp::from_secs(0), celsius(60.0), celsius(30.0));
        let a = ramp.limit(Timestamp::from_secs(10), celsius(60.0), celsius(30.0));
        let b = ramp.limit(Timestamp::from_secs(20), celsius(60.0), celsius(30.0));
        assert_eq!(a, b);
    }

    proptest! {
        #[test]
        fn output_never_exceeds_the_request(
            requests in prop::collection::vec(20.0_f64..90.0, 1..30),
            steps in prop::collection::vec(30_u64..7200, 1..30),
        ) {
            let mut ramp = RorhLimiter::new(kelvin(10.0));
            let mut t = 0_u64;
            for (req, step) in requests.iter().zip(steps.iter()) {
                t += step;
                let out = ramp.limit(Timestamp::from_secs(t), celsius(*req), celsius(30.0));
                prop_assert!(out <= celsius(*req));
            }
        }
    }
}
