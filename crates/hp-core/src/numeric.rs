//! Discrete-time numeric helpers shared by the control laws and the
//! outdoor model.

use crate::units::Temp;
use std::time::Duration;

/// One step of a discrete exponentially weighted moving average.
///
/// `filtered - alpha * (filtered - sample)` with `alpha = dt / (tau + dt)`.
/// A zero `dt` leaves the filter untouched; a zero `tau` disables the
/// filter and returns the sample.
pub fn expw_mavg(filtered: Temp, sample: Temp, tau: Duration, dt: Duration) -> Temp {
    if dt.is_zero() {
        return filtered;
    }
    if tau.is_zero() {
        return sample;
    }
    let dt = dt.as_secs_f64();
    let alpha = dt / (tau.as_secs_f64() + dt);
    filtered - (filtered - sample) * alpha
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::celsius;
    use proptest::prelude::*;

    #[test]
    fn zero_dt_is_identity() {
        let f = expw_mavg(
            celsius(10.0),
            celsius(20.0),
            Duration::from_secs(60),
            Duration::ZERO,
        );
        assert_eq!(f.as_celsius(), 10.0);
    }

    #[test]
    fn zero_tau_passes_sample() {
        let f = expw_mavg(
            celsius(10.0),
            celsius(20.0),
            Duration::ZERO,
            Duration::from_secs(1),
        );
        assert_eq!(f.as_celsius(), 20.0);
    }

    #[test]
    fn converges_on_constant_input() {
        let mut f = celsius(0.0);
        for _ in 0..10_000 {
            f = expw_mavg(
                f,
                celsius(20.0),
                Duration::from_secs(60),
                Duration::from_secs(10),
            );
        }
        assert!((f.as_celsius() - 20.0).abs() < 1e-6);
    }

    proptest! {
        #[test]
        fn stays_between_filter_and_sample(
            filt in -50.0_f64..150.0,
            samp in -50.0_f64..150.0,
            tau in 1_u64..100_000,
            dt in 1_u64..10_000,
        ) {
            let out = expw_mavg(
                celsius(filt),
                celsius(samp),
                Duration::from_secs(tau),
                Duration::from_secs(dt),
            )
            .as_celsius();
            let lo = filt.min(samp);
            let hi = filt.max(samp);
            prop_assert!(out >= lo - 1e-9 && out <= hi + 1e-9);
        }
    }
}
