//! Outdoor temperature damping and the season/frost flags.
//!
//! Three views of the outdoor temperature are maintained:
//! - `t_60`: damped over one minute, rejects sensor spikes
//! - `t_filtered`: damped over the building time constant
//! - `t_attenuated`: `t_filtered` damped once more, models how deep the
//!   building mass has soaked
//!
//! The heating curves run on `t_mix`, the mean of `t_60` and
//! `t_filtered`.

use hp_core::{celsius, expw_mavg, kelvin, Temp, Timestamp};
use hp_plant::OutdoorConditions;
use std::time::Duration;

const SPIKE_TAU: Duration = Duration::from_secs(60);
/// Frost clears this many Kelvin above the trip point.
const FROST_HYSTERESIS_K: f64 = 1.0;

struct Damped {
    t_60: Temp,
    t_filtered: Temp,
    t_attenuated: Temp,
    at: Timestamp,
}

pub struct OutdoorModel {
    tau: Duration,
    limit_tsummer: Temp,
    limit_tfrost: Temp,

    damped: Option<Damped>,
    summer: bool,
    frost: bool,
}

impl OutdoorModel {
    pub fn new(tau: Duration, limit_tsummer: Temp, limit_tfrost: Temp) -> Self {
        Self {
            tau,
            limit_tsummer,
            limit_tfrost,
            damped: None,
            summer: false,
            frost: false,
        }
    }

    /// Fold a raw outdoor reading into the damped views.
    pub fn update(&mut self, now: Timestamp, raw: Temp) -> OutdoorConditions {
        let damped = match self.damped.take() {
            // First reading seeds every view; the building model has no
            // history to be smarter with.
            None => Damped {
                t_60: raw,
                t_filtered: raw,
                t_attenuated: raw,
                at: now,
            },
            Some(mut damped) => {
                let dt = now.elapsed_since(damped.at);
                damped.t_60 = expw_mavg(damped.t_60, raw, SPIKE_TAU, dt);
                damped.t_filtered = expw_mavg(damped.t_filtered, damped.t_60, self.tau, dt);
                damped.t_attenuated =
                    expw_mavg(damped.t_attenuated, damped.t_filtered, self.tau, dt);
                damped.at = now;
                damped
            }
        };

        let t_mix = celsius((damped.t_60.as_celsius() + damped.t_filtered.as_celsius()) / 2.0);
        let temps = [damped.t_60, damped.t_filtered, damped.t_attenuated];

        // Season switches only when every view agrees, so a warm
        // afternoon does not flip a cold building into summer.
        if temps.iter().all(|t| *t > self.limit_tsummer) {
            self.summer = true;
        } else if temps.iter().all(|t| *t < self.limit_tsummer) {
            self.summer = false;
        }

        // Frost watches the fast view: protection must not wait for the
        // building mass to catch up.
        if damped.t_60 <= self.limit_tfrost {
            self.frost = true;
        } else if damped.t_60 > self.limit_tfrost + kelvin(FROST_HYSTERESIS_K) {
            self.frost = false;
        }

        let conditions = OutdoorConditions {
            t_60: damped.t_60,
            t_mix,
            t_att: damped.t_attenuated,
            summer: self.summer,
            frost: self.frost,
        };
        self.damped = Some(damped);
        conditions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hp_core::celsius;

    fn model() -> OutdoorModel {
        OutdoorModel::new(
            Duration::from_secs(10 * 3600),
            celsius(18.0),
            celsius(3.0),
        )
    }

    #[test]
    fn first_sample_seeds_all_views() {
        let mut m = model();
        let out = m.update(Timestamp::from_secs(0), celsius(5.0));
        assert_eq!(out.t_60, celsius(5.0));
        assert_eq!(out.t_mix, celsius(5.0));
        assert_eq!(out.t_att, celsius(5.0));
    }

    #[test]
    fn filtered_views_lag_the_fast_one() {
        let mut m = model();
        let mut out = m.update(Timestamp::from_secs(0), celsius(0.0));
        for i in 1..60 {
            out = m.update(Timestamp::from_secs(60 * i), celsius(10.0));
        }
        // After an hour the spike filter has converged but the
        // building-tau views are still far behind.
        assert!(out.t_60.as_celsius() > 9.9);
        assert!(out.t_att.as_celsius() < 1.0);
        assert!(out.t_mix > out.t_att);
    }

    #[test]
    fn summer_needs_every_view_warm() {
        let mut m = model();
        m.update(Timestamp::from_secs(0), celsius(10.0));
        // Fast view crosses the limit long before the attenuated one.
        let out = m.update(Timestamp::from_secs(3600), celsius(25.0));
        assert!(!out.summer);

        // Hold the warm temperature for days: everything crosses.
        let mut out = out;
        for hour in 2..200 {
            out = m.update(Timestamp::from_secs(3600 * hour), celsius(25.0));
        }
        assert!(out.summer);
    }

    #[test]
    fn frost_trips_fast_and_releases_with_hysteresis() {
        let mut m = model();
        let mut out = m.update(Timestamp::from_secs(0), celsius(5.0));
        for i in 1..30 {
            out = m.update(Timestamp::from_secs(60 * i), celsius(2.0));
        }
        assert!(out.frost);

        // Just above the trip point: still frosty.
        for i in 30..60 {
            out = m.update(Timestamp::from_secs(60 * i), celsius(3.5));
        }
        assert!(out.frost);

        for i in 60..120 {
            out = m.update(Timestamp::from_secs(60 * i), celsius(6.0));
        }
        assert!(!out.frost);
    }
}
