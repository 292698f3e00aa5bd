//! Bilinear outdoor-to-water heating curve.
//!
//! The curve is calibrated by two (outdoor, water) points and bent
//! around an inflection point to account for the non-linearity of
//! radiator output at partial load (nH100 parameter, x100).

use crate::error::{ControlError, ControlResult};
use hp_core::{celsius, Temp};

#[derive(Clone, Copy, Debug)]
pub struct BilinearLaw {
    tout1: f64,
    twater1: f64,
    tout2: f64,
    twater2: f64,
    toutinfl: f64,
    twaterinfl: f64,
    /// Slope of the underlying calibration line; the ambient-target
    /// shift uses this, not the per-segment slopes.
    slope: f64,
}

impl BilinearLaw {
    /// Calibrate from two points with `tout1 < tout2` (and therefore
    /// `twater1 > twater2`: colder outside means hotter water).
    /// `nh100` is the radiator exponent x100; 100 keeps the curve linear.
    pub fn new(
        tout1: Temp,
        twater1: Temp,
        tout2: Temp,
        twater2: Temp,
        nh100: u32,
    ) -> ControlResult<Self> {
        if tout1 >= tout2 {
            return Err(ControlError::Misconfigured {
                what: "bilinear: outdoor calibration points out of order",
            });
        }
        if twater1 <= twater2 {
            return Err(ControlError::Misconfigured {
                what: "bilinear: water calibration points out of order",
            });
        }
        if nh100 < 100 {
            return Err(ControlError::Misconfigured {
                what: "bilinear: nH100 below 100",
            });
        }

        let (tout1, twater1) = (tout1.as_celsius(), twater1.as_celsius());
        let (tout2, twater2) = (tout2.as_celsius(), twater2.as_celsius());

        // Underlying line through the calibration points.
        let slope = (twater2 - twater1) / (tout2 - tout1);
        let offset = twater2 - tout2 * slope;

        // Inflection point: 30% of the way from the outdoor temp that
        // would need 20°C water back toward the cold calibration point,
        // with the water temp bent by the radiator exponent.
        let toutw20c = (20.0 - offset) / slope;
        let toutinfl = toutw20c - 0.30 * (toutw20c - tout1);
        let tlin = toutinfl * slope + offset;
        let twaterinfl = tlin + (tlin - 20.0) * ((nh100 as f64) - 100.0) / 100.0;

        Ok(Self {
            tout1,
            twater1,
            tout2,
            twater2,
            toutinfl,
            twaterinfl,
            slope,
        })
    }

    /// Water temperature for the given (damped) outdoor temperature and
    /// ambient target. The curve is referenced to a 20°C ambient; other
    /// targets shift the output.
    pub fn water_temp(&self, source: Temp, target_ambient: Temp) -> Temp {
        let t = source.as_celsius();

        // Interpolate on the segment the source temp falls on.
        let (x1, y1, x2, y2) = if t < self.toutinfl {
            (self.tout1, self.twater1, self.toutinfl, self.twaterinfl)
        } else {
            (self.toutinfl, self.twaterinfl, self.tout2, self.twater2)
        };
        let water = y1 + (t - x1) * (y2 - y1) / (x2 - x1);

        let shift = (target_ambient.as_celsius() - 20.0) * (1.0 - self.slope);
        celsius(water + shift)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn law() -> BilinearLaw {
        // -5°C outside -> 66.5°C water; 15°C outside -> 27°C water.
        BilinearLaw::new(
            celsius(-5.0),
            celsius(66.5),
            celsius(15.0),
            celsius(27.0),
            130,
        )
        .unwrap()
    }

    #[test]
    fn returns_calibration_points() {
        let law = law();
        let w1 = law.water_temp(celsius(-5.0), celsius(20.0));
        let w2 = law.water_temp(celsius(15.0), celsius(20.0));
        assert!((w1.as_celsius() - 66.5).abs() < 1e-9);
        assert!((w2.as_celsius() - 27.0).abs() < 1e-9);
    }

    #[test]
    fn monotonically_decreasing_in_outdoor_temp() {
        let law = law();
        let mut prev = law.water_temp(celsius(-20.0), celsius(20.0));
        let mut t = -19.0;
        while t <= 25.0 {
            let w = law.water_temp(celsius(t), celsius(20.0));
            assert!(w <= prev, "curve not decreasing at {t}°C");
            prev = w;
            t += 1.0;
        }
    }

    #[test]
    fn curvature_raises_midrange_output() {
        let linear = BilinearLaw::new(
            celsius(-5.0),
            celsius(66.5),
            celsius(15.0),
            celsius(27.0),
            100,
        )
        .unwrap();
        let bent = law();
        // Between the calibration points the bent curve runs hotter.
        let mid = celsius(5.0);
        assert!(
            bent.water_temp(mid, celsius(20.0)) > linear.water_temp(mid, celsius(20.0))
        );
    }

    #[test]
    fn warmer_ambient_target_shifts_up() {
        let law = law();
        let base = law.water_temp(celsius(5.0), celsius(20.0));
        let shifted = law.water_temp(celsius(5.0), celsius(22.0));
        assert!(shifted > base);
    }

    #[test]
    fn ambient_shift_uses_the_calibration_slope() {
        let law = law();
        // Calibration slope is -39.5/20 = -1.975, so a 17°C target
        // shifts by (17-20)*(1-(-1.975)) = -8.925K on both segments.
        for t in [-3.0, 5.0, 14.0] {
            let base = law.water_temp(celsius(t), celsius(20.0));
            let eco = law.water_temp(celsius(t), celsius(17.0));
            assert!(
                (eco.as_celsius() - base.as_celsius() + 8.925).abs() < 1e-9,
                "wrong shift at {t}°C"
            );
        }
    }

    #[test]
    fn continuous_across_the_inflection_for_any_ambient() {
        let law = law();
        // The inflection sits near 11.5°C outdoor for this calibration;
        // a tiny outdoor change must not jump the water target.
        for ambient in [17.0, 20.0, 22.0] {
            let below = law.water_temp(celsius(11.45), celsius(ambient));
            let above = law.water_temp(celsius(11.51), celsius(ambient));
            assert!(
                (below.as_celsius() - above.as_celsius()).abs() < 0.5,
                "discontinuity at ambient {ambient}°C"
            );
        }
    }

    #[test]
    fn rejects_misordered_calibration() {
        assert!(BilinearLaw::new(
            celsius(15.0),
            celsius(27.0),
            celsius(-5.0),
            celsius(66.5),
            100
        )
        .is_err());
    }
}
