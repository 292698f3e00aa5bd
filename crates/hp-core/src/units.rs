// hp-core/src/units.rs

use core::fmt;
use core::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

/// Absolute temperature, stored in degrees Celsius.
///
/// `Temp` is an affine quantity: two temperatures subtract to a
/// [`TempDelta`], and only deltas scale. "No value" situations
/// (e.g. no heat request) are expressed as `Option<Temp>`.
#[derive(Clone, Copy, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Temp(f64);

/// Temperature difference in Kelvin.
#[derive(Clone, Copy, Default, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct TempDelta(f64);

#[inline]
pub fn celsius(v: f64) -> Temp {
    Temp(v)
}

#[inline]
pub fn kelvin(v: f64) -> TempDelta {
    TempDelta(v)
}

impl Temp {
    #[inline]
    pub fn as_celsius(self) -> f64 {
        self.0
    }

    #[inline]
    pub fn min(self, other: Temp) -> Temp {
        Temp(self.0.min(other.0))
    }

    #[inline]
    pub fn max(self, other: Temp) -> Temp {
        Temp(self.0.max(other.0))
    }
}

impl TempDelta {
    pub const ZERO: TempDelta = TempDelta(0.0);

    #[inline]
    pub fn as_kelvin(self) -> f64 {
        self.0
    }

    #[inline]
    pub fn abs(self) -> TempDelta {
        TempDelta(self.0.abs())
    }
}

impl Sub for Temp {
    type Output = TempDelta;
    fn sub(self, rhs: Temp) -> TempDelta {
        TempDelta(self.0 - rhs.0)
    }
}

impl Add<TempDelta> for Temp {
    type Output = Temp;
    fn add(self, rhs: TempDelta) -> Temp {
        Temp(self.0 + rhs.0)
    }
}

impl Sub<TempDelta> for Temp {
    type Output = Temp;
    fn sub(self, rhs: TempDelta) -> Temp {
        Temp(self.0 - rhs.0)
    }
}

impl AddAssign<TempDelta> for Temp {
    fn add_assign(&mut self, rhs: TempDelta) {
        self.0 += rhs.0;
    }
}

impl SubAssign<TempDelta> for Temp {
    fn sub_assign(&mut self, rhs: TempDelta) {
        self.0 -= rhs.0;
    }
}

impl Add for TempDelta {
    type Output = TempDelta;
    fn add(self, rhs: TempDelta) -> TempDelta {
        TempDelta(self.0 + rhs.0)
    }
}

impl Sub for TempDelta {
    type Output = TempDelta;
    fn sub(self, rhs: TempDelta) -> TempDelta {
        TempDelta(self.0 - rhs.0)
    }
}

impl Neg for TempDelta {
    type Output = TempDelta;
    fn neg(self) -> TempDelta {
        TempDelta(-self.0)
    }
}

impl Mul<f64> for TempDelta {
    type Output = TempDelta;
    fn mul(self, rhs: f64) -> TempDelta {
        TempDelta(self.0 * rhs)
    }
}

impl Div<f64> for TempDelta {
    type Output = TempDelta;
    fn div(self, rhs: f64) -> TempDelta {
        TempDelta(self.0 / rhs)
    }
}

impl Div for TempDelta {
    type Output = f64;
    fn div(self, rhs: TempDelta) -> f64 {
        self.0 / rhs.0
    }
}

impl fmt::Debug for Temp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}°C", self.0)
    }
}

impl fmt::Display for Temp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}°C", self.0)
    }
}

impl fmt::Debug for TempDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}K", self.0)
    }
}

impl fmt::Display for TempDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}K", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn affine_arithmetic() {
        let a = celsius(60.0);
        let b = celsius(55.0);
        assert_eq!((a - b).as_kelvin(), 5.0);
        assert_eq!((b + kelvin(5.0)).as_celsius(), 60.0);
        assert_eq!((a - kelvin(3.0)).as_celsius(), 57.0);
    }

    #[test]
    fn delta_scaling() {
        let d = kelvin(6.0);
        assert_eq!((d / 2.0).as_kelvin(), 3.0);
        assert_eq!((d * 0.5).as_kelvin(), 3.0);
        assert_eq!(kelvin(10.0) / kelvin(5.0), 2.0);
        assert_eq!((-d).as_kelvin(), -6.0);
    }

    #[test]
    fn ordering() {
        assert!(celsius(20.0) < celsius(21.0));
        assert!(kelvin(-1.0) < TempDelta::ZERO);
    }
}
