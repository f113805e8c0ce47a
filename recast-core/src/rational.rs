//! Rational number and time-base arithmetic.
//!
//! Timestamps coming out of a demuxer or encoder are integers counted in a
//! stream-specific time base (a rational number of seconds per tick).
//! Moving a timestamp between two time bases is a widening multiply/divide;
//! the muxing path additionally needs round-to-nearest behaviour.

use std::cmp::Ordering;
use std::fmt;

/// Sentinel for an undefined timestamp, mirroring the codec library's
/// "no PTS" value.
pub const NOPTS: i64 = i64::MIN;

/// Rounding mode for timestamp rescaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    /// Truncate toward zero.
    Zero,
    /// Round to the nearest representable value, halfway cases away from
    /// zero.
    NearInf,
}

/// A rational number represented as a numerator and denominator.
///
/// Used for time bases, frame rates and aspect ratios. The denominator is
/// kept positive.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rational {
    /// Numerator.
    pub num: i64,
    /// Denominator (always positive).
    pub den: i64,
}

impl Rational {
    /// Create a new rational number.
    ///
    /// # Panics
    ///
    /// Panics if the denominator is zero.
    pub fn new(num: i64, den: i64) -> Self {
        assert!(den != 0, "denominator cannot be zero");
        let (num, den) = if den < 0 { (-num, -den) } else { (num, den) };
        Self { num, den }
    }

    /// A zero rational.
    pub const fn zero() -> Self {
        Self { num: 0, den: 1 }
    }

    /// Check whether this rational is zero.
    pub fn is_zero(&self) -> bool {
        self.num == 0
    }

    /// Reduce to simplest form.
    pub fn reduce(&self) -> Self {
        if self.num == 0 {
            return Self { num: 0, den: 1 };
        }
        let g = gcd(self.num.unsigned_abs(), self.den.unsigned_abs()) as i64;
        Self {
            num: self.num / g,
            den: self.den / g,
        }
    }

    /// Convert to f64.
    pub fn to_f64(&self) -> f64 {
        self.num as f64 / self.den as f64
    }

    /// Invert this rational.
    ///
    /// # Panics
    ///
    /// Panics if the numerator is zero.
    pub fn invert(&self) -> Self {
        assert!(self.num != 0, "cannot invert zero");
        Self::new(self.den, self.num)
    }
}

impl Default for Rational {
    fn default() -> Self {
        Self::zero()
    }
}

impl fmt::Debug for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rational({}/{})", self.num, self.den)
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

impl PartialOrd for Rational {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Rational {
    fn cmp(&self, other: &Self) -> Ordering {
        let lhs = self.num as i128 * other.den as i128;
        let rhs = other.num as i128 * self.den as i128;
        lhs.cmp(&rhs)
    }
}

impl From<(i32, i32)> for Rational {
    fn from((num, den): (i32, i32)) -> Self {
        Self::new(num as i64, den as i64)
    }
}

/// A stream time base: seconds per timestamp tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeBase(pub Rational);

impl TimeBase {
    /// Create a time base from numerator and denominator.
    pub fn new(num: i64, den: i64) -> Self {
        Self(Rational::new(num, den))
    }

    /// Millisecond time base (1/1000), the Matroska default.
    pub const MILLIS: Self = Self(Rational { num: 1, den: 1000 });

    /// Rescale a timestamp from this time base into `target`, truncating
    /// toward zero. `NOPTS` passes through unchanged.
    pub fn rescale(&self, value: i64, target: TimeBase) -> i64 {
        self.rescale_rnd(value, target, Rounding::Zero)
    }

    /// Rescale a timestamp from this time base into `target` with the given
    /// rounding mode. `NOPTS` passes through unchanged.
    pub fn rescale_rnd(&self, value: i64, target: TimeBase, rounding: Rounding) -> i64 {
        if value == NOPTS {
            return NOPTS;
        }
        let num = value as i128 * self.0.num as i128 * target.0.den as i128;
        let den = self.0.den as i128 * target.0.num as i128;
        debug_assert!(den > 0);
        match rounding {
            Rounding::Zero => (num / den) as i64,
            Rounding::NearInf => {
                if num >= 0 {
                    ((num + den / 2) / den) as i64
                } else {
                    (-((-num + den / 2) / den)) as i64
                }
            }
        }
    }

    /// Convert a timestamp in this time base to whole milliseconds.
    pub fn to_millis(&self, value: i64) -> i64 {
        (1000.0 * value as f64 * self.0.num as f64 / self.0.den as f64) as i64
    }

    /// The time base as a rational.
    pub fn as_rational(&self) -> Rational {
        self.0
    }
}

impl Default for TimeBase {
    fn default() -> Self {
        Self::MILLIS
    }
}

impl From<Rational> for TimeBase {
    fn from(r: Rational) -> Self {
        Self(r)
    }
}

impl fmt::Display for TimeBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}
