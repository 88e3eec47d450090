use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

/// A currency value held as whole cents.
///
/// The authority speaks JSON floats; every conversion from a float rounds
/// to the nearest cent so that comparisons and sums stay exact.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(from = "f64", into = "f64")]
pub struct Amount(i64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Rounds half away from zero. Non-finite input maps to zero.
    pub fn from_f64(value: f64) -> Self {
        if !value.is_finite() {
            return Self::ZERO;
        }
        Self(round_scaled(value * 100.0))
    }

    pub fn cents(self) -> i64 {
        self.0
    }

    pub fn as_f64(self) -> f64 {
        self.0 as f64 / 100.0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    /// `self × multiplier`, rounded to the cent.
    pub fn times(self, multiplier: f64) -> Amount {
        if !multiplier.is_finite() {
            return Self::ZERO;
        }
        Self(round_scaled(self.0 as f64 * multiplier))
    }
}

// Nudges values like 1462.4999999 (from 14.625 * 100) back onto the half.
fn round_scaled(scaled: f64) -> i64 {
    (scaled + scaled.signum() * 1e-7).round() as i64
}

impl From<f64> for Amount {
    fn from(value: f64) -> Self {
        Amount::from_f64(value)
    }
}

impl From<Amount> for f64 {
    fn from(value: Amount) -> Self {
        value.as_f64()
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Amount) -> Amount {
        Amount(self.0 + rhs.0)
    }
}

impl Sub for Amount {
    type Output = Amount;

    fn sub(self, rhs: Amount) -> Amount {
        Amount(self.0 - rhs.0)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}
