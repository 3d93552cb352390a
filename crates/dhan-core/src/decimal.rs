//! Precision-safe decimal price type.
//!
//! Uses `rust_decimal` for exact decimal arithmetic, avoiding
//! floating-point rounding errors when comparing target, stop-loss
//! and trigger levels.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Div, Mul, Sub};
use std::str::FromStr;

/// Price with exact decimal precision.
///
/// Serialized as a JSON number so broker payloads carry `1500.5`
/// rather than `"1500.5"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(#[serde(with = "rust_decimal::serde::float")] pub Decimal);

impl Price {
    pub const ZERO: Self = Self(Decimal::ZERO);

    #[inline]
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    #[inline]
    pub fn inner(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    /// Inclusive band `[self·(1−tol/100), self·(1+tol/100)]` around this price.
    ///
    /// # Arguments
    /// * `tolerance_pct` - Band half-width in percent (e.g. `0.5` for ±0.5%)
    pub fn tolerance_band(&self, tolerance_pct: Decimal) -> (Price, Price) {
        let frac = tolerance_pct / Decimal::ONE_HUNDRED;
        (
            Self(self.0 * (Decimal::ONE - frac)),
            Self(self.0 * (Decimal::ONE + frac)),
        )
    }

    /// Whether `other` lies inside the tolerance band around this price.
    pub fn within_band(&self, other: Price, tolerance_pct: Decimal) -> bool {
        let (lower, upper) = self.tolerance_band(tolerance_pct);
        other >= lower && other <= upper
    }

    /// Parse from a float received on the wire.
    pub fn from_f64(value: f64) -> Option<Self> {
        Decimal::try_from(value).ok().map(|d| Self(d.normalize()))
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Price {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

impl From<Decimal> for Price {
    fn from(d: Decimal) -> Self {
        Self(d)
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Price {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl Mul<Decimal> for Price {
    type Output = Self;

    fn mul(self, rhs: Decimal) -> Self::Output {
        Self(self.0 * rhs)
    }
}

impl Div<Decimal> for Price {
    type Output = Self;

    fn div(self, rhs: Decimal) -> Self::Output {
        Self(self.0 / rhs)
    }
}
