//! Fixed-point price arithmetic
//!
//! Uses i64 internally with 6 decimal places, enough for fractional-pip
//! forex quotes. Copy type, checked math, no panics. Keeping prices and
//! profits in fixed point makes the ledger arithmetic exact: profit and
//! slippage figures never pick up float rounding error.

use std::fmt;

/// Fixed-point number with 6 decimal places
/// Stored as i64 where value = real_value * 1_000_000
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct FixedPoint6(i64);

impl FixedPoint6 {
    /// Number of decimal places
    pub const DECIMALS: u8 = 6;

    /// Scale factor (10^6)
    pub const SCALE: i64 = 1_000_000;

    /// Zero
    pub const ZERO: Self = Self(0);

    /// Create from raw i64 value
    #[inline(always)]
    pub const fn from_raw(value: i64) -> Self {
        Self(value)
    }

    /// Get raw i64 value
    #[inline(always)]
    pub const fn as_raw(&self) -> i64 {
        self.0
    }

    /// Create from f64 (config / adapter boundary only)
    /// Returns None if value is NaN, infinite, or out of range
    #[inline]
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        let scaled = (value * Self::SCALE as f64).round();
        if scaled > i64::MAX as f64 || scaled < i64::MIN as f64 {
            return None;
        }
        Some(Self(scaled as i64))
    }

    /// Convert to f64 (for logging/statistics)
    #[inline(always)]
    pub fn to_f64(&self) -> f64 {
        self.0 as f64 / Self::SCALE as f64
    }

    /// Checked addition - returns None on overflow
    #[inline(always)]
    pub const fn checked_add(&self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(result) => Some(Self(result)),
            None => None,
        }
    }

    /// Checked subtraction - returns None on overflow
    #[inline(always)]
    pub const fn checked_sub(&self, other: Self) -> Option<Self> {
        match self.0.checked_sub(other.0) {
            Some(result) => Some(Self(result)),
            None => None,
        }
    }

    /// Scale by a whole number of units (e.g. price difference x trade size).
    /// Exact; returns None on overflow.
    #[inline]
    pub fn scale_by_units(&self, units: i64) -> Option<Self> {
        let product = (self.0 as i128) * (units as i128);
        if product > i64::MAX as i128 || product < i64::MIN as i128 {
            return None;
        }
        Some(Self(product as i64))
    }

    /// Ratio of two fixed-point values as f64 (used for pip conversion).
    /// Returns None on division by zero.
    #[inline]
    pub fn ratio(&self, other: Self) -> Option<f64> {
        if other.0 == 0 {
            return None;
        }
        Some(self.0 as f64 / other.0 as f64)
    }

    /// Returns true if strictly positive
    #[inline(always)]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for FixedPoint6 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let int = abs / Self::SCALE as u64;
        let frac = abs % Self::SCALE as u64;
        write!(f, "{}{}.{:06}", sign, int, frac)
    }
}
