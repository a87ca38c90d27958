//! Fixed-point monetary amount with 2 decimal places.
//!
//! Wallet balances, book prices and rental fees are all `Money`. Values are
//! kept at a constant scale so ledger sums never drift.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Sub};
use std::str::FromStr;

/// A monetary amount held at exactly 2 decimal places.
///
/// # Examples
///
/// ```
/// use std::str::FromStr;
/// use bookmarket::Money;
///
/// let price = Money::from_str("12.5").unwrap();
/// assert_eq!(price.to_string(), "12.50");
/// assert_eq!(price.times(3).unwrap().to_string(), "37.50");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Money(Decimal);

impl Money {
    /// Number of decimal places kept.
    pub const SCALE: u32 = 2;

    pub const ZERO: Self = Money(Decimal::ZERO);

    /// Wraps a `Decimal`, rescaling it to 2 decimal places.
    pub fn new(value: Decimal) -> Self {
        let mut normalized = value;
        normalized.rescale(Self::SCALE);
        Money(normalized)
    }

    /// Whole currency units, e.g. `Money::from_units(5)` is `5.00`.
    pub fn from_units(units: i64) -> Self {
        Money::new(Decimal::from(units))
    }

    /// Amount expressed in cents, e.g. `Money::from_cents(1999)` is `19.99`.
    pub fn from_cents(cents: i64) -> Self {
        Money::new(Decimal::new(cents, Self::SCALE))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns `true` for amounts strictly greater than zero.
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    /// Multiplies by a whole count (e.g. a daily fee by a number of days).
    ///
    /// Returns `None` on overflow.
    pub fn times(self, count: u32) -> Option<Self> {
        self.0.checked_mul(Decimal::from(count)).map(Money::new)
    }

    /// Addition that returns `None` instead of overflowing.
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Money::new)
    }

    /// Subtraction that refuses to go below zero.
    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        if self < rhs {
            return None;
        }
        Some(self - rhs)
    }
}

impl FromStr for Money {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let decimal = Decimal::from_str(s.trim())?;
        Ok(Money::new(decimal))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Money::new(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Money::new(self.0 - rhs.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

impl Serialize for Money {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Money::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str_normalizes_scale() {
        assert_eq!(Money::from_str("1").unwrap().to_string(), "1.00");
        assert_eq!(Money::from_str("1.5").unwrap().to_string(), "1.50");
        assert_eq!(Money::from_str("  2.25  ").unwrap().to_string(), "2.25");
    }

    #[test]
    fn test_units_and_cents_constructors() {
        assert_eq!(Money::from_units(7).to_string(), "7.00");
        assert_eq!(Money::from_cents(1999).to_string(), "19.99");
        assert_eq!(Money::from_cents(1999), Money::from_str("19.99").unwrap());
    }

    #[test]
    fn test_arithmetic_preserves_scale() {
        let a = Money::from_str("1.25").unwrap();
        let b = Money::from_str("2.5").unwrap();

        assert_eq!((a + b).to_string(), "3.75");
        assert_eq!((b - a).to_string(), "1.25");
        assert_eq!((a + b - Money::from_units(1)).to_string(), "2.75");
    }

    #[test]
    fn test_checked_add_reports_overflow() {
        let a = Money::from_str("1.25").unwrap();
        assert_eq!(a.checked_add(a), Some(Money::from_str("2.50").unwrap()));

        let huge = Money::from_str("50000000000000000000000000000").unwrap();
        assert_eq!(huge.checked_add(huge), None);
    }

    #[test]
    fn test_times_multiplies_daily_fee() {
        let fee = Money::from_str("1.75").unwrap();
        assert_eq!(fee.times(14).unwrap().to_string(), "24.50");
        assert_eq!(fee.times(0).unwrap(), Money::ZERO);
    }

    #[test]
    fn test_checked_sub_never_goes_negative() {
        let ten = Money::from_units(10);
        assert_eq!(ten.checked_sub(Money::from_units(10)), Some(Money::ZERO));
        assert_eq!(ten.checked_sub(Money::from_cents(1001)), None);
    }

    #[test]
    fn test_sign_predicates() {
        assert!(Money::ZERO.is_zero());
        assert!(!Money::ZERO.is_positive());
        assert!(Money::from_cents(1).is_positive());
        assert!(Money::from_str("-0.01").unwrap().is_negative());
    }

    #[test]
    fn test_sum() {
        let total: Money = ["1.10", "2.20", "3.30"]
            .iter()
            .map(|s| Money::from_str(s).unwrap())
            .sum();
        assert_eq!(total.to_string(), "6.60");
    }
}
