//! Money type for exact currency arithmetic.
//!
//! `Money` stores an integer number of minor units (cents). Operations that can produce a fraction
//! of a cent (`multiply`, `divide`, `percent`) round half away from zero through `Decimal`, so no
//! binary floating point error is ever stored.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::str::FromStr;

/// Represents an amount of money as an exact count of cents.
///
/// Raw integers convert into `Money` as cents, which lets comparisons take either form.
///
/// # Examples
///
/// ```
/// # use expense_sync::model::Money;
/// # use std::str::FromStr;
/// let price = Money::from_str("12.50").unwrap();
/// assert_eq!(price.cents(), 1250);
/// assert_eq!(price.to_string(), "12.50");
/// assert!(price.greater_than(1000));
/// ```
///
/// Rounding is half away from zero:
///
/// ```
/// # use expense_sync::model::Money;
/// let third = Money::from_cents(100).divide(3.0).unwrap();
/// assert_eq!(third.cents(), 33);
/// let half = Money::from_cents(-5).divide(2.0).unwrap();
/// assert_eq!(half.cents(), -3);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Money {
    cents: i64,
}

impl Money {
    pub const ZERO: Money = Money { cents: 0 };

    /// Creates a new `Money` from a count of cents.
    pub const fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Creates a new `Money` from a value in major units, e.g. `12.5` for 12.50. Fails for NaN and
    /// infinite values.
    pub fn from_major(value: f64) -> Result<Self, MoneyError> {
        let cents = decimal(value)?
            .checked_mul(Decimal::ONE_HUNDRED)
            .ok_or(MoneyError::Overflow)?;
        Self::from_rounded(cents)
    }

    /// The stored count of cents.
    pub const fn cents(&self) -> i64 {
        self.cents
    }

    /// The value in major units as an exact `Decimal`.
    pub fn value(&self) -> Decimal {
        Decimal::new(self.cents, 2)
    }

    /// Returns true if the amount is zero.
    pub const fn is_zero(&self) -> bool {
        self.cents == 0
    }

    /// Returns true if the amount is greater than zero.
    pub const fn is_positive(&self) -> bool {
        self.cents > 0
    }

    /// Returns true if the amount is less than zero.
    pub const fn is_negative(&self) -> bool {
        self.cents < 0
    }

    pub fn checked_add(self, other: Money) -> Result<Money, MoneyError> {
        self.cents
            .checked_add(other.cents)
            .map(Money::from_cents)
            .ok_or(MoneyError::Overflow)
    }

    pub fn checked_sub(self, other: Money) -> Result<Money, MoneyError> {
        self.cents
            .checked_sub(other.cents)
            .map(Money::from_cents)
            .ok_or(MoneyError::Overflow)
    }

    pub fn checked_neg(self) -> Result<Money, MoneyError> {
        self.cents
            .checked_neg()
            .map(Money::from_cents)
            .ok_or(MoneyError::Overflow)
    }

    /// Adds `other`, which may also be given as raw cents. This is the checked counterpart of the
    /// `+` operator, which only takes `Money` and saturates.
    pub fn plus(self, other: impl Into<Money>) -> Result<Money, MoneyError> {
        self.checked_add(other.into())
    }

    pub fn subtract(self, other: impl Into<Money>) -> Result<Money, MoneyError> {
        self.checked_sub(other.into())
    }

    /// Alias of `subtract`.
    pub fn minus(self, other: impl Into<Money>) -> Result<Money, MoneyError> {
        self.subtract(other)
    }

    pub fn negated(self) -> Result<Money, MoneyError> {
        self.checked_neg()
    }

    /// Multiplies by `factor`, rounding to the nearest cent.
    pub fn multiply(self, factor: f64) -> Result<Money, MoneyError> {
        let factor = decimal(factor)?;
        let product = Decimal::from(self.cents)
            .checked_mul(factor)
            .ok_or(MoneyError::Overflow)?;
        Self::from_rounded(product)
    }

    /// Divides by `divisor`, rounding to the nearest cent.
    pub fn divide(self, divisor: f64) -> Result<Money, MoneyError> {
        let divisor = decimal(divisor)?;
        if divisor.is_zero() {
            return Err(MoneyError::DivisionByZero);
        }
        let quotient = Decimal::from(self.cents)
            .checked_div(divisor)
            .ok_or(MoneyError::Overflow)?;
        Self::from_rounded(quotient)
    }

    /// Returns `percent` percent of this amount, rounding to the nearest cent.
    pub fn percent(self, percent: f64) -> Result<Money, MoneyError> {
        let percent = decimal(percent)?;
        let scaled = Decimal::from(self.cents)
            .checked_mul(percent)
            .ok_or(MoneyError::Overflow)?
            / Decimal::ONE_HUNDRED;
        Self::from_rounded(scaled)
    }

    pub fn equals(&self, other: impl Into<Money>) -> bool {
        *self == other.into()
    }

    pub fn less_than(&self, other: impl Into<Money>) -> bool {
        *self < other.into()
    }

    pub fn less_than_or_equal_to(&self, other: impl Into<Money>) -> bool {
        *self <= other.into()
    }

    pub fn greater_than(&self, other: impl Into<Money>) -> bool {
        *self > other.into()
    }

    pub fn greater_than_or_equal_to(&self, other: impl Into<Money>) -> bool {
        *self >= other.into()
    }

    /// Renders `(-)D.DD`. Same as `to_string`, kept for callers that think in terms of fixed
    /// precision.
    pub fn to_fixed(&self) -> String {
        self.to_string()
    }

    /// Renders with thousands separators, e.g. `-1,234.50`. Display only.
    pub fn to_grouped(&self) -> String {
        let sign = if self.is_negative() { "-" } else { "" };
        let abs = self.value().abs();
        format!(
            "{sign}{}",
            format_num::format_num!(",.2", abs.to_f64().unwrap_or_default())
        )
    }

    fn from_rounded(value: Decimal) -> Result<Money, MoneyError> {
        value
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .map(Money::from_cents)
            .ok_or(MoneyError::Overflow)
    }
}

/// Rejects NaN and infinite values before they can reach any arithmetic.
fn finite(value: f64) -> Result<f64, MoneyError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(MoneyError::NotFinite)
    }
}

fn decimal(value: f64) -> Result<Decimal, MoneyError> {
    Decimal::from_f64(finite(value)?).ok_or(MoneyError::Overflow)
}

/// An error that can occur when constructing or operating on `Money`.
pub enum MoneyError {
    NotFinite,
    DivisionByZero,
    Overflow,
    Parse(rust_decimal::Error),
}

impl Debug for MoneyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            MoneyError::NotFinite => f.write_str("NotFinite"),
            MoneyError::DivisionByZero => f.write_str("DivisionByZero"),
            MoneyError::Overflow => f.write_str("Overflow"),
            MoneyError::Parse(e) => Debug::fmt(e, f),
        }
    }
}

impl Display for MoneyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            MoneyError::NotFinite => f.write_str("money values must be finite numbers"),
            MoneyError::DivisionByZero => f.write_str("cannot divide money by zero"),
            MoneyError::Overflow => f.write_str("money value out of range"),
            MoneyError::Parse(e) => write!(f, "invalid money value: {e}"),
        }
    }
}

impl std::error::Error for MoneyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MoneyError::Parse(e) => Some(e),
            _ => None,
        }
    }
}

impl FromStr for Money {
    type Err = MoneyError;

    /// Parses a decimal string in major units, e.g. `"12.5"` or `"-0.99"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = Decimal::from_str(s.trim()).map_err(MoneyError::Parse)?;
        let cents = value
            .checked_mul(Decimal::ONE_HUNDRED)
            .ok_or(MoneyError::Overflow)?;
        Self::from_rounded(cents)
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let sign = if self.is_negative() { "-" } else { "" };
        let abs = self.cents.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl From<i64> for Money {
    fn from(cents: i64) -> Self {
        Money::from_cents(cents)
    }
}

impl From<&Money> for Money {
    fn from(value: &Money) -> Self {
        *value
    }
}

// The operators saturate at the `i64` bounds instead of overflowing. Use the `checked_*`
// methods where an out-of-range result must be reported.

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money::from_cents(self.cents.saturating_add(rhs.cents))
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        *self = *self + rhs;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money::from_cents(self.cents.saturating_sub(rhs.cents))
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Money) {
        *self = *self - rhs;
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Money {
        Money::from_cents(self.cents.saturating_neg())
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Money {
        iter.copied().sum()
    }
}

impl Serialize for Money {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // Always the integer cent count, never a float.
        serializer.serialize_i64(self.cents)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let cents = i64::deserialize(deserializer)?;
        Ok(Money::from_cents(cents))
    }
}
