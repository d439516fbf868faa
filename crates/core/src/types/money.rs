//! Non-negative monetary amounts using decimal arithmetic.

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Errors that can occur when constructing [`Money`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    /// The amount is below zero.
    #[error("amount cannot be negative (got {0})")]
    Negative(Decimal),
}

/// A monetary amount in the store currency that is never negative.
///
/// Deserialization goes through [`Money::new`], so a negative amount in a
/// request body or a stored document is rejected rather than carried along.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

impl Money {
    /// Zero.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a new amount.
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::Negative` if `amount` is below zero.
    pub fn new(amount: Decimal) -> Result<Self, MoneyError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(MoneyError::Negative(amount));
        }
        Ok(Self(amount))
    }

    /// Create an amount from whole cents.
    ///
    /// Negative inputs clamp to zero.
    #[must_use]
    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents.max(0), 2))
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(self) -> Decimal {
        self.0
    }

    /// Multiply by a quantity, or `None` if the result does not fit.
    #[must_use]
    pub fn checked_times(self, quantity: u32) -> Option<Self> {
        self.0.checked_mul(Decimal::from(quantity)).map(Self)
    }

    /// Add two amounts, or `None` if the result does not fit.
    #[must_use]
    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    /// Sum amounts, or `None` on overflow.
    #[must_use]
    pub fn checked_sum<I: IntoIterator<Item = Self>>(amounts: I) -> Option<Self> {
        amounts
            .into_iter()
            .try_fold(Self::ZERO, |acc, amount| acc.checked_add(amount))
    }

    /// Subtract, stopping at zero.
    #[must_use]
    pub fn saturating_sub(self, other: Self) -> Self {
        if other.0 >= self.0 {
            Self::ZERO
        } else {
            Self(self.0 - other.0)
        }
    }
}

impl TryFrom<Decimal> for Money {
    type Error = MoneyError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Money> for Decimal {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:.2}", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_negative() {
        assert!(matches!(
            Money::new(Decimal::new(-1, 2)),
            Err(MoneyError::Negative(_))
        ));
        assert!(Money::new(Decimal::ZERO).is_ok());
    }

    #[test]
    fn test_times_and_sum() {
        let price = Money::from_cents(1_000);
        let total = Money::checked_sum([price.checked_times(2).unwrap(), Money::from_cents(550)]);
        assert_eq!(total, Some(Money::from_cents(2_550)));
    }

    #[test]
    fn test_overflow_is_none() {
        let huge = Money::new(Decimal::MAX).unwrap();
        assert_eq!(huge.checked_times(2), None);
        assert_eq!(huge.checked_add(Money::from_cents(100)), None);
        assert_eq!(Money::checked_sum([huge, huge]), None);
        assert_eq!(huge.checked_times(1), Some(huge));
    }

    #[test]
    fn test_saturating_sub() {
        let ten = Money::from_cents(1_000);
        assert_eq!(ten.saturating_sub(Money::from_cents(250)), Money::from_cents(750));
        assert_eq!(ten.saturating_sub(Money::from_cents(5_000)), Money::ZERO);
    }

    #[test]
    fn test_deserialize_rejects_negative() {
        assert!(serde_json::from_str::<Money>("\"-5.00\"").is_err());
        let money: Money = serde_json::from_str("\"12.50\"").unwrap();
        assert_eq!(money, Money::from_cents(1_250));
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(1_999).to_string(), "$19.99");
    }
}
