//! Token amounts
//!
//! Balances and treasuries may be zero; anything that moves tokens
//! (deposit, withdraw, borrow, repay, fund, liquidation legs) must be
//! strictly positive. [`Amount`] carries the weaker guarantee and
//! [`Amount::positive`] the stronger one.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    #[error("Amount cannot be negative: {0}")]
    Negative(Decimal),

    #[error("Amount must be greater than zero: {0}")]
    NotPositive(Decimal),
}

/// A non-negative quantity of some asset, in whole token units.
///
/// ```
/// use lendbank_core::Amount;
/// use rust_decimal::Decimal;
///
/// assert!(Amount::new(Decimal::ZERO).is_ok());
/// assert!(Amount::positive(Decimal::ZERO).is_err());
/// assert_eq!(Amount::positive(Decimal::new(25, 1)).unwrap().to_string(), "2.5");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Accepts zero; rejects negatives
    pub fn new(value: Decimal) -> Result<Self, AmountError> {
        if value < Decimal::ZERO {
            return Err(AmountError::Negative(value));
        }
        Ok(Self(value))
    }

    /// Accepts only values strictly greater than zero
    pub fn positive(value: Decimal) -> Result<Self, AmountError> {
        match Self::new(value)? {
            amount if amount.is_zero() => Err(AmountError::NotPositive(value)),
            amount => Ok(amount),
        }
    }

    #[inline]
    pub const fn value(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = AmountError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_zero_is_a_balance_not_a_transfer() {
        assert!(Amount::new(dec!(0)).unwrap().is_zero());
        assert_eq!(Amount::positive(dec!(0)), Err(AmountError::NotPositive(dec!(0))));
    }

    #[test]
    fn test_negative_rejected_by_both_constructors() {
        assert!(matches!(Amount::new(dec!(-100)), Err(AmountError::Negative(_))));
        assert!(matches!(Amount::positive(dec!(-0.01)), Err(AmountError::Negative(_))));
    }

    #[test]
    fn test_smallest_positive_amount() {
        let tiny = Amount::positive(dec!(0.000000000000000001)).unwrap();
        assert!(tiny.value() > Decimal::ZERO);
        assert!(tiny > Amount::ZERO);
    }

    #[test]
    fn test_display_is_normalized() {
        assert_eq!(Amount::new(dec!(1.500)).unwrap().to_string(), "1.5");
    }

    #[test]
    fn test_serde_uses_strings_and_rejects_negative() {
        let amount = Amount::positive(dec!(123.45)).unwrap();
        assert_eq!(serde_json::to_string(&amount).unwrap(), "\"123.45\"");
        assert!(serde_json::from_str::<Amount>("\"-5\"").is_err());
    }
}
