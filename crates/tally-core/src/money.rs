//! Cent-precision monetary amounts
//!
//! Amounts wrap [`rust_decimal::Decimal`] and are always normalised to exactly
//! two fractional digits. Division and rounding never go through binary
//! floating point, which keeps the split invariant (`sum(shares) == total`)
//! exact.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Sub};
use std::str::FromStr;

use crate::TallyError;

/// A monetary amount with cent precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    /// Zero
    pub const ZERO: Amount = Amount(Decimal::ZERO);

    /// Build from a decimal, rounding half away from zero to cents
    pub fn from_decimal(value: Decimal) -> Self {
        Self(round_cents(value))
    }

    /// Build from an integer number of cents
    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, 2))
    }

    /// The underlying decimal (always scale 2)
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Whole number of cents, `None` if it does not fit in an `i64`
    pub fn to_cents(&self) -> Option<i64> {
        i64::try_from(round_cents(self.0).mantissa()).ok()
    }

    /// Whether the amount is below zero
    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// Divide into `parts` equal shares rounded to cents.
    ///
    /// Returns `None` when `parts` is zero.
    pub fn divide_rounded(&self, parts: usize) -> Option<Amount> {
        if parts == 0 {
            return None;
        }
        let divisor = Decimal::from(parts as u64);
        Some(Self::from_decimal(self.0 / divisor))
    }

    /// Multiply by an integer count
    pub fn times(&self, count: usize) -> Amount {
        Self::from_decimal(self.0 * Decimal::from(count as u64))
    }
}

fn round_cents(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Self::from_decimal(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl FromStr for Amount {
    type Err = TallyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s.trim())
            .map(Self::from_decimal)
            .map_err(|e| TallyError::invalid(format!("Invalid amount {s:?}: {e}")))
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

impl Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Self {
        iter.fold(Amount::ZERO, |acc, a| acc + a)
    }
}

impl<'a> Sum<&'a Amount> for Amount {
    fn sum<I: Iterator<Item = &'a Amount>>(iter: I) -> Self {
        iter.fold(Amount::ZERO, |acc, a| acc + *a)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}
