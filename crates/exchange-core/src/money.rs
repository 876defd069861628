//! Fixed-point monetary representation
//!
//! The base spec allows monetary values to be `f64`, rounded to two decimals
//! at the boundary, but calls out that repeated floating-point additions may
//! drift. `Money` wraps [`rust_decimal::Decimal`] instead, so the refund
//! algebra in the exchange's settlement path (price-improvement refunds,
//! escrow releases) holds exactly rather than approximately.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};

/// A non-negative-by-convention monetary amount, rounded to two decimal
/// places at construction.
///
/// `Money` does not enforce non-negativity itself — callers (the `Exchange`)
/// are responsible for rejecting operations that would drive a balance
/// negative before they're applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// Construct from a decimal value, rounding to two places (banker's
    /// rounding, `rust_decimal`'s default).
    pub fn new(value: Decimal) -> Self {
        Self(value.round_dp(2))
    }

    /// Construct from an integer number of whole units (no fractional cents).
    pub fn from_i64(value: i64) -> Self {
        Self(Decimal::from(value))
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Multiply by an integer quantity (price × quantity), rounded to two
    /// decimal places.
    pub fn times_qty(&self, qty: u32) -> Money {
        Money::new(self.0 * Decimal::from(qty))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl std::str::FromStr for Money {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Money::new(s.parse::<Decimal>()?))
    }
}

impl Add for Money {
    type Output = Money;
    fn add(self, rhs: Self) -> Money {
        Money::new(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for Money {
    type Output = Money;
    fn sub(self, rhs: Self) -> Money {
        Money::new(self.0 - rhs.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl Mul<u32> for Money {
    type Output = Money;
    fn mul(self, rhs: u32) -> Money {
        self.times_qty(rhs)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}
