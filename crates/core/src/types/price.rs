//! Decimal money helpers and percentage discounts.
//!
//! All money is held as [`Decimal`] and rounded to two places with
//! midpoint-away-from-zero, which matches how the API and the browser
//! front end format prices.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced when constructing a [`Discount`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiscountError {
    /// Discount below zero percent.
    #[error("discount cannot be negative (got {0}%)")]
    Negative(Decimal),
    /// Discount above one hundred percent.
    #[error("discount cannot exceed 100% (got {0}%)")]
    AboveHundred(Decimal),
}

/// A percentage discount in the range `0..=100`.
///
/// Serialized as a bare JSON number (`15` means 15% off).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Discount(Decimal);

impl Discount {
    /// No discount.
    pub const NONE: Self = Self(Decimal::ZERO);

    /// Create a discount from a percentage.
    ///
    /// # Errors
    ///
    /// Returns an error if the percentage is outside `0..=100`.
    pub fn new(percent: Decimal) -> Result<Self, DiscountError> {
        if percent.is_sign_negative() && !percent.is_zero() {
            return Err(DiscountError::Negative(percent));
        }
        if percent > Decimal::ONE_HUNDRED {
            return Err(DiscountError::AboveHundred(percent));
        }
        Ok(Self(percent.normalize()))
    }

    /// The percentage value (e.g. `15` for 15% off).
    #[must_use]
    pub const fn percent(self) -> Decimal {
        self.0
    }

    /// Whether any discount applies.
    #[must_use]
    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }
}

impl TryFrom<f64> for Discount {
    type Error = DiscountError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        // Non-finite input collapses to zero and is then accepted as "no discount".
        let percent = Decimal::try_from(value).unwrap_or(Decimal::ZERO);
        Self::new(percent)
    }
}

impl From<Discount> for f64 {
    fn from(discount: Discount) -> Self {
        use rust_decimal::prelude::ToPrimitive;
        discount.0.to_f64().unwrap_or(0.0)
    }
}

impl std::fmt::Display for Discount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// Round a money amount to two decimal places (midpoint away from zero).
#[must_use]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Apply a percentage discount to a unit price.
///
/// `price = unit_price * (1 - discount / 100)`, rounded to two decimals.
///
/// ```
/// use petverse_core::{Discount, discounted_price};
/// use rust_decimal::Decimal;
///
/// let unit = Decimal::new(1999, 2); // 19.99
/// let ten_off = Discount::new(Decimal::TEN).unwrap();
/// assert_eq!(discounted_price(unit, ten_off), Decimal::new(1799, 2));
/// ```
#[must_use]
pub fn discounted_price(unit_price: Decimal, discount: Discount) -> Decimal {
    let factor = Decimal::ONE - discount.percent() / Decimal::ONE_HUNDRED;
    round_money(unit_price * factor)
}
