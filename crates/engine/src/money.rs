use std::{
    fmt,
    iter::Sum,
    ops::{Add, AddAssign, Neg, Sub, SubAssign},
    str::FromStr,
};

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::EngineError;

/// Signed money amount backed by a fixed-point decimal.
///
/// Use this type for **all** monetary values in the engine (expense amounts,
/// split weights, balances) to avoid floating-point drift.
///
/// The value is signed:
/// - positive = the group owes this member / money received
/// - negative = this member owes the group / money paid out
///
/// Intermediate arithmetic is exact; rounding to a currency's minor units
/// happens only through [`Money::round_to`], at the persistence or display
/// boundary.
///
/// # Examples
///
/// ```rust
/// use engine::Money;
///
/// let amount = Money::from_minor(12_34, 2);
/// assert_eq!(amount.to_string(), "12.34");
/// assert_eq!("10,5".parse::<Money>().unwrap(), Money::from_minor(1050, 2));
/// ```
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// Wraps a decimal value.
    #[must_use]
    pub const fn new(value: Decimal) -> Self {
        Self(value)
    }

    /// Builds an amount from an integer number of minor units.
    ///
    /// `from_minor(1050, 2)` is `10.50`.
    #[must_use]
    pub fn from_minor(minor: i64, minor_units: u32) -> Self {
        Self(Decimal::new(minor, minor_units))
    }

    /// Returns the underlying decimal.
    #[must_use]
    pub const fn value(self) -> Decimal {
        self.0
    }

    /// Returns `true` if the amount is 0.
    #[must_use]
    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    /// Returns `true` if the amount is strictly positive.
    #[must_use]
    pub fn is_positive(self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Returns `true` if the amount is strictly negative.
    #[must_use]
    pub fn is_negative(self) -> bool {
        self.0 < Decimal::ZERO
    }

    #[must_use]
    pub fn abs(self) -> Self {
        Self(self.0.abs())
    }

    /// Number of fractional digits carried by the value.
    #[must_use]
    pub fn scale(self) -> u32 {
        self.0.normalize().scale()
    }

    /// Rounds to `minor_units` fractional digits, midpoints away from zero.
    #[must_use]
    pub fn round_to(self, minor_units: u32) -> Self {
        Self(
            self.0
                .round_dp_with_strategy(minor_units, RoundingStrategy::MidpointAwayFromZero),
        )
    }

    /// Truncates to `minor_units` fractional digits (towards zero).
    #[must_use]
    pub fn truncate_to(self, minor_units: u32) -> Self {
        Self(
            self.0
                .round_dp_with_strategy(minor_units, RoundingStrategy::ToZero),
        )
    }

    /// Checked addition (returns `None` on overflow).
    #[must_use]
    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Money)
    }

    /// Checked subtraction (returns `None` on overflow).
    #[must_use]
    pub fn checked_sub(self, rhs: Money) -> Option<Money> {
        self.0.checked_sub(rhs.0).map(Money)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = self.0.normalize();
        if value.scale() < 2 {
            write!(f, "{:.2}", value)
        } else {
            write!(f, "{value}")
        }
    }
}

impl From<Decimal> for Money {
    fn from(value: Decimal) -> Self {
        Self(value)
    }
}

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Self(Decimal::from(value))
    }
}

impl From<Money> for Decimal {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Self::Output {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Self::Output {
        Money(self.0 - rhs.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Money) {
        self.0 -= rhs.0;
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Self::Output {
        Money(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl FromStr for Money {
    type Err = EngineError;

    /// Parses a decimal string.
    ///
    /// Accepts `.` or `,` as decimal separator and an optional leading `+`/`-`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(EngineError::InvalidAmount("empty amount".to_string()));
        }

        let (negative, rest) = if let Some(stripped) = trimmed.strip_prefix('-') {
            (true, stripped)
        } else if let Some(stripped) = trimmed.strip_prefix('+') {
            (false, stripped)
        } else {
            (false, trimmed)
        };

        let rest = rest.trim().replace(',', ".");
        let mut parts = rest.split('.');
        let units = parts.next().unwrap_or_default();
        let fraction = parts.next();
        if parts.next().is_some()
            || units.is_empty()
            || !units.chars().all(|c| c.is_ascii_digit())
            || fraction.is_some_and(|f| !f.chars().all(|c| c.is_ascii_digit()))
        {
            return Err(EngineError::InvalidAmount(format!("invalid amount: {s}")));
        }

        let value = Decimal::from_str(&rest)
            .map_err(|_| EngineError::InvalidAmount(format!("amount too large: {s}")))?;
        Ok(Money(if negative { -value } else { value }))
    }
}
