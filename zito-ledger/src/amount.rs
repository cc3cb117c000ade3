//! Safe financial arithmetic using fixed-point decimal.
//!
//! All fee and total computation goes through `Amount`. Never floats: fee
//! splits must be exact down to the minor unit, and a quote's numbers are
//! authoritative for the resulting transaction.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Monetary amount in a currency's minor units, with exact arithmetic.
///
/// Serializes as a string to preserve precision across JSON boundaries.
///
/// # Examples
///
/// ```
/// use zito_ledger::Amount;
///
/// let amount = Amount::from_minor_units(10_000);
/// let fee = amount.bps(250); // 2.5%
/// assert_eq!(fee.as_minor_units(), 250);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount {
    value: Decimal,
}

impl Amount {
    /// Zero.
    pub fn zero() -> Self {
        Self {
            value: Decimal::ZERO,
        }
    }

    /// Create from minor units of the currency (e.g. 100 = 1.00 USD, or
    /// 100 XAF for zero-decimal currencies).
    pub fn from_minor_units(units: i64) -> Self {
        Self {
            value: Decimal::from(units),
        }
    }

    /// Create from a decimal string (e.g. `"123.45"`).
    ///
    /// # Errors
    ///
    /// Returns an error message if the string is not a valid decimal.
    pub fn from_str_checked(s: &str) -> Result<Self, String> {
        Decimal::from_str(s)
            .map(|value| Self { value })
            .map_err(|e| format!("invalid amount: {}", e))
    }

    /// Value in minor units, truncated toward zero. Values outside the `i64`
    /// range saturate toward the matching bound.
    pub fn as_minor_units(&self) -> i64 {
        use rust_decimal::prelude::ToPrimitive;
        let truncated = self.value.trunc();
        match truncated.to_i64() {
            Some(units) => units,
            None if truncated < Decimal::ZERO => i64::MIN,
            None => i64::MAX,
        }
    }

    /// Checked addition; `None` on overflow.
    pub fn checked_add(&self, other: &Self) -> Option<Self> {
        self.value
            .checked_add(other.value)
            .map(|value| Self { value })
    }

    /// Checked subtraction; `None` on overflow.
    pub fn checked_sub(&self, other: &Self) -> Option<Self> {
        self.value
            .checked_sub(other.value)
            .map(|value| Self { value })
    }

    /// Saturating subtraction, floored at zero. Fee totals never go negative.
    pub fn saturating_sub(&self, other: &Self) -> Self {
        match self.value.checked_sub(other.value) {
            Some(value) if value >= Decimal::ZERO => Self { value },
            _ => Self::zero(),
        }
    }

    /// Basis-point share of this amount, rounded to the nearest minor unit
    /// (banker's rounding). 100 bps = 1%.
    pub fn bps(&self, basis_points: i64) -> Self {
        let share = self.value * Decimal::from(basis_points) / Decimal::from(10_000);
        Self {
            value: share.round_dp(0),
        }
    }

    /// True when strictly greater than zero.
    pub fn is_positive(&self) -> bool {
        self.value > Decimal::ZERO
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}
