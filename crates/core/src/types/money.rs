//! Money amounts in US dollars using decimal arithmetic.
//!
//! The store sells in a single currency (USD). Amounts are kept as
//! [`Decimal`] for display and converted to integer cents at the payment
//! provider boundary, where both Payphone and the tax split require exact
//! integer arithmetic.

use std::iter::Sum;
use std::ops::{Add, Mul};

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced when parsing user-entered amounts.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MoneyError {
    #[error("amount is not a number")]
    Invalid,
    #[error("amount cannot be negative")]
    Negative,
    #[error("amount can have at most two decimals")]
    TooPrecise,
    #[error("amount is too large")]
    Overflow,
}

/// A USD amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Zero dollars.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Wrap a decimal amount.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Build an amount from integer cents.
    #[must_use]
    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, 2))
    }

    /// Parse an amount typed into a form, e.g. `"12.50"` or `"$1,200"`.
    ///
    /// # Errors
    ///
    /// Returns `MoneyError` if the input is not a non-negative number with at
    /// most two decimals.
    pub fn parse(input: &str) -> Result<Self, MoneyError> {
        let cleaned: String = input
            .trim()
            .chars()
            .filter(|c| *c != '$' && *c != ',' && !c.is_whitespace())
            .collect();
        let amount: Decimal = cleaned.parse().map_err(|_| MoneyError::Invalid)?;
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(MoneyError::Negative);
        }
        if amount.normalize().scale() > 2 {
            return Err(MoneyError::TooPrecise);
        }
        let money = Self(amount);
        money.try_cents().ok_or(MoneyError::Overflow)?;
        Ok(money)
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Integer cents, rounding half away from zero.
    ///
    /// Saturates at `i64::MAX` for absurd amounts; `parse` rejects those.
    #[must_use]
    pub fn cents(&self) -> i64 {
        self.try_cents().unwrap_or(i64::MAX)
    }

    fn try_cents(self) -> Option<i64> {
        let rounded = self
            .0
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        (rounded * Decimal::ONE_HUNDRED).to_i64()
    }

    /// Returns true when the amount is zero.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Mul<u32> for Money {
    type Output = Self;

    fn mul(self, rhs: u32) -> Self {
        Self(self.0 * Decimal::from(rhs))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cents = self.cents();
        let sign = if cents < 0 { "-" } else { "" };
        let abs = cents.unsigned_abs();
        let dollars = (abs / 100).to_string();

        let mut grouped = String::with_capacity(dollars.len() + dollars.len() / 3);
        for (i, ch) in dollars.chars().enumerate() {
            if i > 0 && (dollars.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }

        write!(f, "{sign}${grouped}.{:02}", abs % 100)
    }
}

/// A tax-inclusive total split into its taxable base and tax, in cents.
///
/// Catalog prices include VAT. Providers that want the split (Payphone) get
/// `base + tax == total` exactly; the base is rounded and the tax absorbs the
/// remainder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaxBreakdown {
    /// Taxable base in cents.
    pub base_cents: i64,
    /// Tax in cents.
    pub tax_cents: i64,
    /// Total in cents.
    pub total_cents: i64,
}

impl TaxBreakdown {
    /// Split a tax-inclusive total at `rate` (e.g. `0.15` for 15%).
    #[must_use]
    pub fn from_gross(total: Money, rate: Decimal) -> Self {
        let total_cents = total.cents();
        if rate <= Decimal::ZERO {
            return Self {
                base_cents: total_cents,
                tax_cents: 0,
                total_cents,
            };
        }

        let base = (Decimal::from(total_cents) / (Decimal::ONE + rate))
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .unwrap_or(total_cents);

        Self {
            base_cents: base,
            tax_cents: total_cents - base,
            total_cents,
        }
    }

    /// Base as money.
    #[must_use]
    pub fn base(&self) -> Money {
        Money::from_cents(self.base_cents)
    }

    /// Tax as money.
    #[must_use]
    pub fn tax(&self) -> Money {
        Money::from_cents(self.tax_cents)
    }

    /// Total as money.
    #[must_use]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_display_formats_thousands() {
        assert_eq!(Money::from_cents(0).to_string(), "$0.00");
        assert_eq!(Money::from_cents(5).to_string(), "$0.05");
        assert_eq!(Money::from_cents(123_456).to_string(), "$1,234.56");
        assert_eq!(Money::from_cents(100_000_000).to_string(), "$1,000,000.00");
        assert_eq!(Money::from_cents(-500).to_string(), "-$5.00");
    }

    #[test]
    fn test_cents_rounds_half_away_from_zero() {
        let m = Money::new(Decimal::from_str("10.005").unwrap());
        assert_eq!(m.cents(), 1001);
        let m = Money::new(Decimal::from_str("10.004").unwrap());
        assert_eq!(m.cents(), 1000);
    }

    #[test]
    fn test_arithmetic() {
        let unit = Money::from_cents(1999);
        assert_eq!((unit * 3).cents(), 5997);
        let total: Money = vec![unit, Money::from_cents(1)].into_iter().sum();
        assert_eq!(total.cents(), 2000);
    }

    #[test]
    fn test_parse() {
        assert_eq!(Money::parse("12.5").unwrap().cents(), 1250);
        assert_eq!(Money::parse(" $1,200.00 ").unwrap().cents(), 120_000);
        assert_eq!(Money::parse("12.500").unwrap().cents(), 1250);
        assert_eq!(Money::parse("abc"), Err(MoneyError::Invalid));
        assert_eq!(Money::parse("-1"), Err(MoneyError::Negative));
        assert_eq!(Money::parse("1.234"), Err(MoneyError::TooPrecise));
    }

    #[test]
    fn test_tax_breakdown_sums_exactly() {
        let rate = Decimal::from_str("0.15").unwrap();
        for cents in [1, 99, 100, 1150, 2999, 123_457] {
            let split = TaxBreakdown::from_gross(Money::from_cents(cents), rate);
            assert_eq!(split.base_cents + split.tax_cents, cents);
            assert!(split.tax_cents >= 0);
        }

        let split = TaxBreakdown::from_gross(Money::from_cents(1150), rate);
        assert_eq!(split.base_cents, 1000);
        assert_eq!(split.tax_cents, 150);
    }

    #[test]
    fn test_tax_breakdown_zero_rate() {
        let split = TaxBreakdown::from_gross(Money::from_cents(500), Decimal::ZERO);
        assert_eq!(split.base_cents, 500);
        assert_eq!(split.tax_cents, 0);
    }

    #[test]
    fn test_deserializes_from_number_or_string() {
        let a: Money = serde_json::from_str("\"19.99\"").unwrap();
        let b: Money = serde_json::from_str("19.99").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.cents(), 1999);
    }
}
