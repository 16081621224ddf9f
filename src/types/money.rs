//! Money type with fixed decimal precision and a currency tag.
//!
//! Never use floating point for money. Amounts are `rust_decimal::Decimal`
//! values constrained to each currency's minor-unit scale, so every value
//! is an exact whole number of minor units (cents, fen, ...).
//!
//! Arithmetic is only defined between values of the same currency; mixing
//! currencies is a hard error, never a silent conversion.

use std::cmp::Ordering;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::LedgerError;

/// Currencies supported by the ledger.
///
/// The set mirrors the wallets the system issues; there is no FX
/// conversion between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// Chinese Yuan
    Cny,
    /// US Dollar
    Usd,
    /// Euro
    Eur,
    /// British Pound
    Gbp,
    /// Japanese Yen
    Jpy,
    /// Hong Kong Dollar
    Hkd,
    /// New Taiwan Dollar
    Twd,
}

impl Currency {
    /// Number of decimal digits in this currency's minor unit.
    ///
    /// JPY has no minor unit; every other supported currency uses two
    /// decimal digits.
    pub const fn minor_unit_scale(self) -> u32 {
        match self {
            Currency::Jpy => 0,
            _ => 2,
        }
    }

    /// The three-letter code for this currency.
    pub const fn code(self) -> &'static str {
        match self {
            Currency::Cny => "CNY",
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
            Currency::Jpy => "JPY",
            Currency::Hkd => "HKD",
            Currency::Twd => "TWD",
        }
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "CNY" => Ok(Currency::Cny),
            "USD" => Ok(Currency::Usd),
            "EUR" => Ok(Currency::Eur),
            "GBP" => Ok(Currency::Gbp),
            "JPY" => Ok(Currency::Jpy),
            "HKD" => Ok(Currency::Hkd),
            "TWD" => Ok(Currency::Twd),
            _ => Err(format!("unknown currency: {s}")),
        }
    }
}

/// A monetary amount tagged with its currency.
///
/// Construction enforces the currency's minor-unit scale, so a `Money`
/// value can never carry a fractional minor unit. Negative amounts are
/// representable (they occur as deltas); operations that require a
/// magnitude reject them explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    amount: Decimal,
    currency: Currency,
}

impl Money {
    /// Creates a new amount in the given currency.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Precision`] if `amount` carries more
    /// fractional digits than the currency's minor-unit scale allows.
    pub fn new(amount: Decimal, currency: Currency) -> Result<Self, LedgerError> {
        let scale = currency.minor_unit_scale();
        // normalize() strips trailing zeros, so 1.00 JPY passes while
        // 1.5 JPY is rejected.
        if amount.normalize().scale() > scale {
            return Err(LedgerError::precision(amount, currency));
        }
        Ok(Money { amount, currency })
    }

    /// Creates a zero amount in the given currency.
    pub fn zero(currency: Currency) -> Self {
        Money {
            amount: Decimal::ZERO,
            currency,
        }
    }

    /// Builds a Money from minor units (e.g. 1050 cents -> 10.50 USD).
    pub fn from_minor_units(minor_units: i64, currency: Currency) -> Self {
        Money {
            amount: Decimal::new(minor_units, currency.minor_unit_scale()),
            currency,
        }
    }

    /// Internal constructor for amounts already known to be on-scale.
    pub(crate) fn from_raw(amount: Decimal, currency: Currency) -> Self {
        Money { amount, currency }
    }

    /// The decimal amount.
    pub fn amount(&self) -> Decimal {
        self.amount
    }

    /// The currency tag.
    pub fn currency(&self) -> Currency {
        self.currency
    }

    /// True if the amount is exactly zero.
    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    /// True if the amount is strictly negative.
    pub fn is_negative(&self) -> bool {
        self.amount.is_sign_negative() && !self.amount.is_zero()
    }

    /// True if the amount is strictly positive.
    pub fn is_positive(&self) -> bool {
        self.amount.is_sign_positive() && !self.amount.is_zero()
    }

    /// Adds another amount of the same currency.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::CurrencyMismatch`] if the currencies differ
    /// and [`LedgerError::AmountOutOfRange`] if the sum overflows.
    pub fn checked_add(&self, other: &Money) -> Result<Money, LedgerError> {
        self.require_same_currency(other)?;
        let amount = self
            .amount
            .checked_add(other.amount)
            .ok_or_else(|| LedgerError::amount_out_of_range(self.amount, Decimal::MAX))?;
        Ok(Money {
            amount,
            currency: self.currency,
        })
    }

    /// Subtracts another amount of the same currency.
    ///
    /// A negative result is allowed at this level; the ledger engine
    /// rejects it when applying the delta to a balance.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::CurrencyMismatch`] if the currencies differ
    /// and [`LedgerError::AmountOutOfRange`] if the difference overflows.
    pub fn checked_sub(&self, other: &Money) -> Result<Money, LedgerError> {
        self.require_same_currency(other)?;
        let amount = self
            .amount
            .checked_sub(other.amount)
            .ok_or_else(|| LedgerError::amount_out_of_range(self.amount, Decimal::MAX))?;
        Ok(Money {
            amount,
            currency: self.currency,
        })
    }

    /// Compares two amounts of the same currency.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::CurrencyMismatch`] if the currencies differ;
    /// cross-currency amounts are never ordered.
    pub fn compare(&self, other: &Money) -> Result<Ordering, LedgerError> {
        self.require_same_currency(other)?;
        Ok(self.amount.cmp(&other.amount))
    }

    fn require_same_currency(&self, other: &Money) -> Result<(), LedgerError> {
        if self.currency != other.currency {
            return Err(LedgerError::currency_mismatch(self.currency, other.currency));
        }
        Ok(())
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let scale = self.currency.minor_unit_scale() as usize;
        write!(f, "{:.*} {}", scale, self.amount, self.currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;
    use std::str::FromStr;

    #[test]
    fn test_new_accepts_on_scale_amount() {
        let money = Money::new(dec!(100.00), Currency::Cny).unwrap();
        assert_eq!(money.amount(), dec!(100.00));
        assert_eq!(money.currency(), Currency::Cny);
    }

    #[test]
    fn test_new_rejects_excess_precision() {
        let result = Money::new(dec!(1.001), Currency::Usd);
        assert!(matches!(result, Err(LedgerError::Precision { .. })));
    }

    #[test]
    fn test_new_jpy_rejects_any_fraction() {
        assert!(Money::new(dec!(100), Currency::Jpy).is_ok());
        // Trailing zeros are fine, a real fraction is not.
        assert!(Money::new(dec!(100.00), Currency::Jpy).is_ok());
        assert!(matches!(
            Money::new(dec!(100.5), Currency::Jpy),
            Err(LedgerError::Precision { .. })
        ));
    }

    #[test]
    fn test_from_minor_units() {
        let money = Money::from_minor_units(1050, Currency::Usd);
        assert_eq!(money.amount(), dec!(10.50));

        let yen = Money::from_minor_units(1050, Currency::Jpy);
        assert_eq!(yen.amount(), dec!(1050));
    }

    #[test]
    fn test_checked_add_same_currency() {
        let a = Money::new(dec!(10.25), Currency::Cny).unwrap();
        let b = Money::new(dec!(5.75), Currency::Cny).unwrap();
        assert_eq!(a.checked_add(&b).unwrap().amount(), dec!(16.00));
    }

    #[test]
    fn test_checked_sub_allows_negative_delta() {
        let a = Money::new(dec!(10.00), Currency::Cny).unwrap();
        let b = Money::new(dec!(15.00), Currency::Cny).unwrap();
        let delta = a.checked_sub(&b).unwrap();
        assert!(delta.is_negative());
        assert_eq!(delta.amount(), dec!(-5.00));
    }

    #[test]
    fn test_cross_currency_arithmetic_fails() {
        let cny = Money::new(dec!(10.00), Currency::Cny).unwrap();
        let usd = Money::new(dec!(10.00), Currency::Usd).unwrap();

        assert!(matches!(
            cny.checked_add(&usd),
            Err(LedgerError::CurrencyMismatch { .. })
        ));
        assert!(matches!(
            cny.checked_sub(&usd),
            Err(LedgerError::CurrencyMismatch { .. })
        ));
        assert!(matches!(
            cny.compare(&usd),
            Err(LedgerError::CurrencyMismatch { .. })
        ));
    }

    #[test]
    fn test_compare_same_currency() {
        let small = Money::new(dec!(1.00), Currency::Eur).unwrap();
        let large = Money::new(dec!(2.00), Currency::Eur).unwrap();
        assert_eq!(small.compare(&large).unwrap(), Ordering::Less);
        assert_eq!(large.compare(&small).unwrap(), Ordering::Greater);
        assert_eq!(small.compare(&small).unwrap(), Ordering::Equal);
    }

    #[test]
    fn test_sign_predicates() {
        let zero = Money::zero(Currency::Usd);
        assert!(zero.is_zero());
        assert!(!zero.is_negative());
        assert!(!zero.is_positive());

        let positive = Money::new(dec!(0.01), Currency::Usd).unwrap();
        assert!(positive.is_positive());

        let negative = Money::new(dec!(-0.01), Currency::Usd).unwrap();
        assert!(negative.is_negative());
    }

    #[rstest]
    #[case(dec!(1234.5), Currency::Cny, "1234.50 CNY")]
    #[case(dec!(0), Currency::Usd, "0.00 USD")]
    #[case(dec!(100), Currency::Jpy, "100 JPY")]
    fn test_display(#[case] amount: Decimal, #[case] currency: Currency, #[case] expected: &str) {
        let money = Money::new(amount, currency).unwrap();
        assert_eq!(money.to_string(), expected);
    }

    #[rstest]
    #[case("CNY", Currency::Cny)]
    #[case("usd", Currency::Usd)]
    #[case("Jpy", Currency::Jpy)]
    fn test_currency_from_str(#[case] input: &str, #[case] expected: Currency) {
        assert_eq!(Currency::from_str(input).unwrap(), expected);
    }

    #[test]
    fn test_currency_from_str_rejects_unknown() {
        assert!(Currency::from_str("BTC").is_err());
    }
}
