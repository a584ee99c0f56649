//! Amount type for handling signed monetary values.
//!
//! This module provides the `Amount` type which wraps `Decimal` and handles parsing values that
//! may arrive as JSON numbers or as strings with a currency symbol and thousands separators.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::error::Error;
use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;

/// Currency symbols that are tolerated (and discarded) when parsing.
const CURRENCY_SYMBOLS: &[char] = &['$', '₹', '€', '£'];

/// Represents a signed currency amount.
///
/// Ordering and equality are numeric, so `1.5` and `1.50` are equal.
///
/// # Examples
///
/// ```
/// # use expense_ninja::model::Amount;
/// # use std::str::FromStr;
/// let amount = Amount::from_str("-₹1,250.5").unwrap();
/// assert_eq!(amount.to_string(), "-1,250.50");
/// assert_eq!(amount.plain(), "-1250.5");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount {
    value: Decimal,
}

impl Amount {
    pub const fn new(value: Decimal) -> Self {
        Self { value }
    }

    /// Returns the underlying Decimal value.
    pub fn value(&self) -> Decimal {
        self.value
    }

    /// The number without formatting, e.g. `-1250.5`. This is the text used for searching.
    pub fn plain(&self) -> String {
        self.value.normalize().to_string()
    }

    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.value.is_sign_negative() && !self.value.is_zero()
    }
}

/// An error that can occur when parsing strings into `Decimal` values.
pub struct AmountError(rust_decimal::Error);

impl Debug for AmountError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

impl Display for AmountError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl std::error::Error for AmountError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.0)
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Ok(Amount::default());
        }

        let (negative, unsigned) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest.trim_start()),
            None => (false, trimmed),
        };
        let without_symbol = unsigned.trim_start_matches(CURRENCY_SYMBOLS).trim_start();
        let without_commas = without_symbol.replace(',', "");

        let mut value = Decimal::from_str(&without_commas).map_err(AmountError)?;
        if negative {
            value = -value;
        }
        Ok(Amount { value })
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let sign = if self.is_negative() { "-" } else { "" };
        let num = self.value.abs().to_f64().unwrap_or_default();
        write!(f, "{sign}{}", format_num::format_num!(",.2", num))
    }
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.plain())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // The backend sends JSON numbers, but strings are accepted too.
        let raw = serde_json::Value::deserialize(deserializer)?;
        let s = match raw {
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::String(s) => s,
            serde_json::Value::Null => String::new(),
            other => {
                return Err(serde::de::Error::custom(format!(
                    "expected an amount, found {other}"
                )))
            }
        };
        Amount::from_str(&s).map_err(serde::de::Error::custom)
    }
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Amount::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_parse_plain() {
        let amount = Amount::from_str("50.00").unwrap();
        assert_eq!(amount.value(), dec("50.00"));
    }

    #[test]
    fn test_parse_currency_symbols() {
        assert_eq!(Amount::from_str("$50.00").unwrap().value(), dec("50"));
        assert_eq!(Amount::from_str("₹ 1,499").unwrap().value(), dec("1499"));
        assert_eq!(Amount::from_str("-€12.30").unwrap().value(), dec("-12.3"));
    }

    #[test]
    fn test_parse_empty_string() {
        let amount = Amount::from_str("   ").unwrap();
        assert!(amount.is_zero());
    }

    #[test]
    fn test_parse_garbage() {
        assert!(Amount::from_str("twelve").is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Amount::new(dec("1234567.891")).to_string(), "1,234,567.89");
        assert_eq!(Amount::new(dec("-50")).to_string(), "-50.00");
        assert_eq!(Amount::new(Decimal::ZERO).to_string(), "0.00");
    }

    #[test]
    fn test_plain() {
        assert_eq!(Amount::from_str("199.50").unwrap().plain(), "199.5");
        assert_eq!(Amount::from_str("-1,000").unwrap().plain(), "-1000");
    }

    #[test]
    fn test_deserialize_number_and_string() {
        let a: Amount = serde_json::from_str("149.99").unwrap();
        let b: Amount = serde_json::from_str("\"149.99\"").unwrap();
        let c: Amount = serde_json::from_str("-3").unwrap();
        assert_eq!(a, b);
        assert_eq!(c.value(), dec("-3"));
        assert!(serde_json::from_str::<Amount>("[1]").is_err());
    }

    #[test]
    fn test_ordering_is_numeric() {
        let small = Amount::from_str("9.99").unwrap();
        let large = Amount::from_str("10.00").unwrap();
        let negative = Amount::from_str("-100").unwrap();
        assert!(small < large);
        assert!(negative < small);
        assert_eq!(
            Amount::from_str("1.5").unwrap(),
            Amount::from_str("1.50").unwrap()
        );
    }

    #[test]
    fn test_negative_zero_is_not_negative() {
        let amount = Amount::from_str("-0.00").unwrap();
        assert!(amount.is_zero());
        assert!(!amount.is_negative());
        assert_eq!(amount.to_string(), "0.00");
    }
}
