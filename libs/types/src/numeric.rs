//! Exact decimal types for prices and quantities
//!
//! Uses rust_decimal (96-bit mantissa, 28-29 significant digits) so no binary
//! floating point ever appears on a value path. Serialized as canonical
//! decimal text to prevent JSON number precision loss.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Mul, Sub};
use std::str::FromStr;

use crate::errors::NumericError;

/// Price of one unit of base asset, denominated in the quote asset
///
/// Always strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Price(Decimal);

impl Price {
    /// Create a new Price from a Decimal
    ///
    /// # Panics
    /// Panics if the price is not strictly positive
    pub fn new(value: Decimal) -> Self {
        assert!(value > Decimal::ZERO, "Price must be positive");
        Self(value)
    }

    /// Try to create a Price, returning None if not strictly positive
    pub fn try_new(value: Decimal) -> Option<Self> {
        if value > Decimal::ZERO {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Create from integer (for testing/convenience)
    pub fn from_u64(value: u64) -> Self {
        Self::new(Decimal::from(value))
    }

    /// Parse from canonical decimal text
    pub fn parse(s: &str) -> Result<Self, NumericError> {
        let decimal =
            Decimal::from_str(s).map_err(|_| NumericError::InvalidDecimal(s.to_string()))?;
        Self::try_new(decimal).ok_or_else(|| NumericError::NotPositive(s.to_string()))
    }

    /// Get the inner decimal value
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    pub fn min(self, other: Self) -> Self {
        Self(self.0.min(other.0))
    }

    pub fn max(self, other: Self) -> Self {
        Self(self.0.max(other.0))
    }
}

// Custom serialization to preserve precision
impl Serialize for Price {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let decimal = Decimal::from_str(&s).map_err(serde::de::Error::custom)?;
        Self::try_new(decimal).ok_or_else(|| serde::de::Error::custom("Price must be positive"))
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Quantity of base asset
///
/// Never negative. Zero is a valid value: it is the `filled` amount of an
/// untouched order and the removal marker in depth payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quantity(Decimal);

impl Quantity {
    /// Try to create a Quantity, returning None if negative
    pub fn try_new(value: Decimal) -> Option<Self> {
        if value >= Decimal::ZERO {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Zero quantity
    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Create from integer (for testing/convenience)
    pub fn from_u64(value: u64) -> Self {
        Self(Decimal::from(value))
    }

    /// Parse from canonical decimal text
    pub fn parse(s: &str) -> Result<Self, NumericError> {
        let decimal =
            Decimal::from_str(s).map_err(|_| NumericError::InvalidDecimal(s.to_string()))?;
        Self::try_new(decimal).ok_or_else(|| NumericError::Negative(s.to_string()))
    }

    /// Get the inner decimal value
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == Decimal::ZERO
    }

    pub fn min(self, other: Self) -> Self {
        Self(self.0.min(other.0))
    }

    pub fn max(self, other: Self) -> Self {
        Self(self.0.max(other.0))
    }
}

impl Add for Quantity {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Quantity {
    type Output = Self;

    /// Callers only subtract amounts bounded by prior `min` comparisons, so
    /// the difference is never negative; checked in debug builds.
    fn sub(self, rhs: Self) -> Self::Output {
        debug_assert!(self.0 >= rhs.0, "Quantity subtraction went negative");
        Self(self.0 - rhs.0)
    }
}

impl Mul<Price> for Quantity {
    type Output = Decimal;

    fn mul(self, rhs: Price) -> Self::Output {
        self.0 * rhs.as_decimal()
    }
}

// Custom serialization to preserve precision
impl Serialize for Quantity {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let decimal = Decimal::from_str(&s).map_err(serde::de::Error::custom)?;
        Self::try_new(decimal).ok_or_else(|| serde::de::Error::custom("Quantity cannot be negative"))
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Serde adapter for plain `Decimal` fields that must travel as canonical
/// decimal text (e.g. notional values on wire records).
pub mod decimal_text {
    use rust_decimal::Decimal;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::str::FromStr;

    pub fn serialize<S>(value: &Decimal, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Decimal::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_price_creation() {
        let price = Price::from_u64(50000);
        assert_eq!(price.as_decimal(), Decimal::from(50000));
    }

    #[test]
    #[should_panic(expected = "Price must be positive")]
    fn test_price_negative_panics() {
        Price::new(dec!(-100));
    }

    #[test]
    fn test_price_parse_rejects_garbage() {
        assert!(matches!(
            Price::parse("not-a-number"),
            Err(NumericError::InvalidDecimal(_))
        ));
        assert!(matches!(
            Price::parse("0"),
            Err(NumericError::NotPositive(_))
        ));
        assert!(matches!(
            Price::parse("-5"),
            Err(NumericError::NotPositive(_))
        ));
    }

    #[test]
    fn test_price_ordering() {
        let p1 = Price::parse("100.5").unwrap();
        let p2 = Price::parse("100.50").unwrap();
        let p3 = Price::from_u64(101);
        assert_eq!(p1, p2);
        assert!(p3 > p1);
        assert_eq!(p1.max(p3), p3);
        assert_eq!(p1.min(p3), p1);
    }

    #[test]
    fn test_price_serialization() {
        let price = Price::parse("50000.25").unwrap();
        let json = serde_json::to_string(&price).unwrap();
        assert_eq!(json, "\"50000.25\"");

        let deserialized: Price = serde_json::from_str(&json).unwrap();
        assert_eq!(price, deserialized);
    }

    #[test]
    fn test_quantity_zero() {
        let qty = Quantity::zero();
        assert!(qty.is_zero());
        assert!(Quantity::parse("0").unwrap().is_zero());
    }

    #[test]
    fn test_quantity_rejects_negative() {
        assert!(matches!(
            Quantity::parse("-1.5"),
            Err(NumericError::Negative(_))
        ));
    }

    #[test]
    fn test_quantity_arithmetic() {
        let q1 = Quantity::parse("2.5").unwrap();
        let q2 = Quantity::parse("1.5").unwrap();

        assert_eq!(q1 + q2, Quantity::parse("4.0").unwrap());
        assert_eq!(q1 - q2, Quantity::parse("1.0").unwrap());
    }

    #[test]
    fn test_notional_value() {
        let qty = Quantity::parse("1.5").unwrap();
        let price = Price::from_u64(100);

        assert_eq!(qty * price, Decimal::from(150));
    }

    #[test]
    fn test_exactness() {
        // 0.1 + 0.2 is exact in decimal, unlike binary floating point
        let sum = Quantity::parse("0.1").unwrap() + Quantity::parse("0.2").unwrap();
        assert_eq!(sum, Quantity::parse("0.3").unwrap());
    }

    #[test]
    fn test_decimal_text_roundtrip() {
        #[derive(serde::Serialize, serde::Deserialize)]
        struct Wrapper {
            #[serde(with = "decimal_text")]
            value: Decimal,
        }

        let w = Wrapper { value: dec!(1234.5678) };
        let json = serde_json::to_string(&w).unwrap();
        assert_eq!(json, r#"{"value":"1234.5678"}"#);
        let back: Wrapper = serde_json::from_str(&json).unwrap();
        assert_eq!(back.value, dec!(1234.5678));
    }
}
