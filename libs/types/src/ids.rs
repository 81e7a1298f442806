//! Identifier types for exchange entities
//!
//! Order ids are UUID v7 (time-sortable) and generated by the engine. User
//! and client ids are opaque strings supplied by the caller; the engine never
//! inspects them beyond equality.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for an order
///
/// Uses UUID v7 so ids sort in creation order, which keeps replay and
/// chronological queries cheap downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(Uuid);

impl OrderId {
    /// Create a new OrderId with current timestamp
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Create from existing UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get inner UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque user identifier, supplied by the caller
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Opaque client identifier keying the result channel
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ClientId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Market symbol (trading pair)
///
/// Format: "BASE_QUOTE" (e.g., "TATA_INR", "BTC_USDT")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarketSymbol(String);

impl MarketSymbol {
    /// Create a new MarketSymbol from a string
    ///
    /// # Panics
    /// Panics if the format is invalid (must contain '_')
    pub fn new(symbol: impl Into<String>) -> Self {
        Self::try_new(symbol).expect("MarketSymbol must be in BASE_QUOTE format")
    }

    /// Try to create a MarketSymbol, returning None if invalid
    pub fn try_new(symbol: impl Into<String>) -> Option<Self> {
        let s = symbol.into();
        let mut parts = s.splitn(2, '_');
        match (parts.next(), parts.next()) {
            (Some(base), Some(quote)) if !base.is_empty() && !quote.is_empty() => Some(Self(s)),
            _ => None,
        }
    }

    /// Get the symbol string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split into base and quote assets
    pub fn split(&self) -> (&str, &str) {
        let mut parts = self.0.splitn(2, '_');
        let base = parts.next().unwrap_or("");
        let quote = parts.next().unwrap_or("");
        (base, quote)
    }

    /// Base asset symbol
    pub fn base(&self) -> &str {
        self.split().0
    }

    /// Quote asset symbol
    pub fn quote(&self) -> &str {
        self.split().1
    }
}

impl fmt::Display for MarketSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MarketSymbol {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
