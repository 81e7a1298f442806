//! Available/locked balance accounting
//!
//! A `Balance` is the pair of funds a user holds in one asset: `available`
//! can be spent or locked by new orders; `locked` is reserved for resting
//! orders and only moves at settlement or cancellation. Both components are
//! non-negative at every command boundary, and every mutation either fully
//! applies or leaves the pair untouched.

use crate::numeric::decimal_text;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A mutation was refused because the source component held too little.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shortfall {
    pub required: Decimal,
    pub on_hand: Decimal,
}

/// Funds held in a single asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    #[serde(with = "decimal_text")]
    pub available: Decimal,
    #[serde(with = "decimal_text")]
    pub locked: Decimal,
}

impl Balance {
    /// Create a balance with everything available
    pub fn new(available: Decimal) -> Self {
        Self {
            available,
            locked: Decimal::ZERO,
        }
    }

    pub fn zero() -> Self {
        Self::new(Decimal::ZERO)
    }

    /// Sum of both components
    pub fn total(&self) -> Decimal {
        self.available + self.locked
    }

    /// Move `amount` from available to locked
    pub fn lock(&mut self, amount: Decimal) -> Result<(), Shortfall> {
        debug_assert!(amount >= Decimal::ZERO, "lock amount must be non-negative");
        if self.available < amount {
            return Err(Shortfall {
                required: amount,
                on_hand: self.available,
            });
        }
        self.available -= amount;
        self.locked += amount;
        Ok(())
    }

    /// Move `amount` from locked back to available
    pub fn unlock(&mut self, amount: Decimal) -> Result<(), Shortfall> {
        debug_assert!(amount >= Decimal::ZERO, "unlock amount must be non-negative");
        if self.locked < amount {
            return Err(Shortfall {
                required: amount,
                on_hand: self.locked,
            });
        }
        self.locked -= amount;
        self.available += amount;
        Ok(())
    }

    /// Add `amount` to available (deposit or settlement proceeds)
    pub fn credit(&mut self, amount: Decimal) {
        debug_assert!(amount >= Decimal::ZERO, "credit amount must be non-negative");
        self.available += amount;
    }

    /// Remove `amount` from available (withdrawal)
    pub fn debit(&mut self, amount: Decimal) -> Result<(), Shortfall> {
        debug_assert!(amount >= Decimal::ZERO, "debit amount must be non-negative");
        if self.available < amount {
            return Err(Shortfall {
                required: amount,
                on_hand: self.available,
            });
        }
        self.available -= amount;
        Ok(())
    }

    /// Remove `amount` from locked (settlement leg paying the counterparty)
    pub fn spend_locked(&mut self, amount: Decimal) -> Result<(), Shortfall> {
        debug_assert!(amount >= Decimal::ZERO, "spend amount must be non-negative");
        if self.locked < amount {
            return Err(Shortfall {
                required: amount,
                on_hand: self.locked,
            });
        }
        self.locked -= amount;
        Ok(())
    }
}

impl Default for Balance {
    fn default() -> Self {
        Self::zero()
    }
}
