//! Order lifecycle types

use crate::ids::{MarketSymbol, OrderId, UserId};
use crate::numeric::{Price, Quantity};
use serde::{Deserialize, Serialize};

/// Order side (buyer or seller)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Buy order (bid)
    Buy,
    /// Sell order (ask)
    Sell,
}

impl Side {
    /// Get the opposite side
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// Self-trade prevention policy, configured per market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StpMode {
    /// Reject the incoming order, leave the book untouched
    #[default]
    CancelNewest,
    /// Cancel the conflicting resting orders, then match the incoming order
    CancelOldest,
    /// Cancel the conflicting resting orders and reject the incoming order
    CancelBoth,
}

/// Order status
///
/// `Accepted` and `PartiallyFilled` orders rest on the book; `Rejected`,
/// `Filled`, and `Cancelled` are terminal. `Cancelled` is reachable only
/// from a resting state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Accepted,
    PartiallyFilled,
    Filled,
    Rejected,
    Cancelled,
}

impl OrderStatus {
    /// Check if status is terminal (no further transitions possible)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Rejected | OrderStatus::Cancelled
        )
    }
}

/// A limit order
///
/// Created by a `CreateOrder` command; rests on its market's book if not
/// fully consumed during taker matching; mutated only by matching (which
/// increments `filled`) or removed by cancellation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub market: MarketSymbol,
    pub side: Side,
    pub price: Price,
    pub quantity: Quantity,
    pub filled: Quantity,
}

impl Order {
    /// Create a new unfilled order
    pub fn new(
        order_id: OrderId,
        user_id: UserId,
        market: MarketSymbol,
        side: Side,
        price: Price,
        quantity: Quantity,
    ) -> Self {
        Self {
            order_id,
            user_id,
            market,
            side,
            price,
            quantity,
            filled: Quantity::zero(),
        }
    }

    /// Unfilled remainder: `quantity - filled`
    pub fn remaining(&self) -> Quantity {
        self.quantity - self.filled
    }

    /// Check if the order is completely filled
    pub fn is_filled(&self) -> bool {
        self.filled == self.quantity
    }

    /// Record an execution against this order
    ///
    /// The matching loop bounds `qty` by `remaining()`, so `filled` can never
    /// exceed `quantity`; checked in debug builds.
    pub fn fill(&mut self, qty: Quantity) {
        let new_filled = self.filled + qty;
        debug_assert!(
            new_filled <= self.quantity,
            "fill would exceed order quantity"
        );
        self.filled = new_filled;
    }
}
