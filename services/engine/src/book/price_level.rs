//! Price level with FIFO queue
//!
//! A price level holds every resting order at one price, in insertion order,
//! to enforce time priority. The level caches the aggregate unfilled quantity
//! so depth queries never walk the queue.

use std::collections::VecDeque;
use types::ids::OrderId;
use types::numeric::Quantity;
use types::order::Order;

/// All resting orders at a single price, oldest first
#[derive(Debug, Clone)]
pub struct PriceLevel {
    orders: VecDeque<Order>,
    /// Sum of `remaining()` over the queue
    total: Quantity,
}

impl PriceLevel {
    /// Create a new empty price level
    pub fn new() -> Self {
        Self {
            orders: VecDeque::new(),
            total: Quantity::zero(),
        }
    }

    /// Append an order at the back of the queue (time priority)
    pub fn push_back(&mut self, order: Order) {
        self.total = self.total + order.remaining();
        self.orders.push_back(order);
    }

    /// Remove an order from the queue by id
    ///
    /// Returns the removed order, or None if not found.
    pub fn remove(&mut self, order_id: &OrderId) -> Option<Order> {
        let position = self.orders.iter().position(|o| &o.order_id == order_id)?;
        let order = self.orders.remove(position)?;
        self.total = self.total - order.remaining();
        Some(order)
    }

    /// The oldest resting order at this price
    pub fn front(&self) -> Option<&Order> {
        self.orders.front()
    }

    /// Execute `qty` against the front order
    ///
    /// Decrements the cached aggregate and pops the order once fully filled.
    /// Returns the maker's state after the fill, or None if the level is
    /// empty. `qty` must not exceed the front order's remainder.
    pub fn fill_front(&mut self, qty: Quantity) -> Option<Order> {
        let order = self.orders.front_mut()?;
        order.fill(qty);
        self.total = self.total - qty;
        let snapshot = order.clone();
        if snapshot.is_filled() {
            self.orders.pop_front();
        }
        Some(snapshot)
    }

    /// Iterate resting orders in time priority order
    pub fn iter(&self) -> impl Iterator<Item = &Order> {
        self.orders.iter()
    }

    /// Check if the price level is empty
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Aggregate unfilled quantity at this level
    pub fn total_remaining(&self) -> Quantity {
        self.total
    }

    /// Number of orders at this level
    pub fn order_count(&self) -> usize {
        self.orders.len()
    }
}

impl Default for PriceLevel {
    fn default() -> Self {
        Self::new()
    }
}
