//! Ask (sell-side) book
//!
//! Sell orders grouped into price levels, best (lowest) price first.

use std::collections::BTreeMap;
use types::ids::OrderId;
use types::numeric::{Price, Quantity};
use types::order::Order;

use super::price_level::PriceLevel;

/// Sell side of a market's book
#[derive(Debug, Clone, Default)]
pub struct AskBook {
    /// Price levels; BTreeMap iterates ascending, so best ask is the first key
    levels: BTreeMap<Price, PriceLevel>,
}

impl AskBook {
    pub fn new() -> Self {
        Self {
            levels: BTreeMap::new(),
        }
    }

    /// Insert an order at the tail of its price level
    pub fn insert(&mut self, order: Order) {
        self.levels.entry(order.price).or_default().push_back(order);
    }

    /// Remove an order, dropping its level if emptied
    pub fn remove(&mut self, order_id: &OrderId, price: Price) -> Option<Order> {
        let level = self.levels.get_mut(&price)?;
        let order = level.remove(order_id)?;
        if level.is_empty() {
            self.levels.remove(&price);
        }
        Some(order)
    }

    /// Find the price level holding `order_id`
    pub fn locate(&self, order_id: &OrderId) -> Option<Price> {
        self.levels
            .iter()
            .find(|(_, level)| level.iter().any(|o| &o.order_id == order_id))
            .map(|(price, _)| *price)
    }

    /// Best (lowest) ask price
    pub fn best_price(&self) -> Option<Price> {
        self.levels.keys().next().copied()
    }

    /// Mutable access to the best ask level
    pub fn best_level_mut(&mut self) -> Option<(Price, &mut PriceLevel)> {
        self.levels
            .iter_mut()
            .next()
            .map(|(price, level)| (*price, level))
    }

    /// Drop the level at `price` if it holds no orders
    pub fn prune(&mut self, price: Price) {
        if self.levels.get(&price).is_some_and(|l| l.is_empty()) {
            self.levels.remove(&price);
        }
    }

    /// Levels from best (lowest) price upwards
    pub fn levels_best_first(&self) -> impl Iterator<Item = (Price, &PriceLevel)> {
        self.levels.iter().map(|(price, level)| (*price, level))
    }

    /// Every resting ask, best price first, time priority within a level
    pub fn iter_orders(&self) -> impl Iterator<Item = &Order> {
        self.levels.values().flat_map(|level| level.iter())
    }

    /// Aggregate depth, best price first, empty levels excluded
    pub fn depth(&self) -> Vec<(Price, Quantity)> {
        self.levels
            .iter()
            .filter(|(_, level)| !level.total_remaining().is_zero())
            .map(|(price, level)| (*price, level.total_remaining()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Number of non-empty price levels
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }
}
