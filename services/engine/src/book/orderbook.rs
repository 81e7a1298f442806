//! Per-market orderbook
//!
//! Matches incoming taker orders against resting makers under price-time
//! priority, supports cancellation, reports aggregated depth, and enforces
//! the market's self-trade prevention policy. Execution price is always the
//! resting (maker) order's price, even when the taker's limit improved on it.

use serde::{Deserialize, Serialize};
use types::fill::Fill;
use types::ids::{MarketSymbol, OrderId, UserId};
use types::numeric::{Price, Quantity};
use types::order::{Order, OrderStatus, Side, StpMode};

use super::{AskBook, BidBook};

/// Check whether a taker at `taker_price` crosses a resting level
fn crosses(taker_side: Side, taker_price: Price, level_price: Price) -> bool {
    match taker_side {
        Side::Buy => taker_price >= level_price,
        Side::Sell => taker_price <= level_price,
    }
}

/// Result of submitting an order to the book
#[derive(Debug, Clone)]
pub struct AddOrderOutcome {
    /// `Accepted` (rested, or fully consumed), `PartiallyFilled` (some
    /// execution, remainder rests), or `Rejected` (self-trade; no residue)
    pub status: OrderStatus,
    pub executed_qty: Quantity,
    /// Executions in matching order, each at the maker's price
    pub fills: Vec<Fill>,
    /// Resting orders removed by self-trade prevention; the caller owes
    /// their owners an unlock
    pub cancelled: Vec<Order>,
}

impl AddOrderOutcome {
    fn rejected(cancelled: Vec<Order>) -> Self {
        Self {
            status: OrderStatus::Rejected,
            executed_qty: Quantity::zero(),
            fills: Vec::new(),
            cancelled,
        }
    }
}

/// A single market's two-sided book
#[derive(Debug, Clone)]
pub struct Orderbook {
    market: MarketSymbol,
    bids: BidBook,
    asks: AskBook,
    /// Monotonic per-market trade counter; fills take the pre-increment value
    last_trade_id: u64,
    last_price: Option<Price>,
    stp_mode: StpMode,
}

impl Orderbook {
    pub fn new(market: MarketSymbol, stp_mode: StpMode) -> Self {
        Self {
            market,
            bids: BidBook::new(),
            asks: AskBook::new(),
            last_trade_id: 0,
            last_price: None,
            stp_mode,
        }
    }

    pub fn market(&self) -> &MarketSymbol {
        &self.market
    }

    pub fn base_asset(&self) -> &str {
        self.market.base()
    }

    pub fn quote_asset(&self) -> &str {
        self.market.quote()
    }

    pub fn bids(&self) -> &BidBook {
        &self.bids
    }

    pub fn asks(&self) -> &AskBook {
        &self.asks
    }

    pub fn last_price(&self) -> Option<Price> {
        self.last_price
    }

    pub fn last_trade_id(&self) -> u64 {
        self.last_trade_id
    }

    pub fn stp_mode(&self) -> StpMode {
        self.stp_mode
    }

    /// Submit an order: STP pre-check, match against the opposite side,
    /// rest any residue
    pub fn add_order(&mut self, mut order: Order) -> AddOrderOutcome {
        let conflicts = self.stp_conflicts(&order);
        let mut cancelled = Vec::new();
        if !conflicts.is_empty() {
            match self.stp_mode {
                StpMode::CancelNewest => return AddOrderOutcome::rejected(Vec::new()),
                StpMode::CancelOldest => {
                    cancelled = self.remove_conflicts(order.side, conflicts);
                }
                StpMode::CancelBoth => {
                    let removed = self.remove_conflicts(order.side, conflicts);
                    return AddOrderOutcome::rejected(removed);
                }
            }
        }

        let mut fills = Vec::new();
        while !order.is_filled() {
            let best = match order.side {
                Side::Buy => self.asks.best_level_mut(),
                Side::Sell => self.bids.best_level_mut(),
            };
            let Some((level_price, level)) = best else {
                break;
            };
            if !crosses(order.side, order.price, level_price) {
                break;
            }
            let Some(front) = level.front() else {
                break;
            };
            let fill_qty = order.remaining().min(front.remaining());
            let Some(maker) = level.fill_front(fill_qty) else {
                break;
            };
            order.fill(fill_qty);

            let trade_id = self.last_trade_id;
            self.last_trade_id += 1;
            fills.push(Fill {
                price: level_price,
                qty: fill_qty,
                trade_id,
                maker_order_id: maker.order_id,
                maker_user_id: maker.user_id,
            });

            match order.side {
                Side::Buy => self.asks.prune(level_price),
                Side::Sell => self.bids.prune(level_price),
            }
        }

        if let Some(last) = fills.last() {
            self.last_price = Some(last.price);
        }

        let executed_qty = order.filled;
        let status = if order.is_filled() {
            OrderStatus::Accepted
        } else {
            match order.side {
                Side::Buy => self.bids.insert(order),
                Side::Sell => self.asks.insert(order),
            }
            if fills.is_empty() {
                OrderStatus::Accepted
            } else {
                OrderStatus::PartiallyFilled
            }
        };

        self.debug_check_invariants();

        AddOrderOutcome {
            status,
            executed_qty,
            fills,
            cancelled,
        }
    }

    /// Resting orders of the same user that the incoming order would cross,
    /// walking the opposite side from best price
    fn stp_conflicts(&self, order: &Order) -> Vec<(OrderId, Price)> {
        let mut conflicts = Vec::new();
        match order.side {
            Side::Buy => {
                for (price, level) in self.asks.levels_best_first() {
                    if !crosses(order.side, order.price, price) {
                        break;
                    }
                    conflicts.extend(
                        level
                            .iter()
                            .filter(|o| o.user_id == order.user_id)
                            .map(|o| (o.order_id, price)),
                    );
                }
            }
            Side::Sell => {
                for (price, level) in self.bids.levels_best_first() {
                    if !crosses(order.side, order.price, price) {
                        break;
                    }
                    conflicts.extend(
                        level
                            .iter()
                            .filter(|o| o.user_id == order.user_id)
                            .map(|o| (o.order_id, price)),
                    );
                }
            }
        }
        conflicts
    }

    /// Remove STP conflicts from the opposite side, depth included
    fn remove_conflicts(
        &mut self,
        taker_side: Side,
        conflicts: Vec<(OrderId, Price)>,
    ) -> Vec<Order> {
        let mut removed = Vec::new();
        for (order_id, price) in conflicts {
            let order = match taker_side {
                Side::Buy => self.asks.remove(&order_id, price),
                Side::Sell => self.bids.remove(&order_id, price),
            };
            if let Some(order) = order {
                removed.push(order);
            }
        }
        removed
    }

    /// Remove a resting order by id, searching both sides
    ///
    /// Returns the removed order, or None for unknown (already filled or
    /// cancelled) ids.
    pub fn cancel(&mut self, order_id: &OrderId) -> Option<Order> {
        if let Some(price) = self.bids.locate(order_id) {
            return self.bids.remove(order_id, price);
        }
        if let Some(price) = self.asks.locate(order_id) {
            return self.asks.remove(order_id, price);
        }
        None
    }

    /// Snapshot copies of every resting order owned by `user_id`
    pub fn open_orders(&self, user_id: &UserId) -> Vec<Order> {
        self.bids
            .iter_orders()
            .chain(self.asks.iter_orders())
            .filter(|o| &o.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Aggregated depth: bids descending, asks ascending
    pub fn depth(&self) -> (Vec<(Price, Quantity)>, Vec<(Price, Quantity)>) {
        (self.bids.depth(), self.asks.depth())
    }

    /// Serializable record of the whole book
    pub fn snapshot(&self) -> BookSnapshot {
        BookSnapshot {
            market: self.market.clone(),
            base_asset: self.market.base().to_string(),
            quote_asset: self.market.quote().to_string(),
            bids: self.bids.iter_orders().cloned().collect(),
            asks: self.asks.iter_orders().cloned().collect(),
            last_trade_id: self.last_trade_id,
            last_price: self.last_price,
            stp_mode: self.stp_mode,
        }
    }

    /// Rebuild a book from a snapshot, reconstructing the per-level
    /// aggregates in one pass
    pub fn restore(snapshot: BookSnapshot) -> Self {
        let mut book = Self::new(snapshot.market, snapshot.stp_mode);
        book.last_trade_id = snapshot.last_trade_id;
        book.last_price = snapshot.last_price;
        for order in snapshot.bids {
            book.bids.insert(order);
        }
        for order in snapshot.asks {
            book.asks.insert(order);
        }
        book
    }

    #[cfg(debug_assertions)]
    fn debug_check_invariants(&self) {
        if let (Some(bid), Some(ask)) = (self.bids.best_price(), self.asks.best_price()) {
            debug_assert!(bid < ask, "book crossed: best bid {bid} >= best ask {ask}");
        }
    }

    #[cfg(not(debug_assertions))]
    fn debug_check_invariants(&self) {}
}

/// Plain record of a book's state for the snapshot file
///
/// Order sequences are best-price-first with time priority preserved within
/// a level, so re-inserting in order reproduces the book exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookSnapshot {
    pub market: MarketSymbol,
    pub base_asset: String,
    pub quote_asset: String,
    pub bids: Vec<Order>,
    pub asks: Vec<Order>,
    pub last_trade_id: u64,
    pub last_price: Option<Price>,
    pub stp_mode: StpMode,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book() -> Orderbook {
        Orderbook::new(MarketSymbol::new("TATA_INR"), StpMode::CancelNewest)
    }

    fn order(user: &str, side: Side, price: u64, qty: &str) -> Order {
        Order::new(
            OrderId::new(),
            UserId::new(user),
            MarketSymbol::new("TATA_INR"),
            side,
            Price::from_u64(price),
            Quantity::parse(qty).unwrap(),
        )
    }

    fn qty(s: &str) -> Quantity {
        Quantity::parse(s).unwrap()
    }

    #[test]
    fn test_resting_order_no_match() {
        let mut book = book();
        let outcome = book.add_order(order("u1", Side::Buy, 100, "10"));

        assert_eq!(outcome.status, OrderStatus::Accepted);
        assert!(outcome.fills.is_empty());
        assert!(outcome.executed_qty.is_zero());
        assert_eq!(book.bids().level_count(), 1);
    }

    #[test]
    fn test_full_fill_at_maker_price() {
        let mut book = book();
        book.add_order(order("u2", Side::Sell, 100, "10"));
        let outcome = book.add_order(order("u1", Side::Buy, 100, "10"));

        assert_eq!(outcome.status, OrderStatus::Accepted);
        assert_eq!(outcome.executed_qty, qty("10"));
        assert_eq!(outcome.fills.len(), 1);
        assert_eq!(outcome.fills[0].price, Price::from_u64(100));
        assert_eq!(outcome.fills[0].qty, qty("10"));
        assert!(book.bids().is_empty());
        assert!(book.asks().is_empty());
    }

    #[test]
    fn test_taker_improvement_still_fills_at_maker_price() {
        let mut book = book();
        book.add_order(order("u2", Side::Sell, 100, "5"));
        // Taker willing to pay 105, maker asked 100: fill at 100
        let outcome = book.add_order(order("u1", Side::Buy, 105, "5"));

        assert_eq!(outcome.fills[0].price, Price::from_u64(100));
        assert_eq!(book.last_price(), Some(Price::from_u64(100)));
    }

    #[test]
    fn test_partial_fill_rests_remainder() {
        let mut book = book();
        book.add_order(order("u2", Side::Sell, 100, "20"));
        let outcome = book.add_order(order("u1", Side::Buy, 100, "10"));

        // Taker fully consumed, maker remains with filled=10
        assert_eq!(outcome.status, OrderStatus::Accepted);
        assert_eq!(outcome.executed_qty, qty("10"));
        let (_, asks) = book.depth();
        assert_eq!(asks, vec![(Price::from_u64(100), qty("10"))]);
        let resting = book.open_orders(&UserId::new("u2"));
        assert_eq!(resting[0].filled, qty("10"));
    }

    #[test]
    fn test_taker_residue_is_partially_filled() {
        let mut book = book();
        book.add_order(order("u2", Side::Sell, 100, "4"));
        let outcome = book.add_order(order("u1", Side::Buy, 100, "10"));

        assert_eq!(outcome.status, OrderStatus::PartiallyFilled);
        assert_eq!(outcome.executed_qty, qty("4"));
        let (bids, asks) = book.depth();
        assert!(asks.is_empty());
        assert_eq!(bids, vec![(Price::from_u64(100), qty("6"))]);
    }

    #[test]
    fn test_sweep_levels_in_price_time_order() {
        let mut book = book();
        book.add_order(order("u1", Side::Buy, 1002, "2"));
        book.add_order(order("u2", Side::Buy, 1001, "3"));
        book.add_order(order("u3", Side::Buy, 1000, "5"));

        let outcome = book.add_order(order("u4", Side::Sell, 1000, "6"));

        assert_eq!(outcome.executed_qty, qty("6"));
        let fill_prices: Vec<Price> = outcome.fills.iter().map(|f| f.price).collect();
        assert_eq!(
            fill_prices,
            vec![
                Price::from_u64(1002),
                Price::from_u64(1001),
                Price::from_u64(1000)
            ]
        );
        assert_eq!(outcome.fills[0].qty, qty("2"));
        assert_eq!(outcome.fills[1].qty, qty("3"));
        assert_eq!(outcome.fills[2].qty, qty("1"));

        // Remaining bid at 1000 has filled=1, depth 4
        let (bids, _) = book.depth();
        assert_eq!(bids, vec![(Price::from_u64(1000), qty("4"))]);
        let resting = book.open_orders(&UserId::new("u3"));
        assert_eq!(resting[0].filled, qty("1"));
    }

    #[test]
    fn test_equal_price_matches_in_insertion_order() {
        let mut book = book();
        let first = order("u1", Side::Sell, 100, "3");
        let first_id = first.order_id;
        book.add_order(first);
        book.add_order(order("u2", Side::Sell, 100, "3"));

        let outcome = book.add_order(order("u3", Side::Buy, 100, "4"));

        assert_eq!(outcome.fills.len(), 2);
        assert_eq!(outcome.fills[0].maker_order_id, first_id);
        assert_eq!(outcome.fills[0].qty, qty("3"));
        assert_eq!(outcome.fills[1].qty, qty("1"));
    }

    #[test]
    fn test_no_cross_rests_both_sides() {
        let mut book = book();
        book.add_order(order("u1", Side::Buy, 990, "5"));
        let outcome = book.add_order(order("u2", Side::Sell, 1000, "5"));

        assert_eq!(outcome.status, OrderStatus::Accepted);
        assert!(outcome.fills.is_empty());
        let (bids, asks) = book.depth();
        assert_eq!(bids.len(), 1);
        assert_eq!(asks.len(), 1);
    }

    #[test]
    fn test_trade_ids_monotonic_across_commands() {
        let mut book = book();
        book.add_order(order("u1", Side::Sell, 100, "1"));
        book.add_order(order("u2", Side::Sell, 100, "1"));
        let first = book.add_order(order("u3", Side::Buy, 100, "1"));
        let second = book.add_order(order("u4", Side::Buy, 100, "1"));

        assert_eq!(first.fills[0].trade_id, 0);
        assert_eq!(second.fills[0].trade_id, 1);
        assert_eq!(book.last_trade_id(), 2);
    }

    #[test]
    fn test_stp_cancel_newest_rejects_without_mutation() {
        let mut book = book();
        book.add_order(order("u1", Side::Sell, 1000, "5"));
        let before = book.depth();

        let outcome = book.add_order(order("u1", Side::Buy, 1000, "5"));

        assert_eq!(outcome.status, OrderStatus::Rejected);
        assert!(outcome.fills.is_empty());
        assert!(outcome.cancelled.is_empty());
        assert_eq!(book.depth(), before);
        assert_eq!(book.last_trade_id(), 0);
    }

    #[test]
    fn test_stp_cancel_newest_only_triggers_on_cross() {
        let mut book = book();
        book.add_order(order("u1", Side::Sell, 1000, "5"));
        // Same user, non-crossing bid: no conflict
        let outcome = book.add_order(order("u1", Side::Buy, 990, "5"));

        assert_eq!(outcome.status, OrderStatus::Accepted);
        assert_eq!(book.bids().level_count(), 1);
        assert_eq!(book.asks().level_count(), 1);
    }

    #[test]
    fn test_stp_cancel_oldest_removes_conflicts_then_matches() {
        let mut book = Orderbook::new(MarketSymbol::new("TATA_INR"), StpMode::CancelOldest);
        let own = order("u1", Side::Sell, 1000, "5");
        let own_id = own.order_id;
        book.add_order(own);
        book.add_order(order("u2", Side::Sell, 1001, "5"));

        let outcome = book.add_order(order("u1", Side::Buy, 1001, "5"));

        // Own resting ask removed, then the order matched u2's ask at 1001
        assert_eq!(outcome.cancelled.len(), 1);
        assert_eq!(outcome.cancelled[0].order_id, own_id);
        assert_eq!(outcome.fills.len(), 1);
        assert_eq!(outcome.fills[0].price, Price::from_u64(1001));
        assert!(book.asks().is_empty());
    }

    #[test]
    fn test_stp_cancel_both_removes_conflicts_and_rejects() {
        let mut book = Orderbook::new(MarketSymbol::new("TATA_INR"), StpMode::CancelBoth);
        book.add_order(order("u1", Side::Sell, 1000, "5"));
        book.add_order(order("u1", Side::Sell, 1001, "2"));
        book.add_order(order("u2", Side::Sell, 1000, "3"));

        let outcome = book.add_order(order("u1", Side::Buy, 1001, "10"));

        assert_eq!(outcome.status, OrderStatus::Rejected);
        // Both crossing conflicts removed, across price levels
        assert_eq!(outcome.cancelled.len(), 2);
        assert!(outcome.fills.is_empty());
        // u2's ask untouched; nothing rested
        assert!(book.bids().is_empty());
        let (_, asks) = book.depth();
        assert_eq!(asks, vec![(Price::from_u64(1000), qty("3"))]);
    }

    #[test]
    fn test_cancel_returns_order_and_clears_depth() {
        let mut book = book();
        let resting = order("u1", Side::Buy, 100, "10");
        let id = resting.order_id;
        book.add_order(resting);

        let cancelled = book.cancel(&id).unwrap();
        assert_eq!(cancelled.order_id, id);
        assert_eq!(cancelled.remaining(), qty("10"));
        assert!(book.bids().is_empty());

        // Cancelling again is a no-op
        assert!(book.cancel(&id).is_none());
    }

    #[test]
    fn test_open_orders_copies_both_sides() {
        let mut book = book();
        book.add_order(order("u1", Side::Buy, 90, "1"));
        book.add_order(order("u1", Side::Sell, 110, "2"));
        book.add_order(order("u2", Side::Sell, 111, "3"));

        let orders = book.open_orders(&UserId::new("u1"));
        assert_eq!(orders.len(), 2);
    }

    #[test]
    fn test_snapshot_restore_roundtrip() {
        let mut book = book();
        book.add_order(order("u1", Side::Buy, 99, "5"));
        book.add_order(order("u2", Side::Sell, 101, "20"));
        book.add_order(order("u3", Side::Buy, 101, "8")); // partial fill of u2's ask

        let snapshot = book.snapshot();
        assert_eq!(snapshot.base_asset, "TATA");
        assert_eq!(snapshot.quote_asset, "INR");

        let restored = Orderbook::restore(snapshot);
        assert_eq!(restored.depth(), book.depth());
        assert_eq!(restored.last_trade_id(), book.last_trade_id());
        assert_eq!(restored.last_price(), book.last_price());
        assert_eq!(
            restored.open_orders(&UserId::new("u2"))[0].filled,
            qty("8")
        );
    }
}
