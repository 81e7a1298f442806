//! Depth deltas
//!
//! Compares aggregate depth before and after a mutating command and reports
//! only the levels that changed. A zero quantity marks a removed level.
//! Deterministic ordering: bids descending, asks ascending.

use std::collections::{BTreeMap, BTreeSet};
use types::numeric::{Price, Quantity};

use crate::book::Orderbook;

/// Aggregates of every non-empty level on both sides at one point in time
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LevelSnapshot {
    bids: BTreeMap<Price, Quantity>,
    asks: BTreeMap<Price, Quantity>,
}

/// Capture the book's current level aggregates for a later diff
pub fn capture(book: &Orderbook) -> LevelSnapshot {
    let (bids, asks) = book.depth();
    LevelSnapshot {
        bids: bids.into_iter().collect(),
        asks: asks.into_iter().collect(),
    }
}

/// Changed levels between two captures: `(bids, asks)`
pub fn diff(
    before: &LevelSnapshot,
    after: &LevelSnapshot,
) -> (Vec<(Price, Quantity)>, Vec<(Price, Quantity)>) {
    let mut bids = diff_side(&before.bids, &after.bids);
    bids.reverse(); // descending
    let asks = diff_side(&before.asks, &after.asks);
    (bids, asks)
}

fn diff_side(
    before: &BTreeMap<Price, Quantity>,
    after: &BTreeMap<Price, Quantity>,
) -> Vec<(Price, Quantity)> {
    let prices: BTreeSet<Price> = before.keys().chain(after.keys()).copied().collect();
    prices
        .into_iter()
        .filter_map(|price| {
            let old = before.get(&price).copied().unwrap_or_else(Quantity::zero);
            let new = after.get(&price).copied().unwrap_or_else(Quantity::zero);
            (old != new).then_some((price, new))
        })
        .collect()
}
