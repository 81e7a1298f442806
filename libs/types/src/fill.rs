//! Fill and trade persistence records

use crate::ids::{MarketSymbol, OrderId, UserId};
use crate::numeric::{decimal_text, Price, Quantity};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Record of one match between a taker and a resting maker
///
/// Immutable once produced. The price is always the maker's resting price,
/// even when the taker's limit improved on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub price: Price,
    pub qty: Quantity,
    pub trade_id: u64,
    pub maker_order_id: OrderId,
    pub maker_user_id: UserId,
}

impl Fill {
    /// Notional value of this fill in the quote asset
    pub fn quote_value(&self) -> Decimal {
        self.qty * self.price
    }
}

/// Trade row for the persistence channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub id: u64,
    pub market: MarketSymbol,
    pub price: Price,
    pub quantity: Quantity,
    #[serde(with = "decimal_text")]
    pub quote_quantity: Decimal,
    /// True when the resting side of the trade was the buyer
    /// (i.e. the taker sold into a bid).
    pub is_buyer_maker: bool,
    /// Unix milliseconds
    pub timestamp: i64,
    pub buyer_user_id: Option<UserId>,
    pub seller_user_id: Option<UserId>,
}
