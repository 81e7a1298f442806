//! Wire messages
//!
//! Tagged unions for the command queue, the per-client result channel, the
//! broadcast event channels, and the persistence queue. All monetary fields
//! travel as canonical decimal text. Incoming numeric fields stay as raw
//! strings so the dispatcher can reject malformed values with a typed result
//! instead of a transport-level deserialization failure.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use types::balance::Balance;
use types::fill::TradeRecord;
use types::ids::{ClientId, MarketSymbol, OrderId, UserId};
use types::numeric::{decimal_text, Price, Quantity};
use types::order::{Order, OrderStatus, Side};

/// Inbound envelope from the request queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiRequest {
    pub client_id: ClientId,
    pub message: Command,
}

/// Command set
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Command {
    #[serde(rename = "CREATE_ORDER")]
    CreateOrder {
        market: String,
        side: Side,
        price: String,
        quantity: String,
        user_id: UserId,
    },
    #[serde(rename = "CANCEL_ORDER")]
    CancelOrder { market: String, order_id: OrderId },
    #[serde(rename = "GET_OPEN_ORDERS")]
    GetOpenOrders { market: String, user_id: UserId },
    #[serde(rename = "GET_DEPTH")]
    GetDepth { market: String },
    #[serde(rename = "GET_BALANCE")]
    GetBalance { user_id: UserId },
    #[serde(rename = "ON_RAMP")]
    OnRamp {
        user_id: UserId,
        asset: String,
        amount: String,
        txn_id: String,
    },
    #[serde(rename = "WITHDRAW")]
    Withdraw {
        user_id: UserId,
        asset: String,
        amount: String,
        txn_id: String,
    },
}

/// Rejection code on `ORDER_REJECTED`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectCode {
    SelfTrade,
    OrderFailed,
}

/// One execution as reported back to the requesting client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillSummary {
    pub price: Price,
    pub qty: Quantity,
    pub trade_id: u64,
}

/// Result payloads, exactly one per command, keyed by `client_id`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ClientResponse {
    #[serde(rename = "ORDER_PLACED")]
    OrderPlaced {
        order_id: OrderId,
        executed_qty: Quantity,
        fills: Vec<FillSummary>,
    },
    #[serde(rename = "ORDER_REJECTED")]
    OrderRejected {
        order_id: String,
        executed_qty: Quantity,
        remaining_qty: Quantity,
        reason: String,
        code: RejectCode,
    },
    #[serde(rename = "ORDER_CANCELLED")]
    OrderCancelled {
        order_id: String,
        executed_qty: Quantity,
        remaining_qty: Quantity,
    },
    #[serde(rename = "OPEN_ORDERS")]
    OpenOrders(Vec<Order>),
    #[serde(rename = "DEPTH")]
    Depth {
        bids: Vec<(Price, Quantity)>,
        asks: Vec<(Price, Quantity)>,
    },
    #[serde(rename = "BALANCE")]
    Balance(BTreeMap<String, Balance>),
    #[serde(rename = "ON_RAMP_SUCCESS")]
    OnRampSuccess {
        user_id: UserId,
        #[serde(with = "decimal_text")]
        amount: Decimal,
        #[serde(with = "decimal_text")]
        new_balance: Decimal,
    },
    #[serde(rename = "ON_RAMP_FAILED")]
    OnRampFailed {
        user_id: UserId,
        error: String,
        txn_id: String,
    },
    #[serde(rename = "WITHDRAW_SUCCESS")]
    WithdrawSuccess {
        user_id: UserId,
        #[serde(with = "decimal_text")]
        amount: Decimal,
        #[serde(with = "decimal_text")]
        new_balance: Decimal,
        txn_id: String,
    },
    #[serde(rename = "WITHDRAW_FAILED")]
    WithdrawFailed {
        user_id: UserId,
        error: String,
        txn_id: String,
    },
}

/// Counterparty role on a user-trade event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeRole {
    Maker,
    Taker,
}

/// Broadcast payloads on the market and user event channels
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "e")]
pub enum StreamEvent {
    /// Changed price levels only; a zero quantity signals level removal
    #[serde(rename = "depth")]
    Depth {
        b: Vec<(Price, Quantity)>,
        a: Vec<(Price, Quantity)>,
    },
    #[serde(rename = "trade")]
    Trade {
        t: u64,
        /// True when the resting side was the buyer
        m: bool,
        p: Price,
        q: Quantity,
        s: MarketSymbol,
    },
    #[serde(rename = "userTrade")]
    UserTrade {
        t: u64,
        s: MarketSymbol,
        p: Price,
        q: Quantity,
        side: Side,
        role: TradeRole,
        timestamp: i64,
    },
}

/// Incremental order state for the persistence writer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderUpdate {
    pub order_id: OrderId,
    pub executed_qty: Quantity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market: Option<MarketSymbol>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Price>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<Quantity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub side: Option<Side>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
}

/// Messages on the persistence queue
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum DbMessage {
    #[serde(rename = "TRADE_ADDED")]
    TradeAdded(TradeRecord),
    #[serde(rename = "ORDER_UPDATE")]
    OrderUpdate(OrderUpdate),
}

/// Everything the engine emits while processing one command
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outbound {
    /// Result to the requesting client
    ClientResponse {
        client_id: ClientId,
        payload: ClientResponse,
    },
    /// Broadcast on a named event channel
    Broadcast { channel: String, event: StreamEvent },
    /// Row for the persistence writer
    Persist { message: DbMessage },
}

pub fn depth_channel(market: &MarketSymbol) -> String {
    format!("depth@{market}")
}

pub fn trade_channel(market: &MarketSymbol) -> String {
    format!("trade@{market}")
}

pub fn user_trades_channel(user: &UserId) -> String {
    format!("userTrades@{user}")
}
