//! Engine dispatcher
//!
//! Owns every orderbook and the balance ledger, and is the only component
//! that mutates them. Commands enter one at a time through
//! [`Engine::apply_command`], which runs the full validate → lock → match →
//! settle → emit workflow and returns every message the command produced:
//! exactly one result for the requesting client, plus market events and
//! persistence rows.

use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;
use tracing::{debug, error, warn};
use types::ids::{ClientId, MarketSymbol, OrderId, UserId};
use types::numeric::{Price, Quantity};
use types::order::{Order, OrderStatus, Side, StpMode};

use crate::book::Orderbook;
use crate::config::SeedSettings;
use crate::depth::{self, LevelSnapshot};
use crate::ledger::Ledger;
use crate::messages::{
    depth_channel, trade_channel, user_trades_channel, ApiRequest, ClientResponse, Command,
    DbMessage, FillSummary, Outbound, OrderUpdate, RejectCode, StreamEvent, TradeRole,
};
use crate::snapshot::EngineSnapshot;
use types::fill::TradeRecord;

/// The engine root: market registry plus balance ledger
pub struct Engine {
    markets: HashMap<MarketSymbol, Orderbook>,
    ledger: Ledger,
}

impl Engine {
    pub fn new() -> Self {
        Self {
            markets: HashMap::new(),
            ledger: Ledger::new(),
        }
    }

    /// Build an engine from seed configuration (markets and balances)
    pub fn from_seed(seed: &SeedSettings) -> Self {
        let mut engine = Self::new();
        for market in &seed.markets {
            match MarketSymbol::try_new(market.symbol.clone()) {
                Some(symbol) => engine.add_market(symbol, market.stp_mode),
                None => warn!(symbol = %market.symbol, "skipping malformed seed market"),
            }
        }
        for balance in &seed.balances {
            match Decimal::from_str(&balance.amount) {
                Ok(amount) if amount >= Decimal::ZERO => {
                    let user = UserId::new(balance.user_id.clone());
                    engine.ledger.credit(&user, &balance.asset, amount);
                }
                _ => warn!(
                    user = %balance.user_id,
                    asset = %balance.asset,
                    amount = %balance.amount,
                    "skipping malformed seed balance"
                ),
            }
        }
        engine
    }

    pub fn add_market(&mut self, symbol: MarketSymbol, stp_mode: StpMode) {
        self.markets
            .entry(symbol.clone())
            .or_insert_with(|| Orderbook::new(symbol, stp_mode));
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn market(&self, symbol: &MarketSymbol) -> Option<&Orderbook> {
        self.markets.get(symbol)
    }

    /// Serializable copy of the full engine state, deterministically ordered
    pub fn snapshot(&self) -> EngineSnapshot {
        let mut orderbooks: Vec<_> = self.markets.values().map(|b| b.snapshot()).collect();
        orderbooks.sort_by(|a, b| a.market.cmp(&b.market));
        EngineSnapshot {
            orderbooks,
            balances: self.ledger.snapshot(),
        }
    }

    /// Rebuild an engine from a snapshot
    pub fn from_snapshot(snapshot: EngineSnapshot) -> Self {
        let mut markets = HashMap::new();
        for book_snapshot in snapshot.orderbooks {
            let book = Orderbook::restore(book_snapshot);
            markets.insert(book.market().clone(), book);
        }
        Self {
            markets,
            ledger: Ledger::restore(snapshot.balances),
        }
    }

    /// Process one command to completion, returning every emitted message
    pub fn apply_command(&mut self, request: ApiRequest) -> Vec<Outbound> {
        let ApiRequest { client_id, message } = request;
        match message {
            Command::CreateOrder {
                market,
                side,
                price,
                quantity,
                user_id,
            } => self.create_order(client_id, market, side, price, quantity, user_id),
            Command::CancelOrder { market, order_id } => {
                self.cancel_order(client_id, market, order_id)
            }
            Command::GetOpenOrders { market, user_id } => {
                self.get_open_orders(client_id, market, user_id)
            }
            Command::GetDepth { market } => self.get_depth(client_id, market),
            Command::GetBalance { user_id } => vec![Outbound::ClientResponse {
                client_id,
                payload: ClientResponse::Balance(self.ledger.get(&user_id)),
            }],
            Command::OnRamp {
                user_id,
                asset,
                amount,
                txn_id,
            } => self.on_ramp(client_id, user_id, asset, amount, txn_id),
            Command::Withdraw {
                user_id,
                asset,
                amount,
                txn_id,
            } => self.withdraw(client_id, user_id, asset, amount, txn_id),
        }
    }

    fn create_order(
        &mut self,
        client_id: ClientId,
        market: String,
        side: Side,
        price: String,
        quantity: String,
        user_id: UserId,
    ) -> Vec<Outbound> {
        let Some(symbol) = MarketSymbol::try_new(market.clone()) else {
            return vec![order_rejected(
                client_id,
                format!("malformed market symbol: {market}"),
                RejectCode::OrderFailed,
            )];
        };
        if !self.markets.contains_key(&symbol) {
            warn!(market = %symbol, "order for unknown market");
            return vec![order_rejected(
                client_id,
                format!("unknown market: {symbol}"),
                RejectCode::OrderFailed,
            )];
        }
        let price = match Price::parse(&price) {
            Ok(price) => price,
            Err(e) => return vec![order_rejected(client_id, e.to_string(), RejectCode::OrderFailed)],
        };
        let quantity = match Quantity::parse(&quantity) {
            Ok(quantity) if !quantity.is_zero() => quantity,
            Ok(_) => {
                return vec![order_rejected(
                    client_id,
                    "quantity must be positive".to_string(),
                    RejectCode::OrderFailed,
                )]
            }
            Err(e) => return vec![order_rejected(client_id, e.to_string(), RejectCode::OrderFailed)],
        };
        let base = symbol.base().to_string();
        let quote = symbol.quote().to_string();

        if let Err(e) = self
            .ledger
            .lock(&user_id, side, &base, &quote, price, quantity)
        {
            debug!(user = %user_id, market = %symbol, error = %e, "fund lock refused");
            return vec![order_rejected(client_id, e.to_string(), RejectCode::OrderFailed)];
        }

        let order = Order::new(
            OrderId::new(),
            user_id.clone(),
            symbol.clone(),
            side,
            price,
            quantity,
        );
        let order_id = order.order_id;

        let Some(book) = self.markets.get_mut(&symbol) else {
            // Unreachable: existence checked above. Restore the lock and bail.
            error!(market = %symbol, "market vanished mid-command");
            if let Err(e) = self
                .ledger
                .unlock(&user_id, side, &base, &quote, price, quantity)
            {
                error!(user = %user_id, error = %e, "failed to restore lock");
            }
            return vec![order_rejected(
                client_id,
                format!("unknown market: {symbol}"),
                RejectCode::OrderFailed,
            )];
        };

        let before = depth::capture(book);
        let outcome = book.add_order(order);
        let after = depth::capture(book);
        let now = Utc::now().timestamp_millis();

        let mut out = Vec::new();

        if outcome.status == OrderStatus::Rejected {
            // Self-trade: restore the taker's lock, refund any makers the
            // CANCEL_BOTH pass removed, and report the rejection
            if let Err(e) = self
                .ledger
                .unlock(&user_id, side, &base, &quote, price, quantity)
            {
                error!(user = %user_id, error = %e, "failed to restore lock after STP rejection");
            }
            debug!(user = %user_id, market = %symbol, "order rejected by self-trade prevention");
            out.push(order_rejected(
                client_id,
                "order would match own resting order".to_string(),
                RejectCode::SelfTrade,
            ));
            self.refund_cancelled(&symbol, &base, &quote, &outcome.cancelled, &mut out);
            push_depth_delta(&mut out, &symbol, &before, &after);
            return out;
        }

        for fill in &outcome.fills {
            if let Err(e) = self.ledger.settle_fill(
                &user_id,
                &fill.maker_user_id,
                side,
                &base,
                &quote,
                fill.qty,
                fill.price,
            ) {
                error!(
                    trade_id = fill.trade_id,
                    market = %symbol,
                    error = %e,
                    "settlement failed"
                );
            }
        }

        if side == Side::Buy {
            // The lock reserved quote at the taker's limit; fills at better
            // maker prices leave a surplus in locked. Return it.
            let surplus: Decimal = outcome
                .fills
                .iter()
                .map(|f| f.qty.as_decimal() * (price.as_decimal() - f.price.as_decimal()))
                .sum();
            if surplus > Decimal::ZERO {
                if let Err(e) = self.ledger.unlock_amount(&user_id, &quote, surplus) {
                    error!(user = %user_id, error = %e, "failed to return price-improvement surplus");
                }
            }
        }

        debug!(
            order_id = %order_id,
            market = %symbol,
            user = %user_id,
            executed = %outcome.executed_qty,
            fills = outcome.fills.len(),
            "order processed"
        );

        out.push(Outbound::ClientResponse {
            client_id,
            payload: ClientResponse::OrderPlaced {
                order_id,
                executed_qty: outcome.executed_qty,
                fills: outcome
                    .fills
                    .iter()
                    .map(|f| FillSummary {
                        price: f.price,
                        qty: f.qty,
                        trade_id: f.trade_id,
                    })
                    .collect(),
            },
        });

        let is_buyer_maker = side == Side::Sell;
        for fill in &outcome.fills {
            let (buyer, seller) = match side {
                Side::Buy => (&user_id, &fill.maker_user_id),
                Side::Sell => (&fill.maker_user_id, &user_id),
            };
            out.push(Outbound::Persist {
                message: DbMessage::TradeAdded(TradeRecord {
                    id: fill.trade_id,
                    market: symbol.clone(),
                    price: fill.price,
                    quantity: fill.qty,
                    quote_quantity: fill.quote_value(),
                    is_buyer_maker,
                    timestamp: now,
                    buyer_user_id: Some(buyer.clone()),
                    seller_user_id: Some(seller.clone()),
                }),
            });
            out.push(Outbound::Persist {
                message: DbMessage::OrderUpdate(OrderUpdate {
                    order_id: fill.maker_order_id,
                    executed_qty: fill.qty,
                    market: Some(symbol.clone()),
                    price: Some(fill.price),
                    quantity: None,
                    side: None,
                    user_id: Some(fill.maker_user_id.clone()),
                    status: None,
                }),
            });
            out.push(Outbound::Broadcast {
                channel: trade_channel(&symbol),
                event: StreamEvent::Trade {
                    t: fill.trade_id,
                    m: is_buyer_maker,
                    p: fill.price,
                    q: fill.qty,
                    s: symbol.clone(),
                },
            });
            out.push(Outbound::Broadcast {
                channel: user_trades_channel(&user_id),
                event: StreamEvent::UserTrade {
                    t: fill.trade_id,
                    s: symbol.clone(),
                    p: fill.price,
                    q: fill.qty,
                    side,
                    role: TradeRole::Taker,
                    timestamp: now,
                },
            });
            out.push(Outbound::Broadcast {
                channel: user_trades_channel(&fill.maker_user_id),
                event: StreamEvent::UserTrade {
                    t: fill.trade_id,
                    s: symbol.clone(),
                    p: fill.price,
                    q: fill.qty,
                    side: side.opposite(),
                    role: TradeRole::Maker,
                    timestamp: now,
                },
            });
        }

        let taker_status = if outcome.executed_qty == quantity {
            OrderStatus::Filled
        } else if !outcome.executed_qty.is_zero() {
            OrderStatus::PartiallyFilled
        } else {
            OrderStatus::Accepted
        };
        out.push(Outbound::Persist {
            message: DbMessage::OrderUpdate(OrderUpdate {
                order_id,
                executed_qty: outcome.executed_qty,
                market: Some(symbol.clone()),
                price: Some(price),
                quantity: Some(quantity),
                side: Some(side),
                user_id: Some(user_id.clone()),
                status: Some(taker_status),
            }),
        });

        self.refund_cancelled(&symbol, &base, &quote, &outcome.cancelled, &mut out);
        push_depth_delta(&mut out, &symbol, &before, &after);
        out
    }

    /// Return locked funds for resting orders removed by self-trade
    /// prevention, exactly as a user cancel would, and record the removals
    fn refund_cancelled(
        &mut self,
        symbol: &MarketSymbol,
        base: &str,
        quote: &str,
        cancelled: &[Order],
        out: &mut Vec<Outbound>,
    ) {
        for order in cancelled {
            let result = match order.side {
                Side::Buy => {
                    self.ledger
                        .unlock_amount(&order.user_id, quote, order.remaining() * order.price)
                }
                Side::Sell => self.ledger.unlock_amount(
                    &order.user_id,
                    base,
                    order.remaining().as_decimal(),
                ),
            };
            if let Err(e) = result {
                error!(
                    order_id = %order.order_id,
                    user = %order.user_id,
                    error = %e,
                    "failed to refund cancelled maker"
                );
            }
            out.push(Outbound::Persist {
                message: DbMessage::OrderUpdate(OrderUpdate {
                    order_id: order.order_id,
                    executed_qty: order.filled,
                    market: Some(symbol.clone()),
                    price: Some(order.price),
                    quantity: Some(order.quantity),
                    side: Some(order.side),
                    user_id: Some(order.user_id.clone()),
                    status: Some(OrderStatus::Cancelled),
                }),
            });
        }
    }

    fn cancel_order(
        &mut self,
        client_id: ClientId,
        market: String,
        order_id: OrderId,
    ) -> Vec<Outbound> {
        let Some(symbol) = MarketSymbol::try_new(market.clone()) else {
            warn!(market = %market, order_id = %order_id, "cancel for malformed market");
            return vec![noop_cancelled(client_id, &order_id)];
        };
        let Some(book) = self.markets.get_mut(&symbol) else {
            warn!(market = %market, order_id = %order_id, "cancel for unknown market");
            return vec![noop_cancelled(client_id, &order_id)];
        };
        let base = symbol.base().to_string();
        let quote = symbol.quote().to_string();

        let before = depth::capture(book);
        let Some(order) = book.cancel(&order_id) else {
            // Already filled, already cancelled, or never existed: the
            // ledger is untouched either way
            warn!(market = %symbol, order_id = %order_id, "cancel for unknown order");
            return vec![noop_cancelled(client_id, &order_id)];
        };
        let after = depth::capture(book);

        let refund = match order.side {
            Side::Buy => self
                .ledger
                .unlock_amount(&order.user_id, &quote, order.remaining() * order.price),
            Side::Sell => self
                .ledger
                .unlock_amount(&order.user_id, &base, order.remaining().as_decimal()),
        };
        if let Err(e) = refund {
            error!(order_id = %order_id, error = %e, "failed to unlock cancelled order funds");
        }

        debug!(order_id = %order_id, market = %symbol, "order cancelled");

        let mut out = vec![Outbound::ClientResponse {
            client_id,
            payload: ClientResponse::OrderCancelled {
                order_id: order_id.to_string(),
                executed_qty: order.filled,
                remaining_qty: order.remaining(),
            },
        }];
        out.push(Outbound::Persist {
            message: DbMessage::OrderUpdate(OrderUpdate {
                order_id,
                executed_qty: order.filled,
                market: Some(symbol.clone()),
                price: Some(order.price),
                quantity: Some(order.quantity),
                side: Some(order.side),
                user_id: Some(order.user_id.clone()),
                status: Some(OrderStatus::Cancelled),
            }),
        });
        push_depth_delta(&mut out, &symbol, &before, &after);
        out
    }

    fn get_open_orders(
        &self,
        client_id: ClientId,
        market: String,
        user_id: UserId,
    ) -> Vec<Outbound> {
        let orders = MarketSymbol::try_new(market)
            .and_then(|symbol| self.markets.get(&symbol))
            .map(|book| book.open_orders(&user_id))
            .unwrap_or_default();
        vec![Outbound::ClientResponse {
            client_id,
            payload: ClientResponse::OpenOrders(orders),
        }]
    }

    fn get_depth(&self, client_id: ClientId, market: String) -> Vec<Outbound> {
        let (bids, asks) = MarketSymbol::try_new(market)
            .and_then(|symbol| self.markets.get(&symbol))
            .map(|book| book.depth())
            .unwrap_or_default();
        vec![Outbound::ClientResponse {
            client_id,
            payload: ClientResponse::Depth { bids, asks },
        }]
    }

    fn on_ramp(
        &mut self,
        client_id: ClientId,
        user_id: UserId,
        asset: String,
        amount: String,
        txn_id: String,
    ) -> Vec<Outbound> {
        let payload = match Decimal::from_str(&amount) {
            Ok(parsed) if parsed > Decimal::ZERO => {
                let new_balance = self.ledger.credit(&user_id, &asset, parsed);
                debug!(user = %user_id, asset = %asset, amount = %parsed, "on-ramp credited");
                ClientResponse::OnRampSuccess {
                    user_id,
                    amount: parsed,
                    new_balance,
                }
            }
            _ => {
                warn!(user = %user_id, amount = %amount, "malformed on-ramp amount");
                ClientResponse::OnRampFailed {
                    user_id,
                    error: format!("invalid amount: {amount}"),
                    txn_id,
                }
            }
        };
        vec![Outbound::ClientResponse { client_id, payload }]
    }

    fn withdraw(
        &mut self,
        client_id: ClientId,
        user_id: UserId,
        asset: String,
        amount: String,
        txn_id: String,
    ) -> Vec<Outbound> {
        let payload = match Decimal::from_str(&amount) {
            Ok(parsed) if parsed > Decimal::ZERO => {
                match self.ledger.debit(&user_id, &asset, parsed) {
                    Ok(new_balance) => {
                        debug!(user = %user_id, asset = %asset, amount = %parsed, "withdrawal debited");
                        ClientResponse::WithdrawSuccess {
                            user_id,
                            amount: parsed,
                            new_balance,
                            txn_id,
                        }
                    }
                    Err(e) => {
                        debug!(user = %user_id, error = %e, "withdrawal refused");
                        ClientResponse::WithdrawFailed {
                            user_id,
                            error: e.to_string(),
                            txn_id,
                        }
                    }
                }
            }
            _ => ClientResponse::WithdrawFailed {
                user_id,
                error: format!("invalid amount: {amount}"),
                txn_id,
            },
        };
        vec![Outbound::ClientResponse { client_id, payload }]
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

fn order_rejected(client_id: ClientId, reason: String, code: RejectCode) -> Outbound {
    Outbound::ClientResponse {
        client_id,
        payload: ClientResponse::OrderRejected {
            order_id: String::new(),
            executed_qty: Quantity::zero(),
            remaining_qty: Quantity::zero(),
            reason,
            code,
        },
    }
}

fn noop_cancelled(client_id: ClientId, order_id: &OrderId) -> Outbound {
    Outbound::ClientResponse {
        client_id,
        payload: ClientResponse::OrderCancelled {
            order_id: order_id.to_string(),
            executed_qty: Quantity::zero(),
            remaining_qty: Quantity::zero(),
        },
    }
}

fn push_depth_delta(
    out: &mut Vec<Outbound>,
    symbol: &MarketSymbol,
    before: &LevelSnapshot,
    after: &LevelSnapshot,
) {
    let (b, a) = depth::diff(before, after);
    if !b.is_empty() || !a.is_empty() {
        out.push(Outbound::Broadcast {
            channel: depth_channel(symbol),
            event: StreamEvent::Depth { b, a },
        });
    }
}
