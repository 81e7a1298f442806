//! Balance ledger
//!
//! Maps user → asset → (available, locked). Funds are locked before an order
//! reaches the book and move between the taker's and maker's accounts at
//! settlement, one fill at a time. Every operation either fully applies or
//! leaves the ledger untouched, and no component ever goes negative.

use rust_decimal::Decimal;
use std::collections::BTreeMap;
use types::balance::{Balance, Shortfall};
use types::errors::LedgerError;
use types::ids::UserId;
use types::numeric::{Price, Quantity};
use types::order::Side;

fn insufficient_funds(asset: &str, shortfall: Shortfall) -> LedgerError {
    LedgerError::InsufficientFunds {
        asset: asset.to_string(),
        required: shortfall.required.to_string(),
        available: shortfall.on_hand.to_string(),
    }
}

fn insufficient_locked(asset: &str, shortfall: Shortfall) -> LedgerError {
    LedgerError::InsufficientLocked {
        asset: asset.to_string(),
        required: shortfall.required.to_string(),
        locked: shortfall.on_hand.to_string(),
    }
}

/// Amount a limit order must reserve: quote notional for a buy, base
/// quantity for a sell
fn required_funds(side: Side, price: Price, quantity: Quantity) -> Decimal {
    match side {
        Side::Buy => quantity * price,
        Side::Sell => quantity.as_decimal(),
    }
}

/// Per-user, per-asset balance accounting
///
/// BTreeMap keys keep snapshot serialization deterministic.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    accounts: BTreeMap<UserId, BTreeMap<String, Balance>>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    fn balance_mut(&mut self, user: &UserId, asset: &str) -> &mut Balance {
        self.accounts
            .entry(user.clone())
            .or_default()
            .entry(asset.to_string())
            .or_default()
    }

    fn balance(&self, user: &UserId, asset: &str) -> Balance {
        self.accounts
            .get(user)
            .and_then(|assets| assets.get(asset))
            .cloned()
            .unwrap_or_default()
    }

    /// Reserve the funds an order needs before it may touch the book
    ///
    /// Fails without mutation when the user or asset entry is absent or
    /// `available` falls short.
    pub fn lock(
        &mut self,
        user: &UserId,
        side: Side,
        base: &str,
        quote: &str,
        price: Price,
        quantity: Quantity,
    ) -> Result<(), LedgerError> {
        let required = required_funds(side, price, quantity);
        let asset = match side {
            Side::Buy => quote,
            Side::Sell => base,
        };
        // Absent entries fail the same comparison a zero balance would
        let mut balance = self.balance(user, asset);
        balance
            .lock(required)
            .map_err(|s| insufficient_funds(asset, s))?;
        *self.balance_mut(user, asset) = balance;
        Ok(())
    }

    /// Inverse of a prior successful [`lock`](Self::lock) with the same
    /// arguments
    pub fn unlock(
        &mut self,
        user: &UserId,
        side: Side,
        base: &str,
        quote: &str,
        price: Price,
        quantity: Quantity,
    ) -> Result<(), LedgerError> {
        let amount = required_funds(side, price, quantity);
        let asset = match side {
            Side::Buy => quote,
            Side::Sell => base,
        };
        self.unlock_amount(user, asset, amount)
    }

    /// Return `amount` of `asset` from locked to available
    pub fn unlock_amount(
        &mut self,
        user: &UserId,
        asset: &str,
        amount: Decimal,
    ) -> Result<(), LedgerError> {
        let mut balance = self.balance(user, asset);
        balance
            .unlock(amount)
            .map_err(|s| insufficient_locked(asset, s))?;
        *self.balance_mut(user, asset) = balance;
        Ok(())
    }

    /// Settle one fill: move locked funds between taker and maker
    ///
    /// For a buying taker, the taker pays `fill_qty × fill_price` quote from
    /// locked and receives `fill_qty` base; the maker receives the quote and
    /// pays the base from locked. Mirrored for a selling taker. Per-asset
    /// `available + locked` totals across the pair are conserved. All four
    /// legs are checked before any is applied.
    pub fn settle_fill(
        &mut self,
        taker: &UserId,
        maker: &UserId,
        taker_side: Side,
        base: &str,
        quote: &str,
        fill_qty: Quantity,
        fill_price: Price,
    ) -> Result<(), LedgerError> {
        let value = fill_qty * fill_price;
        let qty = fill_qty.as_decimal();

        let (quote_payer, base_payer) = match taker_side {
            Side::Buy => (taker, maker),
            Side::Sell => (maker, taker),
        };

        // Validate both debiting legs up front so a failure mutates nothing
        let quote_locked = self.balance(quote_payer, quote);
        if quote_locked.locked < value {
            return Err(insufficient_locked(
                quote,
                Shortfall {
                    required: value,
                    on_hand: quote_locked.locked,
                },
            ));
        }
        let base_locked = self.balance(base_payer, base);
        if base_locked.locked < qty {
            return Err(insufficient_locked(
                base,
                Shortfall {
                    required: qty,
                    on_hand: base_locked.locked,
                },
            ));
        }

        self.balance_mut(quote_payer, quote)
            .spend_locked(value)
            .map_err(|s| insufficient_locked(quote, s))?;
        self.balance_mut(base_payer, base)
            .spend_locked(qty)
            .map_err(|s| insufficient_locked(base, s))?;
        self.balance_mut(base_payer, quote).credit(value);
        self.balance_mut(quote_payer, base).credit(qty);
        Ok(())
    }

    /// On-ramp: add to available, creating user and asset entries as needed.
    /// Returns the new available balance.
    pub fn credit(&mut self, user: &UserId, asset: &str, amount: Decimal) -> Decimal {
        let balance = self.balance_mut(user, asset);
        balance.credit(amount);
        balance.available
    }

    /// Withdraw: remove from available. Returns the new available balance.
    pub fn debit(
        &mut self,
        user: &UserId,
        asset: &str,
        amount: Decimal,
    ) -> Result<Decimal, LedgerError> {
        let mut balance = self.balance(user, asset);
        balance
            .debit(amount)
            .map_err(|s| insufficient_funds(asset, s))?;
        let available = balance.available;
        *self.balance_mut(user, asset) = balance;
        Ok(available)
    }

    /// Copy of a user's balances (empty map for unknown users)
    pub fn get(&self, user: &UserId) -> BTreeMap<String, Balance> {
        self.accounts.get(user).cloned().unwrap_or_default()
    }

    /// Sum of `available + locked` over all users for one asset
    ///
    /// Constant under any create/cancel/match sequence; only on-ramp and
    /// withdraw move it.
    pub fn asset_total(&self, asset: &str) -> Decimal {
        self.accounts
            .values()
            .filter_map(|assets| assets.get(asset))
            .map(|b| b.total())
            .sum()
    }

    /// Serializable copy of every account
    pub fn snapshot(&self) -> Vec<(UserId, BTreeMap<String, Balance>)> {
        self.accounts
            .iter()
            .map(|(user, assets)| (user.clone(), assets.clone()))
            .collect()
    }

    /// Rebuild the ledger from snapshot data
    pub fn restore(balances: Vec<(UserId, BTreeMap<String, Balance>)>) -> Self {
        Self {
            accounts: balances.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn user(id: &str) -> UserId {
        UserId::new(id)
    }

    fn qty(s: &str) -> Quantity {
        Quantity::parse(s).unwrap()
    }

    fn funded_ledger() -> Ledger {
        let mut ledger = Ledger::new();
        ledger.credit(&user("u1"), "INR", dec!(10000));
        ledger.credit(&user("u1"), "TATA", dec!(100));
        ledger.credit(&user("u2"), "INR", dec!(10000));
        ledger.credit(&user("u2"), "TATA", dec!(100));
        ledger
    }

    #[test]
    fn test_lock_buy_reserves_quote_notional() {
        let mut ledger = funded_ledger();
        ledger
            .lock(&user("u1"), Side::Buy, "TATA", "INR", Price::from_u64(100), qty("10"))
            .unwrap();

        let balances = ledger.get(&user("u1"));
        assert_eq!(balances["INR"].available, dec!(9000));
        assert_eq!(balances["INR"].locked, dec!(1000));
        assert_eq!(balances["TATA"].available, dec!(100));
    }

    #[test]
    fn test_lock_sell_reserves_base_quantity() {
        let mut ledger = funded_ledger();
        ledger
            .lock(&user("u2"), Side::Sell, "TATA", "INR", Price::from_u64(100), qty("10"))
            .unwrap();

        let balances = ledger.get(&user("u2"));
        assert_eq!(balances["TATA"].available, dec!(90));
        assert_eq!(balances["TATA"].locked, dec!(10));
    }

    #[test]
    fn test_lock_insufficient_funds_leaves_ledger_untouched() {
        let mut ledger = funded_ledger();
        let err = ledger
            .lock(&user("u1"), Side::Buy, "TATA", "INR", Price::from_u64(2000), qty("10"))
            .unwrap_err();

        assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
        let balances = ledger.get(&user("u1"));
        assert_eq!(balances["INR"].available, dec!(10000));
        assert_eq!(balances["INR"].locked, dec!(0));
    }

    #[test]
    fn test_lock_unknown_user_fails() {
        let mut ledger = Ledger::new();
        let err = ledger
            .lock(&user("ghost"), Side::Sell, "TATA", "INR", Price::from_u64(100), qty("1"))
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
        assert!(ledger.get(&user("ghost")).is_empty());
    }

    #[test]
    fn test_lock_then_unlock_is_identity() {
        let mut ledger = funded_ledger();
        let before = ledger.get(&user("u1"));

        ledger
            .lock(&user("u1"), Side::Buy, "TATA", "INR", Price::from_u64(100), qty("5"))
            .unwrap();
        ledger
            .unlock(&user("u1"), Side::Buy, "TATA", "INR", Price::from_u64(100), qty("5"))
            .unwrap();

        assert_eq!(ledger.get(&user("u1")), before);
    }

    #[test]
    fn test_settle_fill_buy_taker() {
        let mut ledger = funded_ledger();
        // u2 resting sell locks 10 TATA; u1 incoming buy locks 1000 INR
        ledger
            .lock(&user("u2"), Side::Sell, "TATA", "INR", Price::from_u64(100), qty("10"))
            .unwrap();
        ledger
            .lock(&user("u1"), Side::Buy, "TATA", "INR", Price::from_u64(100), qty("10"))
            .unwrap();

        ledger
            .settle_fill(
                &user("u1"),
                &user("u2"),
                Side::Buy,
                "TATA",
                "INR",
                qty("10"),
                Price::from_u64(100),
            )
            .unwrap();

        let u1 = ledger.get(&user("u1"));
        assert_eq!(u1["INR"].available, dec!(9000));
        assert_eq!(u1["INR"].locked, dec!(0));
        assert_eq!(u1["TATA"].available, dec!(110));

        let u2 = ledger.get(&user("u2"));
        assert_eq!(u2["INR"].available, dec!(11000));
        assert_eq!(u2["TATA"].available, dec!(90));
        assert_eq!(u2["TATA"].locked, dec!(0));
    }

    #[test]
    fn test_settle_fill_sell_taker() {
        let mut ledger = funded_ledger();
        // u1 resting buy locks 1000 INR; u2 incoming sell locks 10 TATA
        ledger
            .lock(&user("u1"), Side::Buy, "TATA", "INR", Price::from_u64(100), qty("10"))
            .unwrap();
        ledger
            .lock(&user("u2"), Side::Sell, "TATA", "INR", Price::from_u64(100), qty("10"))
            .unwrap();

        ledger
            .settle_fill(
                &user("u2"),
                &user("u1"),
                Side::Sell,
                "TATA",
                "INR",
                qty("10"),
                Price::from_u64(100),
            )
            .unwrap();

        let u1 = ledger.get(&user("u1"));
        assert_eq!(u1["TATA"].available, dec!(110));
        assert_eq!(u1["INR"].available, dec!(9000));
        let u2 = ledger.get(&user("u2"));
        assert_eq!(u2["INR"].available, dec!(11000));
        assert_eq!(u2["TATA"].available, dec!(90));
    }

    #[test]
    fn test_settle_conserves_asset_totals() {
        let mut ledger = funded_ledger();
        assert_eq!(ledger.asset_total("INR"), dec!(20000));
        assert_eq!(ledger.asset_total("TATA"), dec!(200));

        ledger
            .lock(&user("u2"), Side::Sell, "TATA", "INR", Price::from_u64(100), qty("10"))
            .unwrap();
        ledger
            .lock(&user("u1"), Side::Buy, "TATA", "INR", Price::from_u64(100), qty("10"))
            .unwrap();
        ledger
            .settle_fill(
                &user("u1"),
                &user("u2"),
                Side::Buy,
                "TATA",
                "INR",
                qty("10"),
                Price::from_u64(100),
            )
            .unwrap();

        assert_eq!(ledger.asset_total("INR"), dec!(20000));
        assert_eq!(ledger.asset_total("TATA"), dec!(200));
    }

    #[test]
    fn test_debit_insufficient_funds() {
        let mut ledger = funded_ledger();
        let err = ledger.debit(&user("u1"), "INR", dec!(10001)).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
        assert_eq!(ledger.get(&user("u1"))["INR"].available, dec!(10000));
    }

    #[test]
    fn test_credit_creates_entries() {
        let mut ledger = Ledger::new();
        let new_balance = ledger.credit(&user("fresh"), "USDC", dec!(42));
        assert_eq!(new_balance, dec!(42));
        assert_eq!(ledger.get(&user("fresh"))["USDC"].available, dec!(42));
    }

    #[test]
    fn test_snapshot_restore_roundtrip() {
        let mut ledger = funded_ledger();
        ledger
            .lock(&user("u1"), Side::Buy, "TATA", "INR", Price::from_u64(100), qty("3"))
            .unwrap();

        let restored = Ledger::restore(ledger.snapshot());
        assert_eq!(restored.get(&user("u1")), ledger.get(&user("u1")));
        assert_eq!(restored.get(&user("u2")), ledger.get(&user("u2")));
    }
}
