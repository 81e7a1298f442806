//! Core type definitions for the spot exchange engine.
//!
//! Everything that crosses a module or wire boundary lives here: identifiers,
//! exact-decimal numerics, order and fill records, per-asset balances, and the
//! error taxonomy.
//!
//! # Modules
//! - `ids`: Unique identifiers (OrderId, UserId, ClientId, MarketSymbol)
//! - `numeric`: Exact decimal types (Price, Quantity)
//! - `order`: Order lifecycle types and self-trade prevention modes
//! - `fill`: Fill and trade persistence records
//! - `balance`: Available/locked balance accounting
//! - `errors`: Error taxonomy

pub mod balance;
pub mod errors;
pub mod fill;
pub mod ids;
pub mod numeric;
pub mod order;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::balance::*;
    pub use crate::errors::*;
    pub use crate::fill::*;
    pub use crate::ids::*;
    pub use crate::numeric::*;
    pub use crate::order::*;
}
