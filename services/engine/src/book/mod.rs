//! Order book infrastructure
//!
//! Price levels, the two book sides, and the per-market orderbook with
//! matching, cancellation, depth aggregation, and self-trade prevention.

pub mod ask_book;
pub mod bid_book;
pub mod orderbook;
pub mod price_level;

pub use ask_book::AskBook;
pub use bid_book::BidBook;
pub use orderbook::{AddOrderOutcome, BookSnapshot, Orderbook};
pub use price_level::PriceLevel;
