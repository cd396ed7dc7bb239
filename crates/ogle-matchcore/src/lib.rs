//! # ogle-matchcore
//!
//! **Price-time priority order book with midpoint matching.**
//!
//! - **No balance logic**: funds are reserved before an order reaches the book
//!   and settled after trades leave it
//! - **Deterministic output**: same orders in, same trades (and trade ids) out
//! - **Single pair**: one book, bids and asks

pub mod matcher;
pub mod orderbook;
pub mod price_level;

pub use matcher::{MatchOutcome, Matcher};
pub use orderbook::{BookSnapshot, OrderBook};
pub use price_level::PriceLevel;
