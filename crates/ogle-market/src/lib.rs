//! # ogle-market
//!
//! The market as callers see it.
//!
//! - [`Market`]: synchronous facade over registry, ledger and order book
//! - [`MarketService`] / [`MarketHandle`]: one task owns the market; many
//!   callers talk to it over a bounded queue
//! - [`journal`], [`snapshot`], [`store`], [`recovery`]: durability
//! - [`telemetry`]: `tracing` subscriber setup
//!
//! ## Example
//!
//! ```
//! use ogle_market::Market;
//! use ogle_types::{MarketConfig, OrderSide};
//! use rust_decimal::Decimal;
//!
//! let mut market = Market::new(&MarketConfig::default());
//! market.register("alice").unwrap();
//! market.register("bob").unwrap();
//! market.credit("alice", "OGLEC", Decimal::new(1000, 0)).unwrap();
//! market.mint_base("bob", Decimal::new(10, 0)).unwrap();
//!
//! market.place_order("alice", OrderSide::Buy, Decimal::new(5, 0), Decimal::new(10, 0)).unwrap();
//! let placed = market
//!     .place_order("bob", OrderSide::Sell, Decimal::new(4, 0), Decimal::new(10, 0))
//!     .unwrap();
//! assert_eq!(placed.trades[0].price, Decimal::new(45, 1));
//! ```

pub mod journal;
pub mod market;
pub mod recovery;
pub mod service;
pub mod snapshot;
pub mod store;
pub mod telemetry;

pub use journal::JournalRecord;
pub use market::{Applied, Change, Market, Placement, Registration};
pub use recovery::{Recovered, recover};
pub use service::{Command, MarketHandle, MarketService};
pub use snapshot::{Documents, MarketState, SnapshotDocument};
pub use store::{FileStore, MarketStore, MemoryStore};
pub use telemetry::init_tracing;
