//! # ogle-types
//!
//! Shared types, errors, and configuration for the **OGLE** market core.
//!
//! This crate is the leaf dependency of the workspace. It defines:
//!
//! - **Identifiers**: [`AccountId`], [`OrderId`], [`TradeId`]
//! - **Order model**: [`Order`], [`OrderSide`], [`OrderStatus`]
//! - **Trade model**: [`Trade`]
//! - **Balance model**: [`Token`], [`TokenPair`], [`BalanceEntry`], [`TokenBalances`]
//! - **Configuration**: [`MarketConfig`]
//! - **Errors**: [`OgleError`] with `OGLE_ERR_` prefix codes
//! - **Constants**: defaults and file names

pub mod balance;
pub mod config;
pub mod constants;
pub mod error;
pub mod ids;
pub mod order;
pub mod trade;

pub use balance::*;
pub use config::*;
pub use error::*;
pub use ids::*;
pub use order::*;
pub use trade::*;
