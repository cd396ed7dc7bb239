//! # ogle-ledger
//!
//! Account and balance state for the market.
//!
//! - [`AccountRegistry`]: who exists
//! - [`BalanceLedger`]: what each account holds, never negative
//! - [`funding`]: reserve / settle / release transitions over the ledger
//! - [`SupplyConservation`]: the credited-equals-held check

pub mod balance_ledger;
pub mod funding;
pub mod registry;
pub mod supply_conservation;

pub use balance_ledger::{BalanceLedger, BalancesDocument};
pub use funding::{Reservation, Settlement};
pub use registry::AccountRegistry;
pub use supply_conservation::SupplyConservation;
