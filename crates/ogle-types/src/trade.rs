//! Trade records produced by the matcher.
//!
//! A [`Trade`] is immutable once produced. It executes at the midpoint of the
//! two crossing limit prices.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{AccountId, OrderId, TradeId};

/// A single fill between the best bid and the best ask.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    /// Deterministic from the market fill sequence.
    pub id: TradeId,
    /// Execution price: midpoint of bid and ask limit prices.
    pub price: Decimal,
    /// Executed quantity in base units.
    pub quantity: Decimal,
    /// Quote paid to the seller: price × quantity, rounded down to ledger precision.
    pub quote_amount: Decimal,
    pub buyer: AccountId,
    pub seller: AccountId,
    pub buy_order_id: OrderId,
    pub sell_order_id: OrderId,
    pub executed_at: DateTime<Utc>,
}

impl Trade {
    /// Returns `true` if one account sat on both sides.
    #[must_use]
    pub fn is_self_trade(&self) -> bool {
        self.buyer == self.seller
    }
}

impl std::fmt::Display for Trade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Trade[{}] {} <- {} {} @ {} = {}",
            self.id, self.buyer, self.seller, self.quantity, self.price, self.quote_amount,
        )
    }
}
