//! Continuous midpoint matcher.
//!
//! While the best bid is at or above the best ask, the two front orders trade
//! at the **midpoint of their limit prices** for the smaller of their
//! remaining quantities. This is a deliberate simplification of the usual
//! resting-order price rule.
//!
//! ```text
//! price    = (bid.price + ask.price) / 2
//! quantity = min(bid.remaining, ask.remaining)
//! ```
//!
//! Each fill draws the bid's reservation down by `bid.price × quantity`
//! (rounded down to ledger precision; the fill that empties the bid takes
//! whatever is left). The seller receives `price × quantity`, rounded down,
//! and the difference is retained. Every reserved unit therefore ends up in
//! exactly one of: seller proceeds, retained, still reserved.
//!
//! Orders whose remaining quantity falls to the dust tolerance or below are
//! removed. Each pass removes at least one order, so the loop is bounded by
//! the number of orders on the smaller side.
//!
//! Matching never touches balances. Settlement is the caller's job.

use chrono::{DateTime, Utc};
use ogle_types::{Order, Trade, TradeId, floor_amount};
use rust_decimal::Decimal;

use crate::OrderBook;

/// Everything one matching pass produced.
#[derive(Debug, Clone, Default)]
pub struct MatchOutcome {
    /// Trades in execution order (oldest first).
    pub trades: Vec<Trade>,
    /// Orders removed from the book as filled, with their final remaining
    /// quantity (zero, or dust at or below the tolerance).
    pub removed: Vec<Order>,
    /// Quote drawn from buyers' reservations but not paid to sellers.
    pub retained: Decimal,
}

impl MatchOutcome {
    /// Removed orders still holding part of their reservation.
    pub fn dust(&self) -> impl Iterator<Item = &Order> {
        self.removed.iter().filter(|o| !o.reserved.is_zero())
    }

    /// Total base quantity traded.
    #[must_use]
    pub fn traded_quantity(&self) -> Decimal {
        self.trades.iter().map(|t| t.quantity).sum()
    }
}

/// Stateful matcher: owns the fill sequence used to derive trade ids.
#[derive(Debug, Clone, Default)]
pub struct Matcher {
    fill_sequence: u64,
}

impl Matcher {
    #[must_use]
    pub fn new(fill_sequence: u64) -> Self {
        Self { fill_sequence }
    }

    /// Next fill sequence number to be assigned.
    #[must_use]
    pub fn fill_sequence(&self) -> u64 {
        self.fill_sequence
    }

    /// Match the book until no crossing pair remains.
    ///
    /// `executed_at` stamps every trade of this pass; callers pass the
    /// triggering order's placement time so replays reproduce the trades.
    pub fn run(&mut self, book: &mut OrderBook, executed_at: DateTime<Utc>) -> MatchOutcome {
        let mut outcome = MatchOutcome::default();

        while book.is_crossed() {
            let Some((bid_level, ask_level)) = book.best_levels_mut() else {
                break;
            };
            let (Some(bid), Some(ask)) = (bid_level.front_mut(), ask_level.front_mut()) else {
                break;
            };

            let price = (bid.price + ask.price) / Decimal::TWO;
            let quantity = bid.remaining_qty.min(ask.remaining_qty);

            bid.remaining_qty -= quantity;
            ask.remaining_qty -= quantity;

            let drawn = if bid.remaining_qty.is_zero() {
                bid.reserved
            } else {
                bid.price
                    .checked_mul(quantity)
                    .map_or(bid.reserved, floor_amount)
                    .min(bid.reserved)
            };
            let quote_amount = price
                .checked_mul(quantity)
                .map_or(drawn, floor_amount)
                .min(drawn);
            bid.reserved -= drawn;
            ask.reserved -= quantity;
            outcome.retained += drawn - quote_amount;

            let trade = Trade {
                id: TradeId::deterministic(self.fill_sequence),
                price,
                quantity,
                quote_amount,
                buyer: bid.owner.clone(),
                seller: ask.owner.clone(),
                buy_order_id: bid.id,
                sell_order_id: ask.id,
                executed_at,
            };
            self.fill_sequence += 1;

            tracing::debug!(
                trade_id = %trade.id,
                buyer = %trade.buyer,
                seller = %trade.seller,
                price = %trade.price,
                qty = %trade.quantity,
                "Trade matched"
            );

            outcome.trades.push(trade);
            outcome.removed.extend(book.remove_filled_fronts());
        }

        debug_assert!(!book.is_crossed(), "book left crossed after matching");

        if !outcome.trades.is_empty() {
            tracing::info!(
                trades = outcome.trades.len(),
                filled_orders = outcome.removed.len(),
                volume = %outcome.traded_quantity(),
                best_bid = ?book.best_bid(),
                best_ask = ?book.best_ask(),
                "Matching pass complete"
            );
        }

        outcome
    }
}
