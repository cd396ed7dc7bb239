//! The order book for the single traded pair.
//!
//! Uses `BTreeMap` for price-level ordering:
//! - **Bids** (buys): `BTreeMap<Reverse<Decimal>, PriceLevel>` -- highest price first
//! - **Asks** (sells): `BTreeMap<Decimal, PriceLevel>` -- lowest price first
//!
//! Within a level, orders are ranked by creation timestamp (then sequence).
//! An auxiliary `HashMap<OrderId, (Side, Price)>` backs lookups and rejects
//! reused ids.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

use ogle_types::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::price_level::PriceLevel;

/// Both sides of the book in rank order; the `{bids, asks}` document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookSnapshot {
    pub bids: Vec<Order>,
    pub asks: Vec<Order>,
}

/// The order book for the single traded pair.
#[derive(Debug)]
pub struct OrderBook {
    /// Buy side: highest price first (`Reverse` key).
    bids: BTreeMap<Reverse<Decimal>, PriceLevel>,
    /// Sell side: lowest price first.
    asks: BTreeMap<Decimal, PriceLevel>,
    /// `OrderId -> (side, price)` for lookups.
    index: HashMap<OrderId, (OrderSide, Decimal)>,
    /// Remaining quantity at or below this counts as filled.
    dust_tolerance: Decimal,
}

impl OrderBook {
    /// Create a new empty order book.
    #[must_use]
    pub fn new(dust_tolerance: Decimal) -> Self {
        Self {
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            index: HashMap::new(),
            dust_tolerance,
        }
    }

    /// Rebuild a book from a snapshot.
    ///
    /// # Errors
    /// Fails if any order in the snapshot is invalid, on the wrong side, or
    /// duplicated.
    pub fn restore(snapshot: BookSnapshot, dust_tolerance: Decimal) -> Result<Self> {
        let mut book = Self::new(dust_tolerance);
        for (expected, orders) in [
            (OrderSide::Buy, snapshot.bids),
            (OrderSide::Sell, snapshot.asks),
        ] {
            for order in orders {
                if order.side != expected {
                    return Err(OgleError::InvalidOrder {
                        reason: format!(
                            "order {} is {} but listed under {expected}",
                            order.id, order.side
                        ),
                    });
                }
                book.place(order)?;
            }
        }
        Ok(book)
    }

    #[must_use]
    pub fn dust_tolerance(&self) -> Decimal {
        self.dust_tolerance
    }

    // =================================================================
    // Insertion
    // =================================================================

    /// Insert an order into its side at its rank position.
    ///
    /// # Errors
    /// - `InvalidOrder` for a non-positive price or a quantity at or below
    ///   the dust tolerance
    /// - `DuplicateOrder` if the id is already resting in the book
    pub fn place(&mut self, order: Order) -> Result<()> {
        order.validate()?;
        if order.is_filled(self.dust_tolerance) {
            return Err(OgleError::InvalidOrder {
                reason: format!(
                    "quantity {} is at or below dust tolerance {}",
                    order.remaining_qty, self.dust_tolerance
                ),
            });
        }
        if self.index.contains_key(&order.id) {
            return Err(OgleError::DuplicateOrder(order.id));
        }

        let price = order.price;
        self.index.insert(order.id, (order.side, price));

        match order.side {
            OrderSide::Buy => {
                self.bids
                    .entry(Reverse(price))
                    .or_insert_with(|| PriceLevel::new(price))
                    .insert(order);
            }
            OrderSide::Sell => {
                self.asks
                    .entry(price)
                    .or_insert_with(|| PriceLevel::new(price))
                    .insert(order);
            }
        }
        Ok(())
    }

    // =================================================================
    // Queries
    // =================================================================

    /// Best (highest) bid price, or `None` if no bids.
    #[must_use]
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.keys().next().map(|r| r.0)
    }

    /// Best (lowest) ask price, or `None` if no asks.
    #[must_use]
    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.keys().next().copied()
    }

    /// Spread = best_ask - best_bid. `None` if either side is empty.
    #[must_use]
    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask - bid),
            _ => None,
        }
    }

    /// `true` while the best bid is at or above the best ask.
    #[must_use]
    pub fn is_crossed(&self) -> bool {
        matches!((self.best_bid(), self.best_ask()), (Some(bid), Some(ask)) if bid >= ask)
    }

    /// Total number of orders currently in the book.
    #[must_use]
    pub fn order_count(&self) -> usize {
        self.index.len()
    }

    /// Number of distinct bid price levels.
    #[must_use]
    pub fn bid_depth(&self) -> usize {
        self.bids.len()
    }

    /// Number of distinct ask price levels.
    #[must_use]
    pub fn ask_depth(&self) -> usize {
        self.asks.len()
    }

    /// Returns `true` if the book has no orders on either side.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Check if an order is resting in the book.
    #[must_use]
    pub fn contains_order(&self, order_id: &OrderId) -> bool {
        self.index.contains_key(order_id)
    }

    /// Look up a resting order.
    #[must_use]
    pub fn get_order(&self, order_id: &OrderId) -> Option<&Order> {
        let (side, price) = self.index.get(order_id)?;
        let level = match side {
            OrderSide::Buy => self.bids.get(&Reverse(*price))?,
            OrderSide::Sell => self.asks.get(price)?,
        };
        level.orders.iter().find(|o| o.id == *order_id)
    }

    /// Iterate bid levels from best (highest) to worst.
    pub fn bid_levels(&self) -> impl Iterator<Item = &PriceLevel> {
        self.bids.values()
    }

    /// Iterate ask levels from best (lowest) to worst.
    pub fn ask_levels(&self) -> impl Iterator<Item = &PriceLevel> {
        self.asks.values()
    }

    /// Funds still committed by resting orders on one side: quote for bids,
    /// base for asks.
    #[must_use]
    pub fn reserved(&self, side: OrderSide) -> Decimal {
        fn sum<'a>(levels: impl Iterator<Item = &'a PriceLevel>) -> Decimal {
            levels
                .flat_map(|level| level.orders.iter())
                .fold(Decimal::ZERO, |acc, o| acc.saturating_add(o.reserved))
        }
        match side {
            OrderSide::Buy => sum(self.bid_levels()),
            OrderSide::Sell => sum(self.ask_levels()),
        }
    }

    /// Both sides in rank order.
    #[must_use]
    pub fn snapshot(&self) -> BookSnapshot {
        BookSnapshot {
            bids: self
                .bid_levels()
                .flat_map(|l| l.orders.iter().cloned())
                .collect(),
            asks: self
                .ask_levels()
                .flat_map(|l| l.orders.iter().cloned())
                .collect(),
        }
    }

    // =================================================================
    // Matcher access
    // =================================================================

    /// Mutable access to the best level on each side, if both exist.
    pub(crate) fn best_levels_mut(&mut self) -> Option<(&mut PriceLevel, &mut PriceLevel)> {
        let bid = self.bids.values_mut().next()?;
        let ask = self.asks.values_mut().next()?;
        Some((bid, ask))
    }

    /// Pop the front order of each best level if it is filled (remaining at
    /// or below the dust tolerance). Returns the removed orders.
    pub(crate) fn remove_filled_fronts(&mut self) -> Vec<Order> {
        let tolerance = self.dust_tolerance;
        let mut removed = Vec::new();

        if let Some(mut entry) = self.bids.first_entry() {
            if entry.get().front().is_some_and(|o| o.is_filled(tolerance)) {
                removed.extend(entry.get_mut().pop_front());
                if entry.get().is_empty() {
                    entry.remove();
                }
            }
        }
        if let Some(mut entry) = self.asks.first_entry() {
            if entry.get().front().is_some_and(|o| o.is_filled(tolerance)) {
                removed.extend(entry.get_mut().pop_front());
                if entry.get().is_empty() {
                    entry.remove();
                }
            }
        }

        for order in &removed {
            self.index.remove(&order.id);
        }
        removed
    }
}
