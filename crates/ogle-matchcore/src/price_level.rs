//! A single price level in the order book.
//!
//! Orders at the same price are kept in time priority using a [`VecDeque`]:
//! earliest `created_at` first, ties broken by placement `sequence`.

use std::collections::VecDeque;

use ogle_types::Order;
use rust_decimal::Decimal;

/// A single price level containing all orders at that price.
///
/// The front of the deque has the highest time priority and fills first.
#[derive(Debug, Clone)]
pub struct PriceLevel {
    /// The price at this level.
    pub price: Decimal,
    /// Orders in time-priority order (front = oldest = highest priority).
    pub orders: VecDeque<Order>,
}

impl PriceLevel {
    /// Create a new empty price level.
    #[must_use]
    pub fn new(price: Decimal) -> Self {
        Self {
            price,
            orders: VecDeque::new(),
        }
    }

    /// Insert an order at its time-priority position.
    ///
    /// Orders normally arrive in time order, so this is a `push_back`; an
    /// order stamped earlier than the tail is slotted in before it.
    pub fn insert(&mut self, order: Order) {
        let key = (order.created_at, order.sequence);
        match self
            .orders
            .iter()
            .rposition(|o| (o.created_at, o.sequence) <= key)
        {
            Some(pos) if pos + 1 == self.orders.len() => self.orders.push_back(order),
            Some(pos) => self.orders.insert(pos + 1, order),
            None => self.orders.push_front(order),
        }
    }

    /// Remove and return the front (oldest / highest priority) order.
    pub fn pop_front(&mut self) -> Option<Order> {
        self.orders.pop_front()
    }

    /// Peek at the front order without removing it.
    #[must_use]
    pub fn front(&self) -> Option<&Order> {
        self.orders.front()
    }

    pub fn front_mut(&mut self) -> Option<&mut Order> {
        self.orders.front_mut()
    }

    /// Total remaining quantity across all orders at this level.
    #[must_use]
    pub fn total_quantity(&self) -> Decimal {
        self.orders.iter().map(|o| o.remaining_qty).sum()
    }

    /// Returns `true` if there are no orders at this level.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Number of orders at this level.
    #[must_use]
    pub fn len(&self) -> usize {
        self.orders.len()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use ogle_types::*;
    use rust_decimal::Decimal;

    use super::*;

    fn make_order(qty: Decimal) -> Order {
        Order::dummy_limit(OrderSide::Buy, Decimal::new(100, 0), qty)
    }

    #[test]
    fn insert_pop_fifo() {
        let mut level = PriceLevel::new(Decimal::new(100, 0));
        let now = Utc::now();
        let o1 = make_order(Decimal::ONE).at(now, 0);
        let o2 = make_order(Decimal::ONE).at(now + Duration::milliseconds(1), 1);
        let id1 = o1.id;

        level.insert(o1);
        level.insert(o2);

        assert_eq!(level.len(), 2);
        let popped = level.pop_front().unwrap();
        assert_eq!(popped.id, id1, "FIFO: first in should be first out");
        assert_eq!(level.len(), 1);
    }

    #[test]
    fn earlier_timestamp_jumps_ahead() {
        let mut level = PriceLevel::new(Decimal::new(100, 0));
        let now = Utc::now();
        let late = make_order(Decimal::ONE).at(now, 5);
        let early = make_order(Decimal::ONE).at(now - Duration::seconds(1), 6);
        let early_id = early.id;

        level.insert(late);
        level.insert(early);

        assert_eq!(level.front().unwrap().id, early_id);
    }

    #[test]
    fn equal_timestamps_break_on_sequence() {
        let mut level = PriceLevel::new(Decimal::new(100, 0));
        let now = Utc::now();
        let second = make_order(Decimal::ONE).at(now, 2);
        let first = make_order(Decimal::ONE).at(now, 1);
        let first_id = first.id;

        level.insert(second);
        level.insert(first);

        assert_eq!(level.front().unwrap().id, first_id);
    }

    #[test]
    fn total_quantity() {
        let mut level = PriceLevel::new(Decimal::new(100, 0));
        level.insert(make_order(Decimal::new(5, 0)));
        level.insert(make_order(Decimal::new(3, 0)));
        assert_eq!(level.total_quantity(), Decimal::new(8, 0));
    }

    #[test]
    fn empty_level() {
        let level = PriceLevel::new(Decimal::new(100, 0));
        assert!(level.is_empty());
        assert_eq!(level.len(), 0);
        assert_eq!(level.total_quantity(), Decimal::ZERO);
        assert!(level.front().is_none());
    }
}
