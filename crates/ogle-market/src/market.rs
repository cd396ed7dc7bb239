//! The market facade.
//!
//! Composes the registry, the ledger and the order book:
//!
//! ```text
//! place_order ─► reserve (ledger) ─► insert + match (book) ─► settle (ledger)
//! ```
//!
//! Every state change is expressed as a [`Change`], so the same code path
//! serves live calls and journal replay. A change that fails validation
//! leaves the market untouched.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use ogle_ledger::{AccountRegistry, BalanceLedger, SupplyConservation, funding};
use ogle_matchcore::{BookSnapshot, Matcher, OrderBook};
use ogle_types::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::snapshot::{Documents, MarketState};

/// One state-changing operation, as written to the journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Change {
    Register {
        account: AccountId,
    },
    Credit {
        account: AccountId,
        token: String,
        amount: Decimal,
    },
    PlaceOrder {
        order_id: OrderId,
        account: AccountId,
        side: OrderSide,
        price: Decimal,
        quantity: Decimal,
        created_at: DateTime<Utc>,
    },
}

impl Change {
    /// # Errors
    /// `InvalidAccount` for a blank id.
    pub fn register(account: &str) -> Result<Self> {
        Ok(Self::Register {
            account: AccountId::new(account)?,
        })
    }

    /// # Errors
    /// `InvalidAccount` for a blank id.
    pub fn credit(account: &str, token: &str, amount: Decimal) -> Result<Self> {
        Ok(Self::Credit {
            account: AccountId::new(account)?,
            token: token.to_string(),
            amount,
        })
    }

    /// A placement stamped with a fresh order id and the current time.
    ///
    /// # Errors
    /// `InvalidAccount` for a blank id.
    pub fn place_order(
        account: &str,
        side: OrderSide,
        price: Decimal,
        quantity: Decimal,
    ) -> Result<Self> {
        Ok(Self::PlaceOrder {
            order_id: OrderId::new(),
            account: AccountId::new(account)?,
            side,
            price,
            quantity,
            created_at: Utc::now(),
        })
    }
}

/// Result of [`Market::register`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    /// `false` when the account already existed.
    pub created: bool,
    pub account: AccountId,
}

/// Result of [`Market::place_order`]: the order as it stands after matching,
/// and the trades it took part in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub order: Order,
    pub trades: Vec<Trade>,
}

/// What applying a [`Change`] produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    Registered(Registration),
    Credited(TokenBalances),
    Placed(Placement),
}

impl Applied {
    /// Whether the change altered market state (and so must be journaled).
    #[must_use]
    pub fn changed_state(&self) -> bool {
        !matches!(self, Self::Registered(Registration { created: false, .. }))
    }
}

/// Single-pair market: accounts, balances, one order book.
#[derive(Debug)]
pub struct Market {
    registry: AccountRegistry,
    ledger: BalanceLedger,
    book: OrderBook,
    matcher: Matcher,
    supply: SupplyConservation,
    next_order_sequence: u64,
    /// Every order id ever accepted, resting or not.
    order_ids: BTreeSet<OrderId>,
}

impl Market {
    #[must_use]
    pub fn new(config: &MarketConfig) -> Self {
        Self {
            registry: AccountRegistry::new(),
            ledger: BalanceLedger::new(config.pair()),
            book: OrderBook::new(config.dust_tolerance),
            matcher: Matcher::default(),
            supply: SupplyConservation::new(),
            next_order_sequence: 0,
            order_ids: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn pair(&self) -> &TokenPair {
        self.ledger.pair()
    }

    #[must_use]
    pub fn book(&self) -> &OrderBook {
        &self.book
    }

    #[must_use]
    pub fn ledger(&self) -> &BalanceLedger {
        &self.ledger
    }

    #[must_use]
    pub fn registry(&self) -> &AccountRegistry {
        &self.registry
    }

    // =================================================================
    // Operations
    // =================================================================

    /// Register an account and give it zero balances.
    pub fn register(&mut self, account: &str) -> Result<Registration> {
        match self.apply(&Change::register(account)?)? {
            Applied::Registered(registration) => Ok(registration),
            other => Err(unexpected(&other)),
        }
    }

    /// Balances of `account`; zeros if it is unknown.
    pub fn balances(&self, account: &str) -> Result<TokenBalances> {
        Ok(self.ledger.balances(&AccountId::new(account)?))
    }

    /// Unconditional credit. Returns the account's balances afterwards.
    pub fn credit(&mut self, account: &str, token: &str, amount: Decimal) -> Result<TokenBalances> {
        match self.apply(&Change::credit(account, token, amount)?)? {
            Applied::Credited(balances) => Ok(balances),
            other => Err(unexpected(&other)),
        }
    }

    /// Credit `amount` of the base token.
    pub fn mint_base(&mut self, account: &str, amount: Decimal) -> Result<TokenBalances> {
        let base = self.pair().base.clone();
        self.credit(account, &base, amount)
    }

    /// Reserve, insert, match and settle one limit order.
    ///
    /// # Errors
    /// - `UnknownAccount` if `account` was never registered
    /// - `InvalidOrder` for a price or quantity out of range or finer than
    ///   ledger precision
    /// - `InsufficientFunds` if the reservation cannot be covered
    ///
    /// On error the ledger and the book are unchanged.
    pub fn place_order(
        &mut self,
        account: &str,
        side: OrderSide,
        price: Decimal,
        quantity: Decimal,
    ) -> Result<Placement> {
        match self.apply(&Change::place_order(account, side, price, quantity)?)? {
            Applied::Placed(placement) => Ok(placement),
            other => Err(unexpected(&other)),
        }
    }

    /// [`place_order`](Self::place_order) with a `"buy"` / `"sell"` tag.
    ///
    /// # Errors
    /// `InvalidSide` for any other tag.
    pub fn place_order_str(
        &mut self,
        account: &str,
        side: &str,
        price: Decimal,
        quantity: Decimal,
    ) -> Result<Placement> {
        let side: OrderSide = side.parse()?;
        self.place_order(account, side, price, quantity)
    }

    /// Both sides of the book in rank order.
    #[must_use]
    pub fn orderbook_snapshot(&self) -> BookSnapshot {
        self.book.snapshot()
    }

    /// Check credited == balances + reservations + retained for each token.
    pub fn verify_supply(&self) -> Result<()> {
        for token in Token::ALL {
            let side = match token {
                Token::Base => OrderSide::Sell,
                Token::Quote => OrderSide::Buy,
            };
            self.supply.verify(
                self.ledger.pair(),
                token,
                self.ledger.total_supply(token),
                self.book.reserved(side),
            )?;
        }
        Ok(())
    }

    /// Apply one change. Used for live operations and for journal replay.
    pub fn apply(&mut self, change: &Change) -> Result<Applied> {
        match change {
            Change::Register { account } => Ok(Applied::Registered(self.apply_register(account))),
            Change::Credit {
                account,
                token,
                amount,
            } => self
                .apply_credit(account, token, *amount)
                .map(Applied::Credited),
            Change::PlaceOrder {
                order_id,
                account,
                side,
                price,
                quantity,
                created_at,
            } => {
                let order = Order::limit(
                    *order_id,
                    account.clone(),
                    *side,
                    *price,
                    *quantity,
                    self.next_order_sequence,
                    *created_at,
                );
                self.apply_place(account, order).map(Applied::Placed)
            }
        }
    }

    fn apply_register(&mut self, account: &AccountId) -> Registration {
        let created = self.registry.register(account.clone());
        self.ledger.ensure(account);
        if created {
            tracing::info!(account = %account, "Account registered");
        }
        Registration {
            created,
            account: account.clone(),
        }
    }

    fn apply_credit(&mut self, account: &AccountId, symbol: &str, amount: Decimal) -> Result<TokenBalances> {
        let token = self.ledger.pair().resolve(symbol)?;
        check_amount(amount)?;
        self.supply.check_credit(token, amount)?;
        self.ledger.credit_token(account, token, amount)?;
        self.supply.record_credit(token, amount)?;
        Ok(self.ledger.balances(account))
    }

    fn apply_place(&mut self, account: &AccountId, order: Result<Order>) -> Result<Placement> {
        if !self.registry.exists(account) {
            return Err(OgleError::UnknownAccount(account.clone()));
        }
        let order = order?;
        if self.order_ids.contains(&order.id) {
            return Err(OgleError::DuplicateOrder(order.id));
        }

        let reservation = funding::reserve(&mut self.ledger, &order)?;
        if let Err(err) = self.book.place(order.clone()) {
            funding::release(&mut self.ledger, &order)?;
            return Err(err);
        }
        self.order_ids.insert(order.id);
        self.next_order_sequence += 1;

        let outcome = self.matcher.run(&mut self.book, order.created_at);
        for trade in &outcome.trades {
            funding::settle(&mut self.ledger, trade)?;
        }
        for residual in outcome.dust() {
            funding::release(&mut self.ledger, residual)?;
        }
        self.supply.record_retained(Token::Quote, outcome.retained)?;

        let order_id = order.id;
        let current = self
            .book
            .get_order(&order_id)
            .or_else(|| outcome.removed.iter().find(|o| o.id == order_id))
            .cloned()
            .unwrap_or(order);

        tracing::info!(
            order_id = %current.id,
            account = %current.owner,
            side = %current.side,
            price = %current.price,
            qty = %current.quantity,
            reserved = %reservation.amount,
            trades = outcome.trades.len(),
            remaining = %current.remaining_qty,
            "Order placed"
        );

        Ok(Placement {
            order: current,
            trades: outcome.trades,
        })
    }

    // =================================================================
    // Persistence
    // =================================================================

    /// Capture the full market state, tagged with the last journal sequence
    /// it includes.
    #[must_use]
    pub fn to_state(&self, last_sequence: u64) -> MarketState {
        MarketState {
            version: constants::SNAPSHOT_VERSION,
            pair: self.ledger.pair().clone(),
            users: self.registry.accounts().to_vec(),
            balances: self.ledger.export(),
            orderbook: self.book.snapshot(),
            next_order_sequence: self.next_order_sequence,
            next_fill_sequence: self.matcher.fill_sequence(),
            supply: self.supply.clone(),
            order_ids: self.order_ids.clone(),
            last_sequence,
        }
    }

    /// Rebuild a market from a captured state.
    ///
    /// # Errors
    /// `SnapshotCorrupted` if the state does not belong to this configuration
    /// or does not add up.
    pub fn from_state(config: &MarketConfig, state: MarketState) -> Result<Self> {
        if state.version != constants::SNAPSHOT_VERSION {
            return Err(OgleError::SnapshotCorrupted {
                reason: format!("unsupported snapshot version {}", state.version),
            });
        }
        if state.pair != config.pair() {
            return Err(OgleError::SnapshotCorrupted {
                reason: format!("snapshot pair {} != configured {}", state.pair, config.pair()),
            });
        }

        let corrupted = |err: OgleError| OgleError::SnapshotCorrupted {
            reason: err.to_string(),
        };
        let market = Self {
            registry: AccountRegistry::restore(state.users),
            ledger: BalanceLedger::restore(state.pair, state.balances).map_err(corrupted)?,
            book: OrderBook::restore(state.orderbook, config.dust_tolerance).map_err(corrupted)?,
            matcher: Matcher::new(state.next_fill_sequence),
            supply: state.supply,
            next_order_sequence: state.next_order_sequence,
            order_ids: state.order_ids,
        };
        let resting = market.book.snapshot();
        if let Some(stray) = resting
            .bids
            .iter()
            .chain(&resting.asks)
            .find(|o| !market.order_ids.contains(&o.id))
        {
            return Err(OgleError::SnapshotCorrupted {
                reason: format!("resting order {} missing from placed ids", stray.id),
            });
        }
        market.verify_supply().map_err(corrupted)?;
        Ok(market)
    }

    /// The read-only documents: users, balances, order book.
    #[must_use]
    pub fn documents(&self) -> Documents {
        Documents {
            users: self.registry.accounts().to_vec(),
            balances: self.ledger.export(),
            orderbook: self.book.snapshot(),
        }
    }
}

fn unexpected(applied: &Applied) -> OgleError {
    OgleError::Internal(format!("unexpected change result: {applied:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(n: i64) -> Decimal {
        Decimal::new(n, 0)
    }

    fn market() -> Market {
        Market::new(&MarketConfig::default())
    }

    #[test]
    fn register_reports_created_once() {
        let mut m = market();
        let first = m.register("alice").unwrap();
        assert!(first.created);
        assert_eq!(first.account.as_str(), "alice");
        assert!(!m.register("alice").unwrap().created);
        assert_eq!(m.registry().len(), 1);
        assert_eq!(m.balances("alice").unwrap()["GCR"], Decimal::ZERO);
    }

    #[test]
    fn register_rejects_blank_id() {
        let mut m = market();
        assert!(matches!(
            m.register("  ").unwrap_err(),
            OgleError::InvalidAccount { .. }
        ));
    }

    #[test]
    fn mint_base_credits_base_token() {
        let mut m = market();
        m.register("alice").unwrap();
        let balances = m.mint_base("alice", dec(7)).unwrap();
        assert_eq!(balances["GCR"], dec(7));
        assert_eq!(balances["OGLEC"], Decimal::ZERO);
    }

    #[test]
    fn credit_does_not_require_registration() {
        let mut m = market();
        let balances = m.credit("walk-in", "OGLEC", dec(3)).unwrap();
        assert_eq!(balances["OGLEC"], dec(3));
        assert!(!m.registry().exists(&AccountId::new("walk-in").unwrap()));
    }

    #[test]
    fn place_order_requires_registered_account() {
        let mut m = market();
        m.credit("ghost", "OGLEC", dec(100)).unwrap();
        let err = m
            .place_order("ghost", OrderSide::Buy, dec(1), dec(1))
            .unwrap_err();
        assert!(matches!(err, OgleError::UnknownAccount(_)));
        assert_eq!(m.balances("ghost").unwrap()["OGLEC"], dec(100));
    }

    #[test]
    fn invalid_order_reserves_nothing() {
        let mut m = market();
        m.register("a").unwrap();
        m.credit("a", "OGLEC", dec(100)).unwrap();
        for (price, qty) in [(dec(0), dec(1)), (dec(1), dec(0)), (dec(-1), dec(1))] {
            let err = m.place_order("a", OrderSide::Buy, price, qty).unwrap_err();
            assert!(matches!(err, OgleError::InvalidOrder { .. }));
        }
        assert_eq!(m.balances("a").unwrap()["OGLEC"], dec(100));
        assert!(m.book().is_empty());
    }

    #[test]
    fn dust_sized_order_is_rolled_back() {
        let mut m = market();
        m.register("a").unwrap();
        m.credit("a", "GCR", dec(1)).unwrap();
        let err = m
            .place_order("a", OrderSide::Sell, dec(1), Decimal::new(1, 10))
            .unwrap_err();
        assert!(matches!(err, OgleError::InvalidOrder { .. }));
        assert_eq!(m.balances("a").unwrap()["GCR"], dec(1));
        m.verify_supply().unwrap();
    }

    #[test]
    fn place_order_str_rejects_unknown_side() {
        let mut m = market();
        m.register("a").unwrap();
        let err = m.place_order_str("a", "hold", dec(1), dec(1)).unwrap_err();
        assert!(matches!(err, OgleError::InvalidSide(ref s) if s == "hold"));
        let unfunded = m.place_order_str("a", "SELL", dec(1), dec(1));
        assert!(matches!(unfunded.unwrap_err(), OgleError::InsufficientFunds { .. }));
    }

    #[test]
    fn resting_order_keeps_reservation() {
        let mut m = market();
        m.register("a").unwrap();
        m.credit("a", "OGLEC", dec(1000)).unwrap();
        let placed = m.place_order("a", OrderSide::Buy, dec(5), dec(10)).unwrap();
        assert!(placed.trades.is_empty());
        assert_eq!(placed.order.status(m.book().dust_tolerance()), OrderStatus::Open);
        assert_eq!(m.balances("a").unwrap()["OGLEC"], dec(950));
        assert_eq!(m.orderbook_snapshot().bids.len(), 1);
        m.verify_supply().unwrap();
    }

    #[test]
    fn unchanged_registration_is_not_a_state_change() {
        let mut m = market();
        let change = Change::register("a").unwrap();
        assert!(m.apply(&change).unwrap().changed_state());
        assert!(!m.apply(&change).unwrap().changed_state());
    }

    #[test]
    fn change_serializes_with_op_tag() {
        let change = Change::credit("a", "GCR", Decimal::new(25, 1)).unwrap();
        let json = serde_json::to_string(&change).unwrap();
        assert!(json.contains("\"op\":\"credit\""), "{json}");
        let back: Change = serde_json::from_str(&json).unwrap();
        assert_eq!(back, change);
    }

    #[test]
    fn state_roundtrip_rebuilds_market() {
        let mut m = market();
        m.register("a").unwrap();
        m.register("b").unwrap();
        m.credit("a", "OGLEC", dec(100)).unwrap();
        m.credit("b", "GCR", dec(10)).unwrap();
        m.place_order("a", OrderSide::Buy, dec(3), dec(5)).unwrap();
        m.place_order("b", OrderSide::Sell, dec(4), dec(2)).unwrap();

        let state = m.to_state(9);
        let restored = Market::from_state(&MarketConfig::default(), state.clone()).unwrap();
        assert_eq!(restored.to_state(9), state);
    }

    #[test]
    fn fine_scale_trade_survives_restart() {
        let mut m = market();
        m.register("buyer").unwrap();
        m.register("seller").unwrap();
        m.credit("buyer", "OGLEC", Decimal::from(1_000_000)).unwrap();
        m.credit("seller", "GCR", dec(100)).unwrap();

        let qty = Decimal::new(7_777_777_777_777, 12);
        m.place_order("buyer", OrderSide::Buy, Decimal::new(3_333_333_333_333, 12), qty)
            .unwrap();
        let placed = m
            .place_order("seller", OrderSide::Sell, Decimal::new(1_000_000_000_001, 12), qty)
            .unwrap();
        assert_eq!(placed.trades.len(), 1);
        assert!(m.book().is_empty());
        m.verify_supply().unwrap();

        let state = m.to_state(4);
        let restored = Market::from_state(&MarketConfig::default(), state.clone()).unwrap();
        assert_eq!(restored.to_state(4), state);
    }

    #[test]
    fn overflowing_amounts_are_rejected_not_panics() {
        let mut m = market();
        m.register("a").unwrap();
        assert!(matches!(
            m.credit("a", "GCR", Decimal::MAX).unwrap_err(),
            OgleError::InvalidAmount { .. }
        ));
        m.credit("a", "GCR", constants::MAX_SUPPLY).unwrap();
        assert!(matches!(
            m.credit("a", "GCR", Decimal::ONE).unwrap_err(),
            OgleError::InvalidAmount { .. }
        ));
        m.credit("a", "OGLEC", dec(10)).unwrap();

        for (side, price, qty) in [
            (OrderSide::Buy, Decimal::MAX, dec(2)),
            (OrderSide::Sell, dec(1), Decimal::MAX),
            (OrderSide::Buy, dec(1), Decimal::new(1, 20)),
        ] {
            let err = m.place_order("a", side, price, qty).unwrap_err();
            assert!(matches!(err, OgleError::InvalidOrder { .. }), "{err}");
        }
        let err = m
            .place_order("a", OrderSide::Buy, constants::MAX_PRICE, constants::MAX_SUPPLY)
            .unwrap_err();
        assert!(matches!(err, OgleError::InsufficientFunds { .. }));

        assert_eq!(m.balances("a").unwrap()["GCR"], constants::MAX_SUPPLY);
        assert_eq!(m.balances("a").unwrap()["OGLEC"], dec(10));
        assert!(m.book().is_empty());
        m.verify_supply().unwrap();
    }

    #[test]
    fn order_id_of_a_filled_order_is_not_reused() {
        let mut m = market();
        m.register("a").unwrap();
        m.register("b").unwrap();
        m.credit("a", "OGLEC", dec(100)).unwrap();
        m.credit("b", "GCR", dec(10)).unwrap();

        let first = Change::place_order("a", OrderSide::Buy, dec(2), dec(1)).unwrap();
        m.apply(&first).unwrap();
        m.place_order("b", OrderSide::Sell, dec(2), dec(1)).unwrap();
        assert!(m.book().is_empty());

        let before = m.to_state(0);
        let err = m.apply(&first).unwrap_err();
        assert!(matches!(err, OgleError::DuplicateOrder(_)));
        assert_eq!(m.to_state(0), before);

        let mut restored = Market::from_state(&MarketConfig::default(), before).unwrap();
        assert!(matches!(
            restored.apply(&first).unwrap_err(),
            OgleError::DuplicateOrder(_)
        ));
    }

    #[test]
    fn from_state_rejects_resting_order_without_placed_id() {
        let mut m = market();
        m.register("a").unwrap();
        m.credit("a", "OGLEC", dec(100)).unwrap();
        m.place_order("a", OrderSide::Buy, dec(2), dec(1)).unwrap();
        let mut state = m.to_state(3);
        state.order_ids.clear();
        assert!(matches!(
            Market::from_state(&MarketConfig::default(), state).unwrap_err(),
            OgleError::SnapshotCorrupted { .. }
        ));
    }

    #[test]
    fn from_state_rejects_foreign_pair() {
        let state = market().to_state(0);
        let config = MarketConfig {
            base_token: "BTC".into(),
            quote_token: "USD".into(),
            ..MarketConfig::default()
        };
        assert!(matches!(
            Market::from_state(&config, state).unwrap_err(),
            OgleError::SnapshotCorrupted { .. }
        ));
    }
}
