//! Order types for the market core.
//!
//! An [`Order`] only exists once its funds have been reserved. After that,
//! only the matcher touches it, and only to shrink `remaining_qty` and the
//! `reserved` funds it still holds.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{AccountId, OgleError, OrderId, Result, Token, ceil_amount, constants, within_precision};

/// Which side of the book this order is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// The token this side commits at placement.
    #[must_use]
    pub fn reserved_token(self) -> Token {
        match self {
            Self::Buy => Token::Quote,
            Self::Sell => Token::Base,
        }
    }
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

impl std::str::FromStr for OrderSide {
    type Err = OgleError;

    /// Parse the loosely-typed tag the boundary layer sends (`"buy"` / `"sell"`).
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" => Ok(Self::Buy),
            "sell" => Ok(Self::Sell),
            _ => Err(OgleError::InvalidSide(s.to_string())),
        }
    }
}

/// Lifecycle status of an order. There is no cancelled state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    Open,
    PartiallyFilled,
    Filled,
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "OPEN"),
            Self::PartiallyFilled => write!(f, "PARTIALLY_FILLED"),
            Self::Filled => write!(f, "FILLED"),
        }
    }
}

/// A limit order resting in (or passing through) the book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub owner: AccountId,
    pub side: OrderSide,
    /// Quote units per base unit.
    pub price: Decimal,
    /// Original size in base units.
    pub quantity: Decimal,
    /// Unfilled size in base units.
    pub remaining_qty: Decimal,
    /// Funds of `side.reserved_token()` still held against this order.
    pub reserved: Decimal,
    /// Market-wide placement counter; breaks timestamp ties.
    pub sequence: u64,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// A new limit order carrying the reservation it needs.
    ///
    /// # Errors
    /// `InvalidOrder` if the terms fail [`validate`](Self::validate).
    pub fn limit(
        id: OrderId,
        owner: AccountId,
        side: OrderSide,
        price: Decimal,
        quantity: Decimal,
        sequence: u64,
        created_at: DateTime<Utc>,
    ) -> Result<Self> {
        let mut order = Self {
            id,
            owner,
            side,
            price,
            quantity,
            remaining_qty: quantity,
            reserved: Decimal::ZERO,
            sequence,
            created_at,
        };
        order.validate()?;
        order.reserved = Self::reservation(side, price, quantity)?;
        Ok(order)
    }

    /// Funds an order of this size commits: `price × quantity` quote
    /// (rounded up to ledger precision) for a buy, `quantity` base for a sell.
    ///
    /// # Errors
    /// `InvalidOrder` if the notional overflows.
    pub fn reservation(side: OrderSide, price: Decimal, quantity: Decimal) -> Result<Decimal> {
        match side {
            OrderSide::Buy => price
                .checked_mul(quantity)
                .map(ceil_amount)
                .ok_or_else(|| OgleError::InvalidOrder {
                    reason: format!("notional {price} x {quantity} overflows"),
                }),
            OrderSide::Sell => Ok(quantity),
        }
    }

    /// Reject orders that can never be valid book entries.
    ///
    /// # Errors
    /// Returns `InvalidOrder` for a price outside `(0, MAX_PRICE]`, a
    /// quantity outside `(0, MAX_SUPPLY]`, a negative reservation (or a sell
    /// whose reservation is not its remaining quantity), or any figure finer
    /// than `MAX_DECIMALS` places.
    pub fn validate(&self) -> Result<()> {
        if self.price <= Decimal::ZERO || self.price > constants::MAX_PRICE {
            return Err(OgleError::InvalidOrder {
                reason: format!(
                    "price must be in (0, {}], got {}",
                    constants::MAX_PRICE,
                    self.price
                ),
            });
        }
        if self.quantity <= Decimal::ZERO
            || self.remaining_qty <= Decimal::ZERO
            || self.quantity > constants::MAX_SUPPLY
        {
            return Err(OgleError::InvalidOrder {
                reason: format!(
                    "quantity must be in (0, {}], got {}",
                    constants::MAX_SUPPLY,
                    self.remaining_qty
                ),
            });
        }
        if self.remaining_qty > self.quantity {
            return Err(OgleError::InvalidOrder {
                reason: format!(
                    "remaining {} exceeds quantity {}",
                    self.remaining_qty, self.quantity
                ),
            });
        }
        if self.reserved < Decimal::ZERO
            || (self.side == OrderSide::Sell && self.reserved != self.remaining_qty)
        {
            return Err(OgleError::InvalidOrder {
                reason: format!(
                    "reservation {} does not fit a {} of {}",
                    self.reserved, self.side, self.remaining_qty
                ),
            });
        }
        for (what, value) in [
            ("price", self.price),
            ("quantity", self.quantity),
            ("remaining", self.remaining_qty),
            ("reserved", self.reserved),
        ] {
            if !within_precision(value) {
                return Err(OgleError::InvalidOrder {
                    reason: format!(
                        "{what} {value} has more than {} decimal places",
                        constants::MAX_DECIMALS
                    ),
                });
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn is_filled(&self, dust_tolerance: Decimal) -> bool {
        self.remaining_qty <= dust_tolerance
    }

    #[must_use]
    pub fn filled_qty(&self) -> Decimal {
        self.quantity - self.remaining_qty
    }

    #[must_use]
    pub fn status(&self, dust_tolerance: Decimal) -> OrderStatus {
        if self.is_filled(dust_tolerance) {
            OrderStatus::Filled
        } else if self.remaining_qty < self.quantity {
            OrderStatus::PartiallyFilled
        } else {
            OrderStatus::Open
        }
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl Order {
    pub fn dummy_limit(side: OrderSide, price: Decimal, qty: Decimal) -> Self {
        Self::dummy_limit_for(
            AccountId::new("dummy").expect("static id is valid"),
            side,
            price,
            qty,
        )
    }

    /// Terms are not validated, so invalid orders can be built too.
    pub fn dummy_limit_for(owner: AccountId, side: OrderSide, price: Decimal, qty: Decimal) -> Self {
        Self {
            id: OrderId::new(),
            owner,
            side,
            price,
            quantity: qty,
            remaining_qty: qty,
            reserved: Self::reservation(side, price, qty).unwrap_or(Decimal::ZERO),
            sequence: 0,
            created_at: Utc::now(),
        }
    }

    /// Same order, stamped at `created_at` with placement `sequence`.
    #[must_use]
    pub fn at(mut self, created_at: DateTime<Utc>, sequence: u64) -> Self {
        self.created_at = created_at;
        self.sequence = sequence;
        self
    }
}
