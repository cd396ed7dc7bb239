//! Reserve → Settle → Release.
//!
//! The three ledger transitions around an order's life:
//!
//! 1. **Reserve** at placement: debit `order.reserved` of the committed
//!    token (buy: `price × quantity` quote rounded up to ledger precision,
//!    sell: `quantity` base). If the debit fails the order is never placed.
//! 2. **Settle** per trade: credit the buyer `quantity` base and the seller
//!    `quote_amount` quote. The reserved side was already debited.
//! 3. **Release** when an order leaves the book unfilled: return whatever of
//!    its reservation is still held to the owner.
//!
//! A buy reserves at its limit price but pays the trade price; the matcher
//! reports the difference as retained and it is not refunded here.

use ogle_types::{AccountId, Order, Result, Token, Trade};
use rust_decimal::Decimal;

use crate::BalanceLedger;

/// Funds debited from an owner and held against an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    pub owner: AccountId,
    pub token: Token,
    pub amount: Decimal,
}

/// Proceeds credited for one trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    /// Base credited to the buyer.
    pub base_to_buyer: Decimal,
    /// Quote credited to the seller.
    pub quote_to_seller: Decimal,
}

/// Debit the funds `order` commits.
///
/// # Errors
/// `InsufficientFunds` if the owner cannot cover the reservation; the ledger
/// is unchanged.
pub fn reserve(ledger: &mut BalanceLedger, order: &Order) -> Result<Reservation> {
    let token = order.side.reserved_token();
    let amount = order.reserved;

    if let Err(err) = ledger.debit_token(&order.owner, token, amount) {
        tracing::warn!(
            account = %order.owner,
            order_id = %order.id,
            side = %order.side,
            amount = %amount,
            error = %err,
            "Reservation rejected"
        );
        return Err(err);
    }

    Ok(Reservation {
        owner: order.owner.clone(),
        token,
        amount,
    })
}

/// Credit both counterparties of `trade`.
pub fn settle(ledger: &mut BalanceLedger, trade: &Trade) -> Result<Settlement> {
    let settlement = Settlement {
        base_to_buyer: trade.quantity,
        quote_to_seller: trade.quote_amount,
    };
    if settlement.base_to_buyer > Decimal::ZERO {
        ledger.credit_token(&trade.buyer, Token::Base, settlement.base_to_buyer)?;
    }
    if settlement.quote_to_seller > Decimal::ZERO {
        ledger.credit_token(&trade.seller, Token::Quote, settlement.quote_to_seller)?;
    }
    Ok(settlement)
}

/// Return what is still reserved against `residual` to its owner.
///
/// Returns `None` when nothing was left to release.
pub fn release(ledger: &mut BalanceLedger, residual: &Order) -> Result<Option<Reservation>> {
    let amount = residual.reserved;
    if amount <= Decimal::ZERO {
        return Ok(None);
    }
    let token = residual.side.reserved_token();
    ledger.credit_token(&residual.owner, token, amount)?;

    tracing::debug!(
        account = %residual.owner,
        order_id = %residual.id,
        amount = %amount,
        "Released residual reservation"
    );
    Ok(Some(Reservation {
        owner: residual.owner.clone(),
        token,
        amount,
    }))
}
