//! Token and balance types for the two-token ledger.
//!
//! The market trades exactly one pair: a **base** unit (what is bought and
//! sold) priced in a **quote** unit. Each account holds one non-negative
//! amount of each.

use std::collections::BTreeMap;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::{OgleError, Result, constants};

/// One of the two supported tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum Token {
    Base,
    Quote,
}

impl Token {
    pub const ALL: [Self; 2] = [Self::Base, Self::Quote];
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Base => write!(f, "BASE"),
            Self::Quote => write!(f, "QUOTE"),
        }
    }
}

/// Symbols of the traded pair (e.g., GCR/OGLEC).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenPair {
    pub base: String,
    pub quote: String,
}

impl TokenPair {
    #[must_use]
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            quote: quote.into(),
        }
    }

    /// Resolve a caller-supplied symbol to a [`Token`].
    ///
    /// # Errors
    /// Returns `UnsupportedToken` for anything but the two pair symbols.
    pub fn resolve(&self, symbol: &str) -> Result<Token> {
        if symbol == self.base {
            Ok(Token::Base)
        } else if symbol == self.quote {
            Ok(Token::Quote)
        } else {
            Err(OgleError::UnsupportedToken(symbol.to_string()))
        }
    }

    #[must_use]
    pub fn symbol(&self, token: Token) -> &str {
        match token {
            Token::Base => &self.base,
            Token::Quote => &self.quote,
        }
    }
}

impl Default for TokenPair {
    fn default() -> Self {
        Self::new(constants::DEFAULT_BASE_TOKEN, constants::DEFAULT_QUOTE_TOKEN)
    }
}

impl std::fmt::Display for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

/// Balances of one account.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct BalanceEntry {
    pub base: Decimal,
    pub quote: Decimal,
}

impl BalanceEntry {
    #[must_use]
    pub fn get(&self, token: Token) -> Decimal {
        match token {
            Token::Base => self.base,
            Token::Quote => self.quote,
        }
    }

    pub fn get_mut(&mut self, token: Token) -> &mut Decimal {
        match token {
            Token::Base => &mut self.base,
            Token::Quote => &mut self.quote,
        }
    }

    /// Whether this entry holds nothing at all.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.base.is_zero() && self.quote.is_zero()
    }

    /// Render as the `{symbol -> amount}` map the presentation layer expects.
    #[must_use]
    pub fn to_token_map(&self, pair: &TokenPair) -> TokenBalances {
        Token::ALL
            .iter()
            .map(|&t| (pair.symbol(t).to_string(), self.get(t)))
            .collect()
    }
}

/// `{token symbol -> amount}` for one account.
pub type TokenBalances = BTreeMap<String, Decimal>;

/// `true` if `value` needs at most [`constants::MAX_DECIMALS`] decimal places.
#[must_use]
pub fn within_precision(value: Decimal) -> bool {
    value.normalize().scale() <= constants::MAX_DECIMALS
}

/// Validate an amount entering the ledger.
///
/// # Errors
/// `InvalidAmount` unless `0 < amount <= MAX_SUPPLY` with at most
/// `MAX_DECIMALS` places.
pub fn check_amount(amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO || amount > constants::MAX_SUPPLY || !within_precision(amount) {
        return Err(OgleError::InvalidAmount { amount });
    }
    Ok(())
}

/// Round down to ledger precision.
#[must_use]
pub fn floor_amount(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(constants::MAX_DECIMALS, RoundingStrategy::ToZero)
}

/// Round up to ledger precision.
#[must_use]
pub fn ceil_amount(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(constants::MAX_DECIMALS, RoundingStrategy::AwayFromZero)
}
