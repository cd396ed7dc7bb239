//! Per-account balances of the two pair tokens.
//!
//! Every mutation validates first and mutates second: a failed call leaves
//! the ledger exactly as it was. Balances never go negative.

use std::collections::BTreeMap;

use ogle_types::{
    AccountId, BalanceEntry, OgleError, Result, Token, TokenBalances, TokenPair, check_amount,
    constants, within_precision,
};
use rust_decimal::Decimal;

/// The balances document: `{account -> {symbol -> amount}}`.
pub type BalancesDocument = BTreeMap<String, TokenBalances>;

/// Source of truth for all balance state.
#[derive(Debug, Clone)]
pub struct BalanceLedger {
    pair: TokenPair,
    balances: BTreeMap<AccountId, BalanceEntry>,
}

impl BalanceLedger {
    #[must_use]
    pub fn new(pair: TokenPair) -> Self {
        Self {
            pair,
            balances: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn pair(&self) -> &TokenPair {
        &self.pair
    }

    /// Give `id` zero balances if it has none yet.
    pub fn ensure(&mut self, id: &AccountId) {
        self.balances.entry(id.clone()).or_default();
    }

    /// Credit `amount` of the token named `symbol`. Returns the new balance.
    ///
    /// # Errors
    /// `UnsupportedToken`, or `InvalidAmount` if the amount is not positive,
    /// is finer than ledger precision, or would push the balance past
    /// `MAX_SUPPLY`.
    pub fn credit(&mut self, id: &AccountId, symbol: &str, amount: Decimal) -> Result<Decimal> {
        let token = self.pair.resolve(symbol)?;
        self.credit_token(id, token, amount)
    }

    /// Debit `amount` of the token named `symbol`. Returns the new balance.
    ///
    /// # Errors
    /// `UnsupportedToken`, `InvalidAmount`, or `InsufficientFunds`.
    pub fn debit(&mut self, id: &AccountId, symbol: &str, amount: Decimal) -> Result<Decimal> {
        let token = self.pair.resolve(symbol)?;
        self.debit_token(id, token, amount)
    }

    /// Typed variant of [`credit`](Self::credit).
    pub fn credit_token(&mut self, id: &AccountId, token: Token, amount: Decimal) -> Result<Decimal> {
        check_amount(amount)?;
        let balance = self
            .balance(id, token)
            .checked_add(amount)
            .filter(|b| *b <= constants::MAX_SUPPLY)
            .ok_or(OgleError::InvalidAmount { amount })?;
        *self.balances.entry(id.clone()).or_default().get_mut(token) = balance;

        tracing::debug!(
            account = %id,
            token = self.pair.symbol(token),
            amount = %amount,
            balance = %balance,
            "Credited"
        );
        Ok(balance)
    }

    /// Typed variant of [`debit`](Self::debit).
    pub fn debit_token(&mut self, id: &AccountId, token: Token, amount: Decimal) -> Result<Decimal> {
        if amount <= Decimal::ZERO {
            return Err(OgleError::InvalidAmount { amount });
        }
        let available = self.balance(id, token);
        if available < amount {
            return Err(OgleError::InsufficientFunds {
                token: self.pair.symbol(token).to_string(),
                needed: amount,
                available,
            });
        }

        let slot = self.balances.entry(id.clone()).or_default().get_mut(token);
        *slot -= amount;
        let balance = *slot;

        tracing::debug!(
            account = %id,
            token = self.pair.symbol(token),
            amount = %amount,
            balance = %balance,
            "Debited"
        );
        Ok(balance)
    }

    /// Balance of one token; zero for unknown accounts.
    #[must_use]
    pub fn balance(&self, id: &AccountId, token: Token) -> Decimal {
        self.entry(id).get(token)
    }

    /// Both balances of an account; zeros for unknown accounts.
    #[must_use]
    pub fn entry(&self, id: &AccountId) -> BalanceEntry {
        self.balances.get(id).copied().unwrap_or_default()
    }

    /// `{symbol -> amount}` for an account. Does not create the account.
    #[must_use]
    pub fn balances(&self, id: &AccountId) -> TokenBalances {
        self.entry(id).to_token_map(&self.pair)
    }

    #[must_use]
    pub fn contains(&self, id: &AccountId) -> bool {
        self.balances.contains_key(id)
    }

    /// Accounts holding a balance entry, in id order.
    pub fn accounts(&self) -> impl Iterator<Item = &AccountId> {
        self.balances.keys()
    }

    /// Sum of every account's balance of `token`.
    #[must_use]
    pub fn total_supply(&self, token: Token) -> Decimal {
        self.balances
            .values()
            .fold(Decimal::ZERO, |acc, entry| acc.saturating_add(entry.get(token)))
    }

    /// The balances document.
    #[must_use]
    pub fn export(&self) -> BalancesDocument {
        self.balances
            .iter()
            .map(|(id, entry)| (id.to_string(), entry.to_token_map(&self.pair)))
            .collect()
    }

    /// Rebuild from a balances document.
    ///
    /// # Errors
    /// `InvalidAccount` for a blank id, `UnsupportedToken` for a symbol
    /// outside the pair, `InvalidAmount` for a negative amount or one outside
    /// ledger precision and supply.
    pub fn restore(pair: TokenPair, document: BalancesDocument) -> Result<Self> {
        let mut ledger = Self::new(pair);
        for (account, tokens) in document {
            let id = AccountId::new(account)?;
            let mut entry = BalanceEntry::default();
            for (symbol, amount) in tokens {
                let token = ledger.pair.resolve(&symbol)?;
                if amount < Decimal::ZERO
                    || amount > constants::MAX_SUPPLY
                    || !within_precision(amount)
                {
                    return Err(OgleError::InvalidAmount { amount });
                }
                *entry.get_mut(token) = amount;
            }
            ledger.balances.insert(id, entry);
        }
        Ok(ledger)
    }
}
