//! Supply conservation invariant checker.
//!
//! Value only enters the market through credits. Once in, every unit is in
//! exactly one place: an account balance, a reservation held by a resting
//! order, or the price improvement retained from buyers:
//!
//! ```text
//! ∀ token: Σ credits == Σ balances + Σ open reservations + retained
//! ```

use ogle_types::{BalanceEntry, OgleError, Result, Token, TokenPair, constants};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Per-token running totals of value that entered the market and value the
/// market kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplyConservation {
    /// Total credited per token since genesis.
    credited: BalanceEntry,
    /// Price improvement retained by the market per token.
    retained: BalanceEntry,
}

impl SupplyConservation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// New total credited for `token` if `amount` were credited.
    ///
    /// # Errors
    /// `InvalidAmount` for a non-positive amount or a total past
    /// `MAX_SUPPLY`.
    pub fn check_credit(&self, token: Token, amount: Decimal) -> Result<Decimal> {
        if amount <= Decimal::ZERO {
            return Err(OgleError::InvalidAmount { amount });
        }
        self.total_credited(token)
            .checked_add(amount)
            .filter(|total| *total <= constants::MAX_SUPPLY)
            .ok_or(OgleError::InvalidAmount { amount })
    }

    /// Record value entering the market. Nothing is recorded on error.
    ///
    /// # Errors
    /// As [`check_credit`](Self::check_credit).
    pub fn record_credit(&mut self, token: Token, amount: Decimal) -> Result<()> {
        let total = self.check_credit(token, amount)?;
        *self.credited.get_mut(token) = total;
        Ok(())
    }

    /// # Errors
    /// `SupplyInvariantViolation` if the running total overflows.
    pub fn record_retained(&mut self, token: Token, amount: Decimal) -> Result<()> {
        let slot = self.retained.get_mut(token);
        *slot = slot
            .checked_add(amount)
            .ok_or_else(|| OgleError::SupplyInvariantViolation {
                reason: format!("retained {token} overflows adding {amount}"),
            })?;
        Ok(())
    }

    #[must_use]
    pub fn total_credited(&self, token: Token) -> Decimal {
        self.credited.get(token)
    }

    #[must_use]
    pub fn total_retained(&self, token: Token) -> Decimal {
        self.retained.get(token)
    }

    /// Check one token.
    ///
    /// # Errors
    /// [`OgleError::SupplyInvariantViolation`] if the amounts do not add up.
    pub fn verify(
        &self,
        pair: &TokenPair,
        token: Token,
        balances: Decimal,
        reserved: Decimal,
    ) -> Result<()> {
        let expected = self.total_credited(token);
        let retained = self.total_retained(token);
        let actual = balances
            .checked_add(reserved)
            .and_then(|sum| sum.checked_add(retained));
        if actual != Some(expected) {
            let reason = format!(
                "token {}: credited {expected} != balances {balances} + reserved {reserved} \
                 + retained {retained}",
                pair.symbol(token)
            );
            tracing::error!(reason = %reason, "Supply invariant violated");
            return Err(OgleError::SupplyInvariantViolation { reason });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(n: i64) -> Decimal {
        Decimal::new(n, 0)
    }

    #[test]
    fn empty_supply_verifies_at_zero() {
        let sc = SupplyConservation::new();
        let pair = TokenPair::default();
        for token in Token::ALL {
            assert!(sc.verify(&pair, token, Decimal::ZERO, Decimal::ZERO).is_ok());
        }
    }

    #[test]
    fn credits_accumulate_per_token() {
        let mut sc = SupplyConservation::new();
        sc.record_credit(Token::Quote, dec(1000)).unwrap();
        sc.record_credit(Token::Quote, dec(500)).unwrap();
        sc.record_credit(Token::Base, dec(3)).unwrap();
        assert_eq!(sc.total_credited(Token::Quote), dec(1500));
        assert_eq!(sc.total_credited(Token::Base), dec(3));
    }

    #[test]
    fn verify_counts_reservations_and_retained() {
        let mut sc = SupplyConservation::new();
        let pair = TokenPair::default();
        sc.record_credit(Token::Quote, dec(1000)).unwrap();
        sc.record_retained(Token::Quote, dec(5)).unwrap();
        assert!(sc.verify(&pair, Token::Quote, dec(945), dec(50)).is_ok());
    }

    #[test]
    fn verify_fails_on_leak() {
        let mut sc = SupplyConservation::new();
        let pair = TokenPair::default();
        sc.record_credit(Token::Base, dec(10)).unwrap();
        let err = sc.verify(&pair, Token::Base, dec(9), Decimal::ZERO).unwrap_err();
        assert!(matches!(err, OgleError::SupplyInvariantViolation { .. }));
        assert!(err.to_string().contains("GCR"));
    }

    #[test]
    fn credits_stop_at_supply_limit() {
        let mut sc = SupplyConservation::new();
        sc.record_credit(Token::Base, constants::MAX_SUPPLY - Decimal::ONE)
            .unwrap();
        assert!(sc.record_credit(Token::Base, dec(2)).is_err());
        assert!(sc.record_credit(Token::Base, Decimal::MAX).is_err());
        assert_eq!(sc.total_credited(Token::Base), constants::MAX_SUPPLY - Decimal::ONE);
        sc.record_credit(Token::Base, Decimal::ONE).unwrap();
        assert_eq!(sc.total_credited(Token::Base), constants::MAX_SUPPLY);
    }

    #[test]
    fn verify_reports_overflowing_sums_as_violation() {
        let mut sc = SupplyConservation::new();
        sc.record_credit(Token::Quote, dec(1)).unwrap();
        let err = sc
            .verify(&TokenPair::default(), Token::Quote, Decimal::MAX, Decimal::MAX)
            .unwrap_err();
        assert!(matches!(err, OgleError::SupplyInvariantViolation { .. }));
    }

    #[test]
    fn serde_roundtrip() {
        let mut sc = SupplyConservation::new();
        sc.record_credit(Token::Quote, Decimal::new(12345, 2)).unwrap();
        sc.record_retained(Token::Quote, Decimal::new(5, 1)).unwrap();
        let json = serde_json::to_string(&sc).unwrap();
        let back: SupplyConservation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sc);
    }
}
