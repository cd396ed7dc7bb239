//! Randomized credit/debit sequences against the balance ledger.

use ogle_ledger::{BalanceLedger, SupplyConservation, funding};
use ogle_types::*;
use rand::{Rng, SeedableRng, rngs::StdRng};
use rust_decimal::Decimal;

fn accounts() -> Vec<AccountId> {
    ["alice", "bob", "carol"]
        .into_iter()
        .map(|n| AccountId::new(n).unwrap())
        .collect()
}

#[test]
fn balances_never_go_negative() {
    let mut rng = StdRng::seed_from_u64(7);
    let pair = TokenPair::default();
    let mut ledger = BalanceLedger::new(pair.clone());
    let mut held = BalanceEntry::default();
    let accounts = accounts();

    for _ in 0..2_000 {
        let id = &accounts[rng.gen_range(0..accounts.len())];
        let token = Token::ALL[rng.gen_range(0..2)];
        let amount = Decimal::new(rng.gen_range(1..=5_000), 2);

        if rng.gen_bool(0.4) {
            ledger.credit(id, pair.symbol(token), amount).unwrap();
            *held.get_mut(token) += amount;
        } else {
            let before = ledger.balance(id, token);
            match ledger.debit(id, pair.symbol(token), amount) {
                Ok(after) => {
                    assert_eq!(after, before - amount);
                    *held.get_mut(token) -= amount;
                }
                Err(OgleError::InsufficientFunds { available, .. }) => {
                    assert!(before < amount);
                    assert_eq!(available, before);
                    assert_eq!(ledger.balance(id, token), before);
                }
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        for a in &accounts {
            for t in Token::ALL {
                assert!(ledger.balance(a, t) >= Decimal::ZERO);
            }
        }
    }

    for token in Token::ALL {
        assert_eq!(ledger.total_supply(token), held.get(token));
    }
}

/// Draw a positive amount with exactly `places` decimal places.
fn fine_amount(rng: &mut StdRng, places: u32) -> Decimal {
    Decimal::new(rng.gen_range(1..=9_999_999_999_999_i64), places)
}

#[test]
fn full_precision_credits_and_debits_stay_exact() {
    let mut rng = StdRng::seed_from_u64(0x5CA1E);
    let mut ledger = BalanceLedger::new(TokenPair::default());
    let mut supply = SupplyConservation::new();
    let mut withdrawn = BalanceEntry::default();
    let accounts = accounts();

    for _ in 0..2_000 {
        let id = &accounts[rng.gen_range(0..accounts.len())];
        let token = Token::ALL[rng.gen_range(0..2)];
        let amount = fine_amount(&mut rng, constants::MAX_DECIMALS);

        if rng.gen_bool(0.5) {
            supply.check_credit(token, amount).unwrap();
            ledger.credit_token(id, token, amount).unwrap();
            supply.record_credit(token, amount).unwrap();
        } else if ledger.debit_token(id, token, amount).is_ok() {
            *withdrawn.get_mut(token) += amount;
        }
    }

    for token in Token::ALL {
        assert_eq!(
            ledger.total_supply(token) + withdrawn.get(token),
            supply.total_credited(token)
        );
    }
}

#[test]
fn credits_near_the_supply_limit_fail_cleanly() {
    let mut rng = StdRng::seed_from_u64(0xB16);
    let pair = TokenPair::default();
    let mut ledger = BalanceLedger::new(pair.clone());
    let mut supply = SupplyConservation::new();
    let accounts = accounts();
    let quarter = constants::MAX_SUPPLY / Decimal::from(4);

    for _ in 0..200 {
        let id = &accounts[rng.gen_range(0..accounts.len())];
        let token = Token::ALL[rng.gen_range(0..2)];
        let amount = quarter + fine_amount(&mut rng, constants::MAX_DECIMALS);
        let before = ledger.entry(id);

        match supply.check_credit(token, amount) {
            Ok(_) => {
                ledger.credit_token(id, token, amount).unwrap();
                supply.record_credit(token, amount).unwrap();
            }
            Err(OgleError::InvalidAmount { .. }) => assert_eq!(ledger.entry(id), before),
            Err(other) => panic!("unexpected error: {other}"),
        }
        assert!(supply.total_credited(token) <= constants::MAX_SUPPLY);
        supply
            .verify(&pair, token, ledger.total_supply(token), Decimal::ZERO)
            .unwrap();
    }
    for token in Token::ALL {
        assert!(matches!(
            ledger.credit_token(&accounts[0], token, Decimal::MAX),
            Err(OgleError::InvalidAmount { .. })
        ));
    }
}

#[test]
fn reserve_then_release_is_identity() {
    let mut rng = StdRng::seed_from_u64(11);
    let mut ledger = BalanceLedger::new(TokenPair::default());
    let owner = AccountId::new("maker").unwrap();
    ledger
        .credit_token(&owner, Token::Base, Decimal::new(1_000, 0))
        .unwrap();
    ledger
        .credit_token(&owner, Token::Quote, Decimal::new(100_000, 0))
        .unwrap();
    let start = ledger.entry(&owner);

    for _ in 0..200 {
        let side = if rng.gen_bool(0.5) {
            OrderSide::Buy
        } else {
            OrderSide::Sell
        };
        let order = Order::dummy_limit_for(
            owner.clone(),
            side,
            Decimal::new(rng.gen_range(1..=200), 1),
            Decimal::new(rng.gen_range(1..=100), 1),
        );
        let reservation = funding::reserve(&mut ledger, &order).unwrap();
        assert_eq!(reservation.token, side.reserved_token());
        let released = funding::release(&mut ledger, &order).unwrap().unwrap();
        assert_eq!(released, reservation);
        assert_eq!(ledger.entry(&owner), start);
    }
}
