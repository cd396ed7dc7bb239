//! Startup recovery: latest snapshot, then the journal records after it.

use ogle_types::{MarketConfig, OgleError, Result};

use crate::market::Market;
use crate::store::MarketStore;

/// A market rebuilt from storage.
#[derive(Debug)]
pub struct Recovered {
    pub market: Market,
    /// Sequence of the last applied journal record (0 for a fresh store).
    pub last_sequence: u64,
    /// Journal records applied on top of the snapshot.
    pub replayed: usize,
}

/// Rebuild the market from `store`.
///
/// Records already covered by the snapshot are skipped. The remaining ones
/// must continue the sequence without a gap and must apply cleanly. Only
/// successful changes are journaled, so one that fails on replay means the
/// journal and the snapshot disagree.
///
/// # Errors
/// `SnapshotCorrupted`, `JournalCorrupted`, or a store I/O error.
pub fn recover<S: MarketStore + ?Sized>(config: &MarketConfig, store: &mut S) -> Result<Recovered> {
    let (mut market, mut last_sequence) = match store.load_snapshot()? {
        Some(state) => {
            let last = state.last_sequence;
            (Market::from_state(config, state)?, last)
        }
        None => (Market::new(config), 0),
    };
    let snapshot_sequence = last_sequence;

    let mut replayed = 0;
    for (idx, record) in store.load_journal()?.into_iter().enumerate() {
        if record.sequence <= last_sequence {
            continue;
        }
        let line = idx + 1;
        if record.sequence != last_sequence + 1 {
            return Err(OgleError::JournalCorrupted {
                line,
                reason: format!(
                    "expected sequence {}, found {}",
                    last_sequence + 1,
                    record.sequence
                ),
            });
        }
        market
            .apply(&record.change)
            .map_err(|err| OgleError::JournalCorrupted {
                line,
                reason: format!("replay of sequence {} failed: {err}", record.sequence),
            })?;
        last_sequence = record.sequence;
        replayed += 1;
    }

    market.verify_supply()?;

    tracing::info!(
        snapshot_sequence,
        last_sequence,
        replayed,
        accounts = market.registry().len(),
        open_orders = market.book().order_count(),
        "Market recovered"
    );

    Ok(Recovered {
        market,
        last_sequence,
        replayed,
    })
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::journal::JournalRecord;
    use crate::market::Change;
    use crate::store::MemoryStore;

    fn config() -> MarketConfig {
        MarketConfig::default()
    }

    #[test]
    fn fresh_store_yields_empty_market() {
        let mut store = MemoryStore::new();
        let recovered = recover(&config(), &mut store).unwrap();
        assert_eq!(recovered.last_sequence, 0);
        assert_eq!(recovered.replayed, 0);
        assert!(recovered.market.registry().is_empty());
    }

    #[test]
    fn replays_records_after_snapshot() {
        let mut store = MemoryStore::new();
        let mut market = Market::new(&config());
        let first = Change::register("alice").unwrap();
        market.apply(&first).unwrap();
        store.save_snapshot(&market.to_state(1)).unwrap();

        store.append(&JournalRecord::seal(1, first).unwrap()).unwrap();
        let credit = Change::credit("alice", "GCR", Decimal::new(5, 0)).unwrap();
        store.append(&JournalRecord::seal(2, credit).unwrap()).unwrap();

        let recovered = recover(&config(), &mut store).unwrap();
        assert_eq!(recovered.last_sequence, 2);
        assert_eq!(recovered.replayed, 1);
        assert_eq!(
            recovered.market.balances("alice").unwrap()["GCR"],
            Decimal::new(5, 0)
        );
    }

    #[test]
    fn gap_after_snapshot_is_corruption() {
        let mut store = MemoryStore::new();
        let change = Change::register("alice").unwrap();
        store.append(&JournalRecord::seal(2, change).unwrap()).unwrap();
        assert!(matches!(
            recover(&config(), &mut store).unwrap_err(),
            OgleError::JournalCorrupted { line: 1, .. }
        ));
    }

    #[test]
    fn record_that_no_longer_applies_is_corruption() {
        let mut store = MemoryStore::new();
        let change = Change::credit("alice", "BTC", Decimal::ONE).unwrap();
        store.append(&JournalRecord::seal(1, change).unwrap()).unwrap();
        assert!(matches!(
            recover(&config(), &mut store).unwrap_err(),
            OgleError::JournalCorrupted { .. }
        ));
    }
}
