//! Snapshots and exported documents.
//!
//! A snapshot is one JSON document holding the whole market (users,
//! balances, order book, counters, retained surplus, placed order ids) plus the last journal
//! sequence it covers and a SHA-256 checksum over the state.
//!
//! Every file here is written to a temporary sibling and renamed over the
//! target, so a reader sees either the old document or the new one.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use ogle_ledger::{BalancesDocument, SupplyConservation};
use ogle_matchcore::BookSnapshot;
use ogle_types::{AccountId, OgleError, OrderId, Result, TokenPair};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Full market state at a journal sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketState {
    pub version: u32,
    pub pair: TokenPair,
    pub users: Vec<AccountId>,
    pub balances: BalancesDocument,
    pub orderbook: BookSnapshot,
    pub next_order_sequence: u64,
    pub next_fill_sequence: u64,
    pub supply: SupplyConservation,
    /// Every order id ever accepted; ids are never reused.
    pub order_ids: BTreeSet<OrderId>,
    /// Last journal record folded into this state.
    pub last_sequence: u64,
}

impl MarketState {
    /// Hex SHA-256 of the canonical JSON encoding.
    pub fn checksum(&self) -> Result<String> {
        let bytes = serde_json::to_vec(self)?;
        Ok(hex::encode(Sha256::digest(&bytes)))
    }
}

/// The on-disk snapshot: state plus its checksum.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotDocument {
    pub checksum: String,
    pub state: MarketState,
}

impl SnapshotDocument {
    pub fn seal(state: MarketState) -> Result<Self> {
        Ok(Self {
            checksum: state.checksum()?,
            state,
        })
    }

    /// Verify the checksum and hand back the state.
    ///
    /// # Errors
    /// `SnapshotCorrupted` on checksum mismatch.
    pub fn open(self) -> Result<MarketState> {
        let actual = self.state.checksum()?;
        if actual != self.checksum {
            return Err(OgleError::SnapshotCorrupted {
                reason: format!("checksum mismatch: stored {}, computed {actual}", self.checksum),
            });
        }
        Ok(self.state)
    }
}

/// Documents exported for read-only consumers. Never read back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Documents {
    pub users: Vec<AccountId>,
    pub balances: BalancesDocument,
    pub orderbook: BookSnapshot,
}

/// Write `bytes` to `path` through a temporary file and an atomic rename.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = Path::new(&tmp);

    {
        let mut file = File::create(tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use ogle_types::{MarketConfig, constants};
    use rust_decimal::Decimal;

    use super::*;

    fn state() -> MarketState {
        let mut supply = SupplyConservation::new();
        supply
            .record_credit(ogle_types::Token::Quote, Decimal::new(10, 0))
            .unwrap();
        let mut balances = BalancesDocument::new();
        balances.insert(
            "alice".into(),
            [("GCR".to_string(), Decimal::ZERO), ("OGLEC".to_string(), Decimal::new(10, 0))]
                .into_iter()
                .collect(),
        );
        MarketState {
            version: constants::SNAPSHOT_VERSION,
            pair: MarketConfig::default().pair(),
            users: vec![AccountId::new("alice").unwrap()],
            balances,
            orderbook: BookSnapshot::default(),
            next_order_sequence: 0,
            next_fill_sequence: 0,
            supply,
            order_ids: BTreeSet::new(),
            last_sequence: 2,
        }
    }

    #[test]
    fn sealed_document_opens() {
        let doc = SnapshotDocument::seal(state()).unwrap();
        let json = serde_json::to_string_pretty(&doc).unwrap();
        let back: SnapshotDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(back.open().unwrap(), state());
    }

    #[test]
    fn tampered_document_is_rejected() {
        let mut doc = SnapshotDocument::seal(state()).unwrap();
        doc.state.last_sequence = 3;
        assert!(matches!(
            doc.open().unwrap_err(),
            OgleError::SnapshotCorrupted { .. }
        ));
    }

    #[test]
    fn write_atomic_replaces_and_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        write_atomic(&path, b"one").unwrap();
        write_atomic(&path, b"two").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"two");
        assert!(!dir.path().join("doc.json.tmp").exists());
    }
}
