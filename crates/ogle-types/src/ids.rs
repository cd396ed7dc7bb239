//! Identifiers used throughout the market core.
//!
//! Accounts are named by the caller (a username). Orders use UUIDv7 for
//! time-ordered uniqueness; trade ids are derived from the market's fill
//! sequence so a replayed journal reproduces them exactly.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{OgleError, Result};

// ---------------------------------------------------------------------------
// AccountId
// ---------------------------------------------------------------------------

/// Caller-chosen account identifier (e.g., a username).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    /// Validate and wrap an account identifier.
    ///
    /// # Errors
    /// Returns `InvalidAccount` if the identifier is empty or only whitespace.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(OgleError::InvalidAccount {
                reason: "account id must not be empty".into(),
            });
        }
        Ok(Self(id))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for AccountId {
    type Err = OgleError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

// ---------------------------------------------------------------------------
// OrderId
// ---------------------------------------------------------------------------

/// Globally unique order identifier. Uses UUIDv7 for time-ordered sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct OrderId(pub Uuid);

impl OrderId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    #[must_use]
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ord_{}", self.0.simple())
    }
}

// ---------------------------------------------------------------------------
// TradeId
// ---------------------------------------------------------------------------

/// Trade identifier, deterministic in the market's fill sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct TradeId(pub Uuid);

impl TradeId {
    /// Deterministic `TradeId` from the market-wide fill sequence.
    ///
    /// Replaying the same journal yields the same ids.
    #[must_use]
    pub fn deterministic(fill_sequence: u64) -> Self {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(b"ogle:trade_id:v1:");
        hasher.update(fill_sequence.to_le_bytes());
        let hash = hasher.finalize();
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&hash[..16]);
        Self(Uuid::from_bytes(bytes))
    }
}

impl fmt::Display for TradeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "trd_{}", self.0.simple())
    }
}
