//! Error types for the OGLE market core.
//!
//! All errors use the `OGLE_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Account / order errors
//! - 2xx: Balance errors
//! - 6xx: Persistence errors
//! - 7xx: Service errors
//! - 9xx: General / internal errors

use rust_decimal::Decimal;
use thiserror::Error;

use crate::{AccountId, OrderId};

/// Central error enum for all market operations.
#[derive(Debug, Error)]
pub enum OgleError {
    // =================================================================
    // Account / Order Errors (1xx)
    // =================================================================
    /// The account identifier is malformed (empty, whitespace only).
    #[error("OGLE_ERR_100: Invalid account: {reason}")]
    InvalidAccount { reason: String },

    /// The account has never been registered.
    #[error("OGLE_ERR_101: Unknown account: {0}")]
    UnknownAccount(AccountId),

    /// The order side tag is neither buy nor sell.
    #[error("OGLE_ERR_102: Invalid side: {0:?} (expected \"buy\" or \"sell\")")]
    InvalidSide(String),

    /// The order failed validation (non-positive price or quantity).
    #[error("OGLE_ERR_103: Invalid order: {reason}")]
    InvalidOrder { reason: String },

    /// An order with this id is already resting in the book.
    #[error("OGLE_ERR_104: Order already exists: {0}")]
    DuplicateOrder(OrderId),

    // =================================================================
    // Balance Errors (2xx)
    // =================================================================
    /// The token symbol is not one of the two supported tokens.
    #[error("OGLE_ERR_200: Unsupported token: {0}")]
    UnsupportedToken(String),

    /// Amounts must be positive and within ledger precision and supply.
    #[error("OGLE_ERR_201: Invalid amount: {amount} (must be > 0, within precision and supply limits)")]
    InvalidAmount { amount: Decimal },

    /// Not enough balance to perform the debit.
    #[error("OGLE_ERR_202: Insufficient funds: need {needed} {token}, have {available}")]
    InsufficientFunds {
        token: String,
        needed: Decimal,
        available: Decimal,
    },

    /// Supply conservation invariant violated.
    #[error("OGLE_ERR_203: Supply invariant violation: {reason}")]
    SupplyInvariantViolation { reason: String },

    // =================================================================
    // Persistence Errors (6xx)
    // =================================================================
    /// A journal record failed its checksum or sequence check.
    #[error("OGLE_ERR_600: Journal corrupted at line {line}: {reason}")]
    JournalCorrupted { line: usize, reason: String },

    /// The snapshot document failed its integrity check.
    #[error("OGLE_ERR_601: Snapshot corrupted: {reason}")]
    SnapshotCorrupted { reason: String },

    // =================================================================
    // Service Errors (7xx)
    // =================================================================
    /// The market task is gone (shut down or panicked).
    #[error("OGLE_ERR_700: Market service unavailable")]
    ServiceUnavailable,

    /// The market task stopped accepting commands after a durability failure.
    #[error("OGLE_ERR_701: Market service halted: {reason}")]
    ServiceHalted { reason: String },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("OGLE_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("OGLE_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (invalid config file, bad values).
    #[error("OGLE_ERR_902: Configuration error: {0}")]
    Configuration(String),

    /// I/O error (disk).
    #[error("OGLE_ERR_903: I/O error: {0}")]
    Io(String),
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, OgleError>;

impl From<std::io::Error> for OgleError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for OgleError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
