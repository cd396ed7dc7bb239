//! Configuration for a market instance.

use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{OgleError, Result, TokenPair, constants};

/// Configuration for one market (one trading pair).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    /// Base token symbol (what is bought and sold).
    pub base_token: String,
    /// Quote token symbol (what prices are expressed in).
    pub quote_token: String,
    /// Remaining quantity at or below which an order is considered filled.
    pub dust_tolerance: Decimal,
    /// Directory holding the journal, snapshot and exported documents.
    pub data_dir: PathBuf,
    /// Journal records between automatic snapshots (0 disables them).
    pub snapshot_interval: u64,
    /// Capacity of the service command queue.
    pub command_buffer: usize,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            base_token: constants::DEFAULT_BASE_TOKEN.to_string(),
            quote_token: constants::DEFAULT_QUOTE_TOKEN.to_string(),
            dust_tolerance: constants::DEFAULT_DUST_TOLERANCE,
            data_dir: PathBuf::from(constants::DEFAULT_DATA_DIR),
            snapshot_interval: constants::DEFAULT_SNAPSHOT_INTERVAL,
            command_buffer: constants::DEFAULT_COMMAND_BUFFER,
        }
    }
}

impl MarketConfig {
    /// Load from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            OgleError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        let cfg: Self = serde_json::from_str(&raw).map_err(|e| {
            OgleError::Configuration(format!("cannot parse {}: {e}", path.display()))
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check the values are usable.
    pub fn validate(&self) -> Result<()> {
        if self.base_token.trim().is_empty() || self.quote_token.trim().is_empty() {
            return Err(OgleError::Configuration(
                "token symbols must not be empty".into(),
            ));
        }
        if self.base_token == self.quote_token {
            return Err(OgleError::Configuration(format!(
                "base and quote token must differ, both are {}",
                self.base_token
            )));
        }
        if self.dust_tolerance <= Decimal::ZERO {
            return Err(OgleError::Configuration(format!(
                "dust_tolerance must be > 0, got {}",
                self.dust_tolerance
            )));
        }
        if self.command_buffer == 0 {
            return Err(OgleError::Configuration(
                "command_buffer must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// The traded pair.
    #[must_use]
    pub fn pair(&self) -> TokenPair {
        TokenPair::new(&self.base_token, &self.quote_token)
    }

    /// Same config rooted at another data directory.
    #[must_use]
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }
}
