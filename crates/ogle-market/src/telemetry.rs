//! Tracing setup for binaries and tests that embed the market.

use ogle_types::{OgleError, Result};
use tracing_subscriber::EnvFilter;

/// Install a global `tracing` subscriber.
///
/// The filter comes from `RUST_LOG` and defaults to `info`. With `json` set,
/// events are written as one JSON object per line.
///
/// # Errors
/// `Configuration` if a global subscriber is already installed.
pub fn init_tracing(json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| OgleError::Configuration(format!("tracing subscriber: {e}")))
}
