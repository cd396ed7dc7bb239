//! System-wide constants for the market core.

use rust_decimal::Decimal;

/// Default base token symbol ("Gravity Credits").
pub const DEFAULT_BASE_TOKEN: &str = "GCR";

/// Default quote token symbol ("OGLE Coins").
pub const DEFAULT_QUOTE_TOKEN: &str = "OGLEC";

/// Remaining quantity at or below which an order counts as filled (1e-9).
pub const DEFAULT_DUST_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 9);

/// Most decimal places accepted on a price, quantity or amount. Quote
/// proceeds and reservations are rounded to the same precision.
pub const MAX_DECIMALS: u32 = 12;

/// Ceiling on the total credited per token (1e16). Every balance,
/// reservation and retained amount stays below it, so sums at
/// `MAX_DECIMALS` places fit a `Decimal` exactly.
pub const MAX_SUPPLY: Decimal = Decimal::from_parts(1_874_919_424, 2_328_306, 0, false, 0);

/// Highest accepted limit price (1e12).
pub const MAX_PRICE: Decimal = Decimal::from_parts(3_567_587_328, 232, 0, false, 0);

/// Journal records between automatic snapshots.
pub const DEFAULT_SNAPSHOT_INTERVAL: u64 = 1_000;

/// Capacity of the market service command queue.
pub const DEFAULT_COMMAND_BUFFER: usize = 1_024;

/// Default data directory for the file store.
pub const DEFAULT_DATA_DIR: &str = "data";

/// Journal file name inside the data directory.
pub const JOURNAL_FILE: &str = "journal.log";

/// Combined snapshot file name inside the data directory.
pub const SNAPSHOT_FILE: &str = "snapshot.json";

/// Exported read-only documents.
pub const BALANCES_FILE: &str = "balances.json";
pub const ORDERBOOK_FILE: &str = "orderbook.json";
pub const USERS_FILE: &str = "users.json";

/// Snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 2;

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
