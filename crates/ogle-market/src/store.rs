//! Durable storage for the market.
//!
//! [`MarketStore`] is the seam between the market service and the disk.
//! [`FileStore`] keeps everything in one directory:
//!
//! ```text
//! <data_dir>/journal.log      append-only change journal
//! <data_dir>/snapshot.json    latest combined snapshot
//! <data_dir>/balances.json    \
//! <data_dir>/orderbook.json    > exported documents (read-only consumers)
//! <data_dir>/users.json       /
//! ```
//!
//! [`MemoryStore`] keeps the same data in memory and can be told to fail
//! appends.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ogle_types::{MarketConfig, OgleError, Result, constants};

use crate::journal::{self, JournalRecord};
use crate::snapshot::{self, Documents, MarketState, SnapshotDocument};

/// Storage used by the market service.
pub trait MarketStore: Send + 'static {
    /// Latest snapshot, verified, or `None` if there is none yet.
    fn load_snapshot(&mut self) -> Result<Option<MarketState>>;

    fn save_snapshot(&mut self, state: &MarketState) -> Result<()>;

    /// Intact journal records in sequence order.
    fn load_journal(&mut self) -> Result<Vec<JournalRecord>>;

    /// Durably append one record.
    fn append(&mut self, record: &JournalRecord) -> Result<()>;

    /// Drop every record with `sequence <= through`.
    fn compact_journal(&mut self, through: u64) -> Result<()>;

    fn export_documents(&mut self, documents: &Documents) -> Result<()>;
}

// ---------------------------------------------------------------------------
// FileStore
// ---------------------------------------------------------------------------

/// Directory-backed store.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    journal: Option<File>,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, journal: None })
    }

    /// Open the store at `config.data_dir`.
    pub fn for_config(config: &MarketConfig) -> Result<Self> {
        Self::open(&config.data_dir)
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    fn journal_file(&mut self) -> Result<&mut File> {
        if self.journal.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(self.path(constants::JOURNAL_FILE))?;
            self.journal = Some(file);
        }
        self.journal
            .as_mut()
            .ok_or_else(|| OgleError::Internal("journal handle missing".into()))
    }

    fn read_journal(&self) -> Result<Option<String>> {
        match fs::read_to_string(self.path(constants::JOURNAL_FILE)) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write_json<T: serde::Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        snapshot::write_atomic(&self.path(name), &bytes)
    }
}

impl MarketStore for FileStore {
    fn load_snapshot(&mut self) -> Result<Option<MarketState>> {
        let path = self.path(constants::SNAPSHOT_FILE);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let document: SnapshotDocument =
            serde_json::from_slice(&bytes).map_err(|e| OgleError::SnapshotCorrupted {
                reason: format!("{}: {e}", path.display()),
            })?;
        document.open().map(Some)
    }

    fn save_snapshot(&mut self, state: &MarketState) -> Result<()> {
        let document = SnapshotDocument::seal(state.clone())?;
        self.write_json(constants::SNAPSHOT_FILE, &document)
    }

    fn load_journal(&mut self) -> Result<Vec<JournalRecord>> {
        let Some(text) = self.read_journal()? else {
            return Ok(Vec::new());
        };
        let contents = journal::parse(&text)?;
        if contents.torn_tail {
            // Cut the torn bytes so later appends start on a clean line.
            self.journal = None;
            let file = OpenOptions::new()
                .write(true)
                .open(self.path(constants::JOURNAL_FILE))?;
            file.set_len(contents.intact_len as u64)?;
            file.sync_all()?;
        }
        Ok(contents.records)
    }

    fn append(&mut self, record: &JournalRecord) -> Result<()> {
        let line = record.to_line()?;
        let file = self.journal_file()?;
        file.write_all(line.as_bytes())?;
        file.sync_data()?;
        Ok(())
    }

    fn compact_journal(&mut self, through: u64) -> Result<()> {
        let Some(text) = self.read_journal()? else {
            return Ok(());
        };
        let kept: Vec<JournalRecord> = journal::parse(&text)?
            .records
            .into_iter()
            .filter(|r| r.sequence > through)
            .collect();
        let mut rewritten = String::new();
        for record in &kept {
            rewritten.push_str(&record.to_line()?);
        }

        self.journal = None;
        snapshot::write_atomic(&self.path(constants::JOURNAL_FILE), rewritten.as_bytes())?;
        tracing::debug!(through, kept = kept.len(), "Journal compacted");
        Ok(())
    }

    fn export_documents(&mut self, documents: &Documents) -> Result<()> {
        self.write_json(constants::BALANCES_FILE, &documents.balances)?;
        self.write_json(constants::ORDERBOOK_FILE, &documents.orderbook)?;
        self.write_json(constants::USERS_FILE, &documents.users)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct MemoryInner {
    snapshot: Option<MarketState>,
    journal: Vec<JournalRecord>,
    exported: Option<Documents>,
    fail_appends: bool,
}

/// In-memory store. Clones share the same contents, so a test can keep one
/// clone to inspect or to restart a service from.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every following append fail with an I/O error.
    pub fn fail_appends(&self, fail: bool) {
        self.lock().fail_appends = fail;
    }

    #[must_use]
    pub fn journal(&self) -> Vec<JournalRecord> {
        self.lock().journal.clone()
    }

    #[must_use]
    pub fn snapshot(&self) -> Option<MarketState> {
        self.lock().snapshot.clone()
    }

    #[must_use]
    pub fn exported(&self) -> Option<Documents> {
        self.lock().exported.clone()
    }
}

impl MarketStore for MemoryStore {
    fn load_snapshot(&mut self) -> Result<Option<MarketState>> {
        Ok(self.lock().snapshot.clone())
    }

    fn save_snapshot(&mut self, state: &MarketState) -> Result<()> {
        self.lock().snapshot = Some(state.clone());
        Ok(())
    }

    fn load_journal(&mut self) -> Result<Vec<JournalRecord>> {
        Ok(self.lock().journal.clone())
    }

    fn append(&mut self, record: &JournalRecord) -> Result<()> {
        let mut inner = self.lock();
        if inner.fail_appends {
            return Err(OgleError::Io("injected append failure".into()));
        }
        inner.journal.push(record.clone());
        Ok(())
    }

    fn compact_journal(&mut self, through: u64) -> Result<()> {
        self.lock().journal.retain(|r| r.sequence > through);
        Ok(())
    }

    fn export_documents(&mut self, documents: &Documents) -> Result<()> {
        self.lock().exported = Some(documents.clone());
        Ok(())
    }
}
