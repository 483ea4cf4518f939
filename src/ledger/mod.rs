use std::cell::RefCell;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// History entries older than this are dropped on the next read.
pub const RETENTION_WINDOW_MS: i64 = 7 * 24 * 60 * 60 * 1000;

const LEDGER_TMP_EXTENSION: &str = "json.tmp";

/// A device-local pointer to a message the user published, wire-compatible
/// with the browser build's `{id, savedAt}` records. Extra fields in
/// persisted data are ignored on read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    #[serde(rename = "savedAt")]
    pub saved_at: i64,
}

/// Storage port for the single persisted ledger value. Implementations
/// must not fail loudly: a missing or unwritable backing store degrades to
/// "history not recorded", never an error on the caller's path.
pub trait LedgerStore {
    fn get(&self) -> Option<String>;
    fn set(&self, raw: &str);
}

/// Ledger persisted as one JSON file under the data directory.
#[derive(Debug, Clone)]
pub struct FileLedgerStore {
    path: PathBuf,
}

impl FileLedgerStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LedgerStore for FileLedgerStore {
    fn get(&self) -> Option<String> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => Some(raw),
            Err(err) if err.kind() == io::ErrorKind::NotFound => None,
            Err(err) => {
                tracing::warn!(?err, path = %self.path.display(), "failed to read history ledger");
                None
            }
        }
    }

    fn set(&self, raw: &str) {
        if let Some(parent) = self.path.parent() {
            if let Err(err) = fs::create_dir_all(parent) {
                tracing::warn!(?err, "failed to create ledger directory");
                return;
            }
        }
        let tmp_path = self.path.with_extension(LEDGER_TMP_EXTENSION);
        if let Err(err) = fs::write(&tmp_path, raw) {
            tracing::warn!(?err, path = %tmp_path.display(), "failed to write history ledger");
            return;
        }
        if let Err(err) = fs::rename(&tmp_path, &self.path) {
            tracing::warn!(?err, path = %self.path.display(), "failed to persist history ledger");
        }
    }
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    value: RefCell<Option<String>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_raw(raw: &str) -> Self {
        Self {
            value: RefCell::new(Some(raw.to_string())),
        }
    }

    pub fn raw(&self) -> Option<String> {
        self.value.borrow().clone()
    }
}

impl LedgerStore for MemoryLedgerStore {
    fn get(&self) -> Option<String> {
        self.value.borrow().clone()
    }

    fn set(&self, raw: &str) {
        *self.value.borrow_mut() = Some(raw.to_string());
    }
}

/// Append log of sent-message ids with a fixed retention window. New
/// entries are prepended; expiry is discovered lazily on read and pruned
/// from the backing store as a side effect, never on a schedule.
pub struct HistoryLedger<S> {
    store: S,
}

impl<S: LedgerStore> HistoryLedger<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Record a freshly published message id at the head of the ledger.
    /// Storage failures are swallowed; the caller's flow never aborts.
    pub fn append(&self, id: &str) {
        if id.is_empty() {
            tracing::warn!("refusing to record empty message id in history");
            return;
        }
        let mut entries = self.read_entries();
        entries.insert(
            0,
            HistoryEntry {
                id: id.to_string(),
                saved_at: now_ms(),
            },
        );
        self.write_entries(&entries);
    }

    /// Return the non-expired entries in insertion order (newest first)
    /// and rewrite the backing store with only the survivors.
    pub fn list_active(&self) -> Vec<HistoryEntry> {
        let entries = self.read_entries();
        let now = now_ms();
        let valid: Vec<HistoryEntry> = entries
            .into_iter()
            .filter(|entry| now - entry.saved_at < RETENTION_WINDOW_MS)
            .collect();
        self.write_entries(&valid);
        valid
    }

    fn read_entries(&self) -> Vec<HistoryEntry> {
        let Some(raw) = self.store.get() else {
            return Vec::new();
        };
        match serde_json::from_str(&raw) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!(?err, "history ledger unparsable, treating as empty");
                Vec::new()
            }
        }
    }

    fn write_entries(&self, entries: &[HistoryEntry]) {
        match serde_json::to_string(entries) {
            Ok(raw) => self.store.set(&raw),
            Err(err) => tracing::warn!(?err, "failed to encode history ledger"),
        }
    }
}

pub fn now_ms() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}
