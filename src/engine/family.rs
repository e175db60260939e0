//! Column Family
//!
//! One independent LSM tree inside a store: its own WAL, memtable and
//! SSTables.
//!
//! ## Responsibilities
//! - Point get/put/delete on the family's keyspace
//! - Trigger flushes when the MemTable is full
//! - Crash recovery from the family WAL on open
//! - Refuse operations once closed or dropped

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::Result;
use crate::memtable::{MemTable, MemTableEntry};
use crate::storage::StorageManager;
use crate::wal::{Operation, WalRecovery, WalWriter};
use crate::KvdbError;

const STATE_OPEN: u8 = 0;
const STATE_CLOSED: u8 = 1;
const STATE_DROPPED: u8 = 2;

/// A column family
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Writes** (put/delete/flush/close/drop): serialized by `write_lock`,
///   which is also what makes the state check atomic with the write
/// - **Reads** (get): no write_lock; MemTable and StorageManager lock
///   internally
pub struct ColumnFamily {
    name: String,
    id: u64,
    dir: PathBuf,
    memtable_size_limit: usize,

    /// Write-ahead log (exclusive access needed)
    wal: Mutex<WalWriter>,

    memtable: MemTable,
    storage: StorageManager,

    write_lock: Mutex<()>,
    state: AtomicU8,
}

impl ColumnFamily {
    const WAL_FILENAME: &'static str = "wal.log";
    const SSTABLE_DIR: &'static str = "sstables";

    /// Open or create a family in `dir`
    ///
    /// On startup:
    /// 1. Open/create the family directory
    /// 2. Load existing SSTables
    /// 3. Recover the WAL, replay it and flush it into an SSTable
    /// 4. Truncate the WAL
    pub(crate) fn open(name: &str, id: u64, dir: &Path, config: &Config) -> Result<Self> {
        fs::create_dir_all(dir)?;

        let storage = StorageManager::open(&dir.join(Self::SSTABLE_DIR))?;
        let memtable = MemTable::new();
        let wal_path = dir.join(Self::WAL_FILENAME);

        let (entries, recovery) = WalRecovery::recover(&wal_path)?;
        if recovery.entries_recovered > 0 || recovery.entries_corrupted > 0 {
            info!(
                family = name,
                recovered = recovery.entries_recovered,
                corrupted = recovery.entries_corrupted,
                last_lsn = recovery.last_lsn,
                "WAL recovery"
            );
        }

        for entry in entries {
            match entry.operation {
                Operation::Put { key, value } => {
                    memtable.put(key, value);
                }
                Operation::Delete { key } => {
                    memtable.delete(key);
                }
            }
        }

        // Recovered data goes to an SSTable before the WAL is cut
        if !memtable.is_empty() {
            storage.flush(&memtable)?;
            memtable.clear();
        }

        let mut wal = WalWriter::open(&wal_path, config.wal_sync_strategy)?;
        if recovery.entries_recovered > 0 {
            wal.truncate()?;
        }

        debug!(family = name, id, dir = %dir.display(), "opened column family");

        Ok(Self {
            name: name.to_string(),
            id,
            dir: dir.to_path_buf(),
            memtable_size_limit: config.memtable_size_limit,
            wal: Mutex::new(wal),
            memtable,
            storage,
            write_lock: Mutex::new(()),
            state: AtomicU8::new(STATE_OPEN),
        })
    }

    /// Get a value by key
    ///
    /// Search order:
    /// 1. MemTable (most recent writes)
    /// 2. SSTables (newest to oldest)
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.ensure_open()?;

        if let Some(entry) = self.memtable.get(key) {
            return match entry {
                MemTableEntry::Value(value) => Ok(Some(value)),
                MemTableEntry::Tombstone => Ok(None),
            };
        }

        self.storage.get(key)
    }

    /// Put a key-value pair: WAL first, then MemTable
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.apply(Operation::Put {
            key: key.to_vec(),
            value: value.to_vec(),
        })
    }

    /// Delete a key (writes a tombstone)
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        self.apply(Operation::Delete { key: key.to_vec() })
    }

    fn apply(&self, operation: Operation) -> Result<()> {
        let _write_guard = self.write_lock.lock();
        self.ensure_open()?;

        self.wal.lock().append(operation.clone())?;

        let new_size = match operation {
            Operation::Put { key, value } => self.memtable.put(key, value),
            Operation::Delete { key } => self.memtable.delete(key),
        };

        if new_size >= self.memtable_size_limit {
            self.flush_internal()?;
        }

        Ok(())
    }

    /// Force a memtable flush regardless of its size
    pub fn flush(&self) -> Result<()> {
        let _write_guard = self.write_lock.lock();
        self.ensure_open()?;
        self.flush_internal()
    }

    /// Called with write lock held
    fn flush_internal(&self) -> Result<()> {
        if self.memtable.is_empty() {
            return Ok(());
        }

        self.storage.flush(&self.memtable)?;
        self.memtable.clear();
        self.wal.lock().truncate()?;

        Ok(())
    }

    /// Flush pending data, sync the WAL and refuse further operations
    ///
    /// Closing a closed or dropped family does nothing.
    pub(crate) fn close(&self) -> Result<()> {
        let _write_guard = self.write_lock.lock();
        if self.state.load(Ordering::SeqCst) != STATE_OPEN {
            return Ok(());
        }

        self.flush_internal()?;
        self.wal.lock().sync()?;
        self.state.store(STATE_CLOSED, Ordering::SeqCst);

        debug!(family = %self.name, "closed column family");
        Ok(())
    }

    /// Refuse further operations; waits for in-flight writes
    pub(crate) fn mark_dropped(&self) {
        let _write_guard = self.write_lock.lock();
        self.state.store(STATE_DROPPED, Ordering::SeqCst);
    }

    fn ensure_open(&self) -> Result<()> {
        match self.state.load(Ordering::SeqCst) {
            STATE_OPEN => Ok(()),
            STATE_DROPPED => Err(KvdbError::Storage(format!(
                "column family '{}' has been dropped",
                self.name
            ))),
            _ => Err(KvdbError::Storage(format!(
                "column family '{}' is closed",
                self.name
            ))),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn is_open(&self) -> bool {
        self.state.load(Ordering::SeqCst) == STATE_OPEN
    }

    pub fn is_dropped(&self) -> bool {
        self.state.load(Ordering::SeqCst) == STATE_DROPPED
    }

    pub fn memtable_size(&self) -> usize {
        self.memtable.size()
    }

    pub fn memtable_entry_count(&self) -> usize {
        self.memtable.entry_count()
    }

    pub fn sstable_count(&self) -> usize {
        self.storage.sstable_count()
    }
}

impl std::fmt::Debug for ColumnFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColumnFamily")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("state", &self.state.load(Ordering::SeqCst))
            .finish()
    }
}
