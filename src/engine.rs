//! Engine Module
//!
//! Pairs one storage backend with one write-ahead log.
//!
//! ## Responsibilities
//! - Replay the WAL into fresh storage on startup
//! - Serialize mutations so each (log, apply) pair is atomic
//! - Serve concurrent reads that never see a half-applied mutation

use std::collections::BTreeMap;

use parking_lot::{Mutex, RwLock};

use crate::config::Config;
use crate::error::Result;
use crate::protocol::Command;
use crate::storage::{MemoryStorage, StorageBackend};
use crate::wal::{apply_records, ReplayStats, TextWal, WalRecord, WriteAheadLog};

/// The key-value engine
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Writes** (set/delete): serialized by the `wal` mutex
///   - Only ONE mutation at a time
///   - Order: wal lock → WAL append → storage write lock → apply
///   - The WAL mutex is held until the storage mutation is done, so the
///     order of records in the log is the order mutations were applied
///
/// - **Reads** (get): storage read lock only
///   - Many concurrent readers
///   - A reader sees storage either before or after a mutation
///
/// ## Ordering Contract: log before apply
/// A mutation is applied only after its record was handed to the WAL. If the
/// append fails, neither storage nor the log keeps any trace of it and the
/// error is returned.
pub struct Engine<S = MemoryStorage, W = TextWal> {
    /// Authoritative key → value mapping
    storage: RwLock<S>,

    /// Write-ahead log; its mutex is the writer lock
    wal: Mutex<W>,
}

impl Engine<MemoryStorage, TextWal> {
    /// Open the WAL named by `config` and replay it into fresh storage
    ///
    /// On startup:
    /// 1. Validate configuration
    /// 2. Open/create the WAL file (append mode)
    /// 3. Replay every record into empty in-memory storage
    /// 4. Ready to serve requests
    ///
    /// A WAL that cannot be opened or does not parse is fatal.
    pub fn open(config: &Config) -> Result<Self> {
        config.validate()?;

        let wal = TextWal::open(&config.log_file_path, config.wal_sync_strategy)?;
        let (engine, stats) = Self::recover(MemoryStorage::new(), wal)?;

        tracing::info!(
            "WAL replay: {} records ({} sets, {} deletes), {} live keys",
            stats.records_replayed,
            stats.sets,
            stats.deletes,
            stats.live_keys
        );

        Ok(engine)
    }
}

impl<S: StorageBackend, W: WriteAheadLog> Engine<S, W> {
    /// Wrap storage and WAL without replaying anything
    pub fn new(storage: S, wal: W) -> Self {
        Self {
            storage: RwLock::new(storage),
            wal: Mutex::new(wal),
        }
    }

    /// Replay `wal` into `storage`, then wrap both
    pub fn recover(mut storage: S, mut wal: W) -> Result<(Self, ReplayStats)> {
        let records = wal.replay()?;
        let stats = apply_records(&mut storage, records)?;
        Ok((Self::new(storage, wal), stats))
    }

    /// Execute a command
    ///
    /// Returns the value for GET, `None` for mutations.
    pub fn execute(&self, command: &Command) -> Result<Option<Vec<u8>>> {
        match WalRecord::from_command(command) {
            Some(record) => self.commit(record).map(|()| None),
            None => self.get(command.key()).map(Some),
        }
    }

    /// Get a value by key (`KeyNotFound` on a miss)
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        self.storage.read().get(key)
    }

    /// Set a key-value pair
    pub fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.commit(WalRecord::Set {
            key: key.to_vec(),
            value: value.to_vec(),
        })
    }

    /// Delete a key (absent keys are fine, and still logged)
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        self.commit(WalRecord::Delete { key: key.to_vec() })
    }

    /// Log a mutation, then apply it
    ///
    /// Steps:
    /// 1. Acquire the writer lock
    /// 2. Append the record to the WAL
    /// 3. Apply to storage
    fn commit(&self, record: WalRecord) -> Result<()> {
        let mut wal = self.wal.lock();
        wal.append(&record)?;

        let mut storage = self.storage.write();
        match record {
            WalRecord::Set { key, value } => storage.set(key, value),
            WalRecord::Delete { key } => storage.delete(&key),
        }
    }

    /// Consistent copy of every live entry
    pub fn snapshot(&self) -> BTreeMap<Vec<u8>, Vec<u8>> {
        self.storage.read().snapshot()
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        self.storage.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Close the WAL; later mutations fail
    pub fn close(&self) -> Result<()> {
        self.wal.lock().close()
    }

    /// Run `f` with exclusive access to the WAL (writer lock held)
    pub fn with_wal<T>(&self, f: impl FnOnce(&mut W) -> T) -> T {
        f(&mut self.wal.lock())
    }
}
