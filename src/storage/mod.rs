//! Storage Module
//!
//! The authoritative key → value mapping.
//!
//! ## Responsibilities
//! - Answer reads from memory
//! - Apply sets and deletes (delete of an absent key is a no-op)
//! - Hand out consistent snapshots for diagnostics and tests
//!
//! Backends do no locking and no persistence of their own. The engine wraps
//! the backend in a `RwLock` and pairs every mutation with a WAL append.

mod memory;

use std::collections::BTreeMap;

use crate::error::Result;

pub use memory::MemoryStorage;

/// Capability set every storage backend provides
pub trait StorageBackend: Send + Sync {
    /// Fetch the value for `key`, or `KeyNotFound`
    fn get(&self, key: &[u8]) -> Result<Vec<u8>>;

    /// Insert or overwrite `key`
    fn set(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<()>;

    /// Remove `key`; succeeds when the key is absent
    fn delete(&mut self, key: &[u8]) -> Result<()>;

    /// Number of live keys
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of every live entry, ordered by key
    fn snapshot(&self) -> BTreeMap<Vec<u8>, Vec<u8>>;
}
