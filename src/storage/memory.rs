//! In-memory storage backend
//!
//! HashMap-based; synchronization is the caller's job.

use std::collections::{BTreeMap, HashMap};

use crate::error::{KvdbError, Result};
use super::StorageBackend;

/// Plain in-memory key/value map
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    data: HashMap<Vec<u8>, Vec<u8>>,
}

impl MemoryStorage {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryStorage {
    fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        self.data.get(key).cloned().ok_or(KvdbError::KeyNotFound)
    }

    fn set(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        self.data.insert(key, value);
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        self.data.remove(key);
        Ok(())
    }

    fn len(&self) -> usize {
        self.data.len()
    }

    fn snapshot(&self) -> BTreeMap<Vec<u8>, Vec<u8>> {
        self.data
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}
