//! WAL Replay
//!
//! Rebuilds storage state from replayed records.

use crate::error::Result;
use crate::storage::StorageBackend;
use super::WalRecord;

/// Result of a replay
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReplayStats {
    /// Records applied
    pub records_replayed: u64,

    /// SET records among them
    pub sets: u64,

    /// DELETE records among them
    pub deletes: u64,

    /// Keys live in storage afterwards
    pub live_keys: usize,
}

/// Apply records to storage in order
///
/// Sequential application gives last-writer-wins per key, and a later
/// DELETE removes any earlier SET of the same key.
pub fn apply_records<S, I>(storage: &mut S, records: I) -> Result<ReplayStats>
where
    S: StorageBackend + ?Sized,
    I: IntoIterator<Item = WalRecord>,
{
    let mut stats = ReplayStats::default();

    for record in records {
        match record {
            WalRecord::Set { key, value } => {
                storage.set(key, value)?;
                stats.sets += 1;
            }
            WalRecord::Delete { key } => {
                storage.delete(&key)?;
                stats.deletes += 1;
            }
        }
        stats.records_replayed += 1;
    }

    stats.live_keys = storage.len();
    Ok(stats)
}
