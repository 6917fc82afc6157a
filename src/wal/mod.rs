//! Write-Ahead Log (WAL) Module
//!
//! Provides durability through append-only logging.
//!
//! ## Responsibilities
//! - Append a record for every mutation, before the mutation is applied
//! - Replay every record, in file order, at startup
//! - Fail loudly on any damaged record (no partial recovery)
//!
//! ## File Format
//! Newline-delimited, with length-prefixed fields so that keys and values
//! may hold any byte, newlines included.
//! ```text
//! SET
//! <key_len> <key bytes>
//! <value_len> <value bytes>
//! DELETE
//! <key_len> <key bytes>
//! ```
//! Lengths are ASCII decimal. Each record goes to the OS in one write.

mod record;
mod writer;
mod reader;
mod replay;

use crate::error::Result;

pub use record::{WalRecord, SET_MARKER, DELETE_MARKER};
pub use writer::TextWal;
pub use reader::WalReader;
pub use replay::{apply_records, ReplayStats};

/// Capability set every WAL implementation provides
///
/// A failed `log_set`/`log_delete` leaves no trace of its record in the log.
pub trait WriteAheadLog: Send {
    /// Durably record a SET
    fn log_set(&mut self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Durably record a DELETE
    fn log_delete(&mut self, key: &[u8]) -> Result<()>;

    /// Record any mutation
    fn append(&mut self, record: &WalRecord) -> Result<()> {
        match record {
            WalRecord::Set { key, value } => self.log_set(key, value),
            WalRecord::Delete { key } => self.log_delete(key),
        }
    }

    /// Every record logged so far, oldest first
    fn replay(&mut self) -> Result<Vec<WalRecord>>;

    /// Flush and release the log; later appends fail
    fn close(&mut self) -> Result<()>;
}
