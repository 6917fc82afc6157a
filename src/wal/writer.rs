//! WAL Writer
//!
//! Append-only text log backed by a single file.

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::config::WalSyncStrategy;
use crate::error::{KvdbError, Result};
use super::record::{encode_delete, encode_set};
use super::{WalReader, WalRecord, WriteAheadLog};

/// Text WAL that appends records to one file
///
/// The file is opened in append mode, so writes always land at the end no
/// matter where replay left the read cursor.
///
/// A record that fails to write or sync is truncated away again, so the file
/// only ever holds whole records. If that truncation fails too, the log is
/// marked failed and refuses every later append.
pub struct TextWal {
    path: PathBuf,

    /// `None` once closed
    file: Option<File>,

    /// File length after the last whole record
    end: u64,

    /// Set when a failed record could not be removed
    failed: bool,

    sync_strategy: WalSyncStrategy,

    /// Records written since the last fsync
    unsynced: usize,

    /// Records appended through this handle
    records_written: u64,
}

impl TextWal {
    /// Open or create a WAL file
    pub fn open(path: &Path, sync_strategy: WalSyncStrategy) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(path)
            .map_err(|source| KvdbError::WalOpen {
                path: path.to_path_buf(),
                source,
            })?;
        let end = file
            .metadata()
            .map_err(|source| KvdbError::WalOpen {
                path: path.to_path_buf(),
                source,
            })?
            .len();

        tracing::debug!("Opened WAL at {} ({:?})", path.display(), sync_strategy);

        Ok(Self {
            path: path.to_path_buf(),
            file: Some(file),
            end,
            failed: false,
            sync_strategy,
            unsynced: 0,
            records_written: 0,
        })
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        if let Some(file) = &self.file {
            file.sync_data().map_err(KvdbError::WalWrite)?;
        }
        self.unsynced = 0;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    pub fn unsynced_entries(&self) -> usize {
        self.unsynced
    }

    pub fn is_closed(&self) -> bool {
        self.file.is_none()
    }

    /// True once a failed record could not be rolled back
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    fn write_record(&mut self, bytes: &[u8]) -> Result<()> {
        if self.failed {
            return Err(KvdbError::WalFailed);
        }
        let file = self.file.as_mut().ok_or(KvdbError::WalClosed)?;

        let sync_now = match self.sync_strategy {
            WalSyncStrategy::OsBuffer => false,
            WalSyncStrategy::EveryWrite => true,
            WalSyncStrategy::EveryNEntries { count } => self.unsynced + 1 >= count,
        };

        match append_whole(file, self.end, bytes, sync_now) {
            Ok(()) => {
                self.end += bytes.len() as u64;
                self.records_written += 1;
                self.unsynced = if sync_now { 0 } else { self.unsynced + 1 };
                Ok(())
            }
            Err(AppendFailure::RolledBack(e)) => {
                tracing::warn!("WAL append to {} failed and was rolled back: {}", self.path.display(), e);
                Err(KvdbError::WalWrite(e))
            }
            Err(AppendFailure::Stranded { cause, rollback }) => {
                self.failed = true;
                tracing::error!(
                    "WAL append to {} failed ({}) and the partial record could not be removed ({}); refusing further writes",
                    self.path.display(),
                    cause,
                    rollback
                );
                Err(KvdbError::WalWrite(cause))
            }
        }
    }
}

/// File operations the append path relies on
pub(crate) trait LogFile: Write {
    fn sync_data(&mut self) -> io::Result<()>;

    fn set_len(&mut self, len: u64) -> io::Result<()>;
}

impl LogFile for File {
    fn sync_data(&mut self) -> io::Result<()> {
        File::sync_data(self)
    }

    fn set_len(&mut self, len: u64) -> io::Result<()> {
        File::set_len(self, len)
    }
}

#[derive(Debug)]
pub(crate) enum AppendFailure {
    /// The file is back at its previous length
    RolledBack(io::Error),

    /// Part of the record may still be in the file
    Stranded { cause: io::Error, rollback: io::Error },
}

/// Write `bytes` at the end of a file currently `end` bytes long
///
/// On a write or sync error the file is cut back to `end`.
pub(crate) fn append_whole<F: LogFile>(
    file: &mut F,
    end: u64,
    bytes: &[u8],
    sync: bool,
) -> std::result::Result<(), AppendFailure> {
    let written = file.write_all(bytes).and_then(|()| {
        if sync {
            file.sync_data()
        } else {
            Ok(())
        }
    });

    match written {
        Ok(()) => Ok(()),
        Err(cause) => match file.set_len(end) {
            Ok(()) => Err(AppendFailure::RolledBack(cause)),
            Err(rollback) => Err(AppendFailure::Stranded { cause, rollback }),
        },
    }
}

impl WriteAheadLog for TextWal {
    fn log_set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.write_record(&encode_set(key, value))
    }

    fn log_delete(&mut self, key: &[u8]) -> Result<()> {
        self.write_record(&encode_delete(key))
    }

    fn replay(&mut self) -> Result<Vec<WalRecord>> {
        let file = self.file.as_ref().ok_or(KvdbError::WalClosed)?;
        let mut read_handle = file.try_clone()?;
        read_handle.seek(SeekFrom::Start(0))?;

        WalReader::new(BufReader::new(read_handle)).read_all()
    }

    fn close(&mut self) -> Result<()> {
        if let Some(file) = self.file.take() {
            file.sync_all().map_err(KvdbError::WalWrite)?;
            tracing::debug!(
                "Closed WAL at {} after {} records",
                self.path.display(),
                self.records_written
            );
        }
        self.unsynced = 0;
        Ok(())
    }
}
