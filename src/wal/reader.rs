//! WAL Reader
//!
//! Parses records sequentially from any buffered source.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

use crate::error::{KvdbError, Result};
use super::record::{DELETE_MARKER, SET_MARKER};
use super::WalRecord;

/// Longest marker line worth buffering before declaring it garbage
const MAX_MARKER_LINE: u64 = 64;

/// Enough digits for any `usize`, plus the separating space
const MAX_LENGTH_PREFIX: u64 = 21;

/// Reads records from a WAL
pub struct WalReader<R> {
    reader: R,

    /// Bytes consumed so far (for error messages)
    offset: u64,

    /// Complete records returned so far
    records_read: u64,

    /// Set after the first error; iteration stops there
    failed: bool,
}

impl WalReader<BufReader<File>> {
    /// Open a WAL file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> WalReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            offset: 0,
            records_read: 0,
            failed: false,
        }
    }

    /// Read the next record
    ///
    /// `Ok(None)` only at a clean record boundary at end of input. Anything
    /// else that does not parse is `WalCorruption`.
    pub fn next_record(&mut self) -> Result<Option<WalRecord>> {
        let result = self.parse_record();
        if result.is_err() {
            self.failed = true;
        }
        result
    }

    /// Read every remaining record, failing on the first damaged one
    pub fn read_all(mut self) -> Result<Vec<WalRecord>> {
        let mut records = Vec::new();
        while let Some(record) = self.next_record()? {
            records.push(record);
        }
        Ok(records)
    }

    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    fn parse_record(&mut self) -> Result<Option<WalRecord>> {
        let start = self.offset;
        let mut marker = Vec::new();
        let n = (&mut self.reader)
            .take(MAX_MARKER_LINE)
            .read_until(b'\n', &mut marker)?;
        if n == 0 {
            return Ok(None);
        }
        self.offset += n as u64;

        if marker.last() != Some(&b'\n') {
            return Err(self.corrupt(
                start,
                format!(
                    "unterminated marker line {:?}",
                    String::from_utf8_lossy(&marker)
                ),
            ));
        }
        marker.pop();

        let record = if marker == SET_MARKER {
            let key = self.read_field("key")?;
            let value = self.read_field("value")?;
            WalRecord::Set { key, value }
        } else if marker == DELETE_MARKER {
            let key = self.read_field("key")?;
            WalRecord::Delete { key }
        } else {
            return Err(self.corrupt(
                start,
                format!(
                    "expected SET or DELETE, found {:?}",
                    String::from_utf8_lossy(&marker)
                ),
            ));
        };

        self.records_read += 1;
        Ok(Some(record))
    }

    /// Parse `<decimal length><space><exactly length bytes>\n`
    fn read_field(&mut self, name: &str) -> Result<Vec<u8>> {
        let start = self.offset;

        let mut prefix = Vec::new();
        let n = (&mut self.reader)
            .take(MAX_LENGTH_PREFIX)
            .read_until(b' ', &mut prefix)?;
        self.offset += n as u64;

        if prefix.pop() != Some(b' ') {
            return Err(self.corrupt(start, format!("{} field has no length prefix", name)));
        }
        let len = parse_length(&prefix).ok_or_else(|| {
            self.corrupt(
                start,
                format!(
                    "{} field has invalid length {:?}",
                    name,
                    String::from_utf8_lossy(&prefix)
                ),
            )
        })?;

        let mut field = Vec::new();
        let read = (&mut self.reader).take(len as u64).read_to_end(&mut field)?;
        self.offset += read as u64;
        if read < len {
            return Err(self.corrupt(
                start,
                format!("{} field declares {} bytes but only {} remain", name, len, read),
            ));
        }

        let mut terminator = [0u8; 1];
        match self.reader.read_exact(&mut terminator) {
            Ok(()) => self.offset += 1,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                return Err(self.corrupt(start, format!("{} field is not newline-terminated", name)));
            }
            Err(e) => return Err(e.into()),
        }
        if terminator[0] != b'\n' {
            return Err(self.corrupt(
                start,
                format!("{} field length {} does not match its content", name, len),
            ));
        }

        Ok(field)
    }

    fn corrupt(&self, at: u64, detail: String) -> KvdbError {
        KvdbError::WalCorruption(format!(
            "record {} at byte {}: {}",
            self.records_read + 1,
            at,
            detail
        ))
    }
}

impl<R: BufRead> Iterator for WalReader<R> {
    type Item = Result<WalRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        self.next_record().transpose()
    }
}

fn parse_length(digits: &[u8]) -> Option<usize> {
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(digits).ok()?.parse().ok()
}
