//! WAL record definitions
//!
//! Defines the records stored in the log and their on-disk encoding.

use crate::protocol::Command;

/// Marker line opening a SET record
pub const SET_MARKER: &[u8] = b"SET";

/// Marker line opening a DELETE record
pub const DELETE_MARKER: &[u8] = b"DELETE";

/// A single mutation in the WAL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalRecord {
    /// Set a key-value pair
    Set { key: Vec<u8>, value: Vec<u8> },

    /// Delete a key
    Delete { key: Vec<u8> },
}

impl WalRecord {
    /// The record for a mutating command, `None` for reads
    pub fn from_command(command: &Command) -> Option<Self> {
        match command {
            Command::Get { .. } => None,
            Command::Set { key, value } => Some(WalRecord::Set {
                key: key.clone(),
                value: value.clone(),
            }),
            Command::Delete { key } => Some(WalRecord::Delete { key: key.clone() }),
        }
    }

    pub fn key(&self) -> &[u8] {
        match self {
            WalRecord::Set { key, .. } | WalRecord::Delete { key } => key,
        }
    }

    /// Encode to the on-disk text form, trailing newline included
    pub fn encode(&self) -> Vec<u8> {
        match self {
            WalRecord::Set { key, value } => encode_set(key, value),
            WalRecord::Delete { key } => encode_delete(key),
        }
    }
}

pub(crate) fn encode_set(key: &[u8], value: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(SET_MARKER.len() + key.len() + value.len() + 16);
    push_line(&mut buf, SET_MARKER);
    push_field(&mut buf, key);
    push_field(&mut buf, value);
    buf
}

pub(crate) fn encode_delete(key: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(DELETE_MARKER.len() + key.len() + 8);
    push_line(&mut buf, DELETE_MARKER);
    push_field(&mut buf, key);
    buf
}

fn push_line(buf: &mut Vec<u8>, line: &[u8]) {
    buf.extend_from_slice(line);
    buf.push(b'\n');
}

fn push_field(buf: &mut Vec<u8>, field: &[u8]) {
    buf.extend_from_slice(field.len().to_string().as_bytes());
    buf.push(b' ');
    push_line(buf, field);
}
