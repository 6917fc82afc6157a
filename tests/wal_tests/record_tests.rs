//! Tests for WAL Record encoding
//!
//! These tests verify:
//! - Exact on-disk text layout for SET and DELETE
//! - Length prefixes count bytes, not characters
//! - Conversion to and from protocol commands

use kvdb::protocol::Command;
use kvdb::wal::WalRecord;

#[test]
fn test_set_record_layout() {
    let record = WalRecord::Set {
        key: b"test".to_vec(),
        value: b"hello,world".to_vec(),
    };

    assert_eq!(record.encode(), b"SET\n4 test\n11 hello,world\n".to_vec());
}

#[test]
fn test_delete_record_layout() {
    let record = WalRecord::Delete { key: b"test".to_vec() };

    assert_eq!(record.encode(), b"DELETE\n4 test\n".to_vec());
}

#[test]
fn test_empty_fields() {
    let record = WalRecord::Set { key: vec![], value: vec![] };

    assert_eq!(record.encode(), b"SET\n0 \n0 \n".to_vec());
}

#[test]
fn test_length_counts_bytes() {
    // "é" is two bytes in UTF-8
    let record = WalRecord::Delete { key: "é".as_bytes().to_vec() };

    let mut expected = b"DELETE\n2 ".to_vec();
    expected.extend_from_slice("é".as_bytes());
    expected.push(b'\n');
    assert_eq!(record.encode(), expected);
}

#[test]
fn test_embedded_newline_kept_raw() {
    let record = WalRecord::Set {
        key: b"a\nb".to_vec(),
        value: b"SET\n".to_vec(),
    };

    assert_eq!(record.encode(), b"SET\n3 a\nb\n4 SET\n\n".to_vec());
}

#[test]
fn test_from_command() {
    let set = Command::Set { key: b"k".to_vec(), value: b"v".to_vec() };
    let delete = Command::Delete { key: b"k".to_vec() };
    let get = Command::Get { key: b"k".to_vec() };

    assert_eq!(
        WalRecord::from_command(&set),
        Some(WalRecord::Set { key: b"k".to_vec(), value: b"v".to_vec() })
    );
    assert_eq!(
        WalRecord::from_command(&delete),
        Some(WalRecord::Delete { key: b"k".to_vec() })
    );
    assert_eq!(WalRecord::from_command(&get), None);
}

#[test]
fn test_from_command_roundtrips_through_log() {
    let command = Command::Set { key: b"k".to_vec(), value: b"v".to_vec() };
    let record = WalRecord::from_command(&command).unwrap();

    assert_eq!(record.key(), command.key());
    assert_eq!(record.encode(), b"SET\n1 k\n1 v\n".to_vec());
}
