//! Tests for Engine
//!
//! These tests verify:
//! - Basic get/set/delete operations
//! - Command execution
//! - Log-before-apply ordering and WAL failure handling
//! - Restart recovery from the WAL
//! - Concurrent access patterns

use std::collections::BTreeMap;
use std::fs;
use std::sync::{Arc, Barrier};
use std::thread;

use kvdb::config::{Config, WalSyncStrategy};
use kvdb::engine::Engine;
use kvdb::protocol::Command;
use kvdb::storage::{MemoryStorage, StorageBackend};
use kvdb::wal::{TextWal, WalRecord, WriteAheadLog};
use kvdb::{KvdbError, Result};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn temp_config(temp_dir: &TempDir) -> Config {
    Config::builder()
        .log_file_path(temp_dir.path().join("kvdb_write.log"))
        .wal_sync_strategy(WalSyncStrategy::EveryWrite) // Sync every write for test reliability
        .build()
}

fn setup_temp_engine() -> (TempDir, Engine) {
    let temp_dir = TempDir::new().unwrap();
    let engine = Engine::open(&temp_config(&temp_dir)).unwrap();
    (temp_dir, engine)
}

/// WAL that keeps records in memory and can be told to fail
#[derive(Default)]
struct FlakyWal {
    records: Vec<WalRecord>,
    fail_writes: bool,
}

impl WriteAheadLog for FlakyWal {
    fn log_set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        if self.fail_writes {
            return Err(KvdbError::WalWrite(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )));
        }
        self.records.push(WalRecord::Set { key: key.to_vec(), value: value.to_vec() });
        Ok(())
    }

    fn log_delete(&mut self, key: &[u8]) -> Result<()> {
        if self.fail_writes {
            return Err(KvdbError::WalWrite(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )));
        }
        self.records.push(WalRecord::Delete { key: key.to_vec() });
        Ok(())
    }

    fn replay(&mut self) -> Result<Vec<WalRecord>> {
        Ok(self.records.clone())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

// =============================================================================
// Basic Operations Tests
// =============================================================================

#[test]
fn test_engine_open_creates_log() {
    let temp_dir = TempDir::new().unwrap();
    let config = temp_config(&temp_dir);

    let engine = Engine::open(&config).unwrap();

    assert!(config.log_file_path.exists());
    assert!(engine.is_empty());
}

#[test]
fn test_engine_open_rejects_bad_config() {
    let config = Config::builder().log_file_path("").build();

    assert!(matches!(Engine::open(&config), Err(KvdbError::Config(_))));
}

#[test]
fn test_engine_set_get() {
    let (_temp, engine) = setup_temp_engine();

    engine.set(b"test", b"hello,world").unwrap();

    assert_eq!(engine.get(b"test").unwrap(), b"hello,world".to_vec());
}

#[test]
fn test_engine_get_nonexistent_key() {
    let (_temp, engine) = setup_temp_engine();

    assert!(matches!(engine.get(b"nonexistent"), Err(KvdbError::KeyNotFound)));
}

#[test]
fn test_engine_set_overwrite() {
    let (_temp, engine) = setup_temp_engine();

    engine.set(b"key", b"value1").unwrap();
    engine.set(b"key", b"value2").unwrap();

    assert_eq!(engine.get(b"key").unwrap(), b"value2".to_vec());
    assert_eq!(engine.len(), 1);
}

#[test]
fn test_engine_delete() {
    let (_temp, engine) = setup_temp_engine();

    engine.set(b"key", b"value").unwrap();
    engine.delete(b"key").unwrap();

    assert!(matches!(engine.get(b"key"), Err(KvdbError::KeyNotFound)));
}

#[test]
fn test_engine_delete_is_idempotent() {
    let (_temp, engine) = setup_temp_engine();

    engine.set(b"other", b"x").unwrap();
    engine.delete(b"key").unwrap();
    engine.delete(b"key").unwrap();

    assert_eq!(engine.len(), 1);
}

#[test]
fn test_engine_writes_log_records() {
    let (temp_dir, engine) = setup_temp_engine();

    engine.set(b"test", b"hello,world").unwrap();
    engine.delete(b"test").unwrap();
    engine.get(b"test").unwrap_err();

    let contents = fs::read(temp_dir.path().join("kvdb_write.log")).unwrap();
    assert_eq!(contents, b"SET\n4 test\n11 hello,world\nDELETE\n4 test\n".to_vec());
}

// =============================================================================
// Command Execution Tests
// =============================================================================

#[test]
fn test_execute_commands() {
    let (_temp, engine) = setup_temp_engine();

    let set = Command::Set { key: b"k".to_vec(), value: b"v".to_vec() };
    let get = Command::Get { key: b"k".to_vec() };
    let delete = Command::Delete { key: b"k".to_vec() };

    assert_eq!(engine.execute(&set).unwrap(), None);
    assert_eq!(engine.execute(&get).unwrap(), Some(b"v".to_vec()));
    assert_eq!(engine.execute(&delete).unwrap(), None);
    assert!(matches!(engine.execute(&get), Err(KvdbError::KeyNotFound)));
}

// =============================================================================
// WAL Failure Tests
// =============================================================================

#[test]
fn test_failed_log_leaves_storage_untouched() {
    let wal = FlakyWal { fail_writes: true, ..Default::default() };
    let engine = Engine::new(MemoryStorage::new(), wal);

    let result = engine.set(b"k", b"v");

    assert!(matches!(result, Err(KvdbError::WalWrite(_))));
    assert!(matches!(engine.get(b"k"), Err(KvdbError::KeyNotFound)));
}

#[test]
fn test_failed_delete_log_keeps_value() {
    let engine = Engine::new(MemoryStorage::new(), FlakyWal::default());
    engine.set(b"k", b"v").unwrap();

    engine.with_wal(|wal| wal.fail_writes = true);
    assert!(engine.delete(b"k").is_err());

    assert_eq!(engine.get(b"k").unwrap(), b"v".to_vec());
}

#[test]
fn test_engine_recovers_after_transient_wal_failure() {
    let engine = Engine::new(MemoryStorage::new(), FlakyWal::default());

    engine.with_wal(|wal| wal.fail_writes = true);
    assert!(engine.set(b"a", b"1").is_err());
    engine.with_wal(|wal| wal.fail_writes = false);
    engine.set(b"b", b"2").unwrap();

    let logged = engine.with_wal(|wal| wal.records.clone());
    assert_eq!(logged, vec![WalRecord::Set { key: b"b".to_vec(), value: b"2".to_vec() }]);
}

#[test]
fn test_unusable_wal_rejects_every_write() {
    // /dev/full fails every write and cannot be truncated
    let Ok(wal) = TextWal::open(std::path::Path::new("/dev/full"), WalSyncStrategy::EveryWrite) else {
        return;
    };
    let engine = Engine::new(MemoryStorage::new(), wal);

    assert!(engine.set(b"k", b"v").is_err());
    assert!(matches!(engine.set(b"k", b"v"), Err(KvdbError::WalFailed)));

    assert!(engine.is_empty());
}

#[test]
fn test_set_after_close_fails() {
    let (_temp, engine) = setup_temp_engine();

    engine.close().unwrap();

    assert!(matches!(engine.set(b"k", b"v"), Err(KvdbError::WalClosed)));
    assert!(engine.is_empty());
}

// =============================================================================
// Recovery Tests
// =============================================================================

#[test]
fn test_recover_replays_into_storage() {
    let mut wal = FlakyWal::default();
    wal.log_set(b"a", b"1").unwrap();
    wal.log_set(b"b", b"2").unwrap();
    wal.log_delete(b"a").unwrap();

    let (engine, stats) = Engine::recover(MemoryStorage::new(), wal).unwrap();

    assert_eq!(stats.records_replayed, 3);
    assert_eq!(stats.live_keys, 1);
    assert_eq!(engine.get(b"b").unwrap(), b"2".to_vec());
    assert!(engine.get(b"a").is_err());
}

#[test]
fn test_restart_reproduces_state() {
    let temp_dir = TempDir::new().unwrap();
    let config = temp_config(&temp_dir);

    let mut expected = MemoryStorage::new();
    {
        let engine = Engine::open(&config).unwrap();
        for i in 0..200u32 {
            let key = format!("key{}", i % 23).into_bytes();
            if i % 5 == 0 {
                engine.delete(&key).unwrap();
                expected.delete(&key).unwrap();
            } else {
                let value = format!("value{}", i).into_bytes();
                engine.set(&key, &value).unwrap();
                expected.set(key, value).unwrap();
            }
        }
        engine.close().unwrap();
    }

    let reopened = Engine::open(&config).unwrap();

    assert_eq!(reopened.snapshot(), expected.snapshot());
}

#[test]
fn test_restart_then_write_more() {
    let temp_dir = TempDir::new().unwrap();
    let config = temp_config(&temp_dir);

    {
        let engine = Engine::open(&config).unwrap();
        engine.set(b"a", b"1").unwrap();
    }
    {
        let engine = Engine::open(&config).unwrap();
        assert_eq!(engine.get(b"a").unwrap(), b"1".to_vec());
        engine.set(b"b", b"2").unwrap();
        engine.delete(b"a").unwrap();
    }

    let engine = Engine::open(&config).unwrap();
    let mut expected = BTreeMap::new();
    expected.insert(b"b".to_vec(), b"2".to_vec());
    assert_eq!(engine.snapshot(), expected);
}

#[test]
fn test_open_corrupt_log_is_fatal() {
    let temp_dir = TempDir::new().unwrap();
    let config = temp_config(&temp_dir);
    fs::write(&config.log_file_path, b"SET\n1 a\n1 1\nBROKEN\n").unwrap();

    let result = Engine::open(&config);

    assert!(matches!(result, Err(KvdbError::WalCorruption(_))));
}

#[test]
fn test_open_truncated_log_is_fatal() {
    let temp_dir = TempDir::new().unwrap();
    let config = temp_config(&temp_dir);
    fs::write(&config.log_file_path, b"SET\n1 a\n5 12").unwrap();

    assert!(matches!(Engine::open(&config), Err(KvdbError::WalCorruption(_))));
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_sets_same_key() {
    let (temp_dir, engine) = setup_temp_engine();
    let engine = Arc::new(engine);
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = [b"a", b"b"]
        .into_iter()
        .map(|value| {
            let engine = Arc::clone(&engine);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                engine.set(b"k", value).unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let final_value = engine.get(b"k").unwrap();
    assert!(final_value == b"a".to_vec() || final_value == b"b".to_vec());

    // Both records are logged; the later one is the value that stuck
    let mut wal = TextWal::open(&temp_dir.path().join("kvdb_write.log"), WalSyncStrategy::OsBuffer).unwrap();
    let records = wal.replay().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(
        records[1],
        WalRecord::Set { key: b"k".to_vec(), value: final_value }
    );
}

#[test]
fn test_concurrent_writers_log_order_matches_state() {
    let (temp_dir, engine) = setup_temp_engine();
    let engine = Arc::new(engine);

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for i in 0..50 {
                    let key = format!("key{}", i % 10);
                    if (i + t) % 7 == 0 {
                        engine.delete(key.as_bytes()).unwrap();
                    } else {
                        engine
                            .set(key.as_bytes(), format!("t{}-{}", t, i).as_bytes())
                            .unwrap();
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let live = engine.snapshot();
    drop(engine);

    // Replaying the log in file order must land on the live state
    let reopened = Engine::open(&temp_config(&temp_dir)).unwrap();
    assert_eq!(reopened.snapshot(), live);
}

#[test]
fn test_concurrent_readers_never_see_partial_values() {
    let (_temp, engine) = setup_temp_engine();
    let engine = Arc::new(engine);
    let long_a = vec![b'a'; 200];
    let long_b = vec![b'b'; 200];
    engine.set(b"k", &long_a).unwrap();

    let writer = {
        let engine = Arc::clone(&engine);
        let (long_a, long_b) = (long_a.clone(), long_b.clone());
        thread::spawn(move || {
            for i in 0..200 {
                let value = if i % 2 == 0 { &long_b } else { &long_a };
                engine.set(b"k", value).unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..3)
        .map(|_| {
            let engine = Arc::clone(&engine);
            let (long_a, long_b) = (long_a.clone(), long_b.clone());
            thread::spawn(move || {
                for _ in 0..500 {
                    let value = engine.get(b"k").unwrap();
                    assert!(value == long_a || value == long_b);
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
}
