//! Tests for Engine durability
//!
//! These tests verify:
//! - WAL-disabled mode never touches disk
//! - Acknowledged writes survive a restart
//! - LSNs continue across restarts
//! - Concurrent writers recover to the same state
//! - Behavior after close

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tempfile::TempDir;
use walkv::config::{Config, WalConfig};
use walkv::engine::Engine;
use walkv::error::KvError;
use walkv::protocol::{Command, Response};
use walkv::wal::{list_segments, replay_dir, NoopWal};

// =============================================================================
// Helper Functions
// =============================================================================

fn wal_config(dir: &Path) -> WalConfig {
    Config::builder()
        .data_directory(dir)
        .flushing_batch_size(4)
        .flushing_batch_timeout(Duration::from_millis(2))
        .build()
        .wal
}

fn newest_segment(dir: &Path) -> String {
    let segments = list_segments(dir).unwrap();
    fs::read_to_string(segments.last().unwrap()).unwrap()
}

// =============================================================================
// WAL Disabled Tests
// =============================================================================

#[test]
fn test_wal_disabled_serves_without_files() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("wal");
    let config = Config::builder()
        .wal_enabled(false)
        .data_directory(&dir)
        .build();

    let engine = Engine::open(&config.wal).unwrap();
    assert_eq!(engine.process("SET k1 v1").unwrap(), Response::Stored);
    assert_eq!(engine.process("GET k1").unwrap(), Response::Value("v1".to_string()));
    assert_eq!(engine.process("DEL k1").unwrap(), Response::Deleted);
    engine.close().unwrap();

    assert!(!dir.exists());
    assert!(engine.replay_stats().is_none());
}

// =============================================================================
// Restart Tests
// =============================================================================

#[test]
fn test_acknowledged_writes_on_disk_before_return() {
    let temp = TempDir::new().unwrap();
    let engine = Engine::open(&wal_config(temp.path())).unwrap();

    engine.process("SET k1 v1").unwrap();

    // Visible in the segment before close
    assert_eq!(newest_segment(temp.path()), "LSN=1 SET k1 v1\n");
    engine.close().unwrap();
}

#[test]
fn test_restart_replays_state() {
    let temp = TempDir::new().unwrap();

    {
        let engine = Engine::open(&wal_config(temp.path())).unwrap();
        engine.process("SET k1 v1").unwrap();
        engine.process("SET k2 v2").unwrap();
        engine.close().unwrap();
    }

    let engine = Engine::open(&wal_config(temp.path())).unwrap();
    assert_eq!(engine.process("GET k1").unwrap(), Response::Value("v1".to_string()));
    assert_eq!(engine.process("GET k2").unwrap(), Response::Value("v2".to_string()));

    let stats = engine.replay_stats().unwrap();
    assert_eq!(stats.records, 2);
    assert_eq!(stats.last_lsn, Some(2));
    engine.close().unwrap();
}

#[test]
fn test_lsn_continues_after_restart() {
    let temp = TempDir::new().unwrap();

    {
        let engine = Engine::open(&wal_config(temp.path())).unwrap();
        engine.process("SET k1 v1").unwrap();
        engine.process("SET k2 v2").unwrap();
        engine.close().unwrap();
    }

    let engine = Engine::open(&wal_config(temp.path())).unwrap();
    engine.process("SET k3 v3").unwrap();
    engine.close().unwrap();

    // Replay never appends to old segments; the new record lands in a new one
    assert_eq!(list_segments(temp.path()).unwrap().len(), 2);
    assert_eq!(newest_segment(temp.path()), "LSN=3 SET k3 v3\n");
}

#[test]
fn test_restart_replays_deletes() {
    let temp = TempDir::new().unwrap();

    {
        let engine = Engine::open(&wal_config(temp.path())).unwrap();
        engine.process("SET gone soon").unwrap();
        engine.process("SET kept here").unwrap();
        engine.process("DEL gone").unwrap();
        engine.process("DEL never").unwrap();
        engine.close().unwrap();
    }

    let engine = Engine::open(&wal_config(temp.path())).unwrap();
    assert_eq!(engine.process("GET gone").unwrap(), Response::NotFound);
    assert_eq!(engine.process("GET kept").unwrap(), Response::Value("here".to_string()));
    assert_eq!(engine.replay_stats().unwrap().records, 4);
    engine.close().unwrap();
}

#[test]
fn test_corrupt_wal_prevents_open() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("wal_segment_1.log"),
        "LSN=1 SET a 1\nnot a record\n",
    )
    .unwrap();

    let result = Engine::open(&wal_config(temp.path()));
    assert!(matches!(result, Err(KvError::Replay { line: 2, .. })));
}

#[test]
fn test_concurrent_writers_recover_same_state() {
    let temp = TempDir::new().unwrap();
    let engine = Arc::new(Engine::open(&wal_config(temp.path())).unwrap());

    let mut handles = vec![];
    for t in 0..8 {
        let engine = Arc::clone(&engine);
        handles.push(thread::spawn(move || {
            for i in 0..25 {
                engine.process(&format!("SET t{}_k{} value {}", t, i, i)).unwrap();
                if i % 5 == 0 {
                    engine.process(&format!("DEL t{}_k{}", t, i)).unwrap();
                }
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let before = engine.memtable().snapshot();
    engine.close().unwrap();
    assert_eq!(before.len(), 8 * 20);

    let reopened = Engine::open(&wal_config(temp.path())).unwrap();
    assert_eq!(reopened.memtable().snapshot(), before);
    assert_eq!(reopened.replay_stats().unwrap().last_lsn, Some(8 * 30));
    reopened.close().unwrap();
}

#[test]
fn test_engine_is_a_replay_target() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("wal_segment_1.log"),
        "LSN=1 SET a 1\nLSN=2 SET b two words\nLSN=3 DEL a \nLSN=4 DEL ghost \n",
    )
    .unwrap();

    let engine = Engine::with_wal(Box::new(NoopWal));
    let stats = replay_dir(temp.path(), &engine).unwrap();

    assert_eq!(stats.records, 4);
    assert_eq!(engine.get("a"), None);
    assert_eq!(engine.get("b"), Some("two words".to_string()));
}

#[test]
fn test_torn_tail_prevents_open() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("wal_segment_1.log"),
        "LSN=1 SET a 1\nLSN=2 SET k3 vvvvvvv",
    )
    .unwrap();

    let result = Engine::open(&wal_config(temp.path()));
    assert!(matches!(result, Err(KvError::Replay { line: 2, .. })));
}

#[test]
fn test_rejected_write_absent_after_restart() {
    let temp = TempDir::new().unwrap();

    {
        let engine = Engine::open(&wal_config(temp.path())).unwrap();
        engine.process("SET k v").unwrap();
        let rejected = engine.execute(Command::Set {
            key: "a b".into(),
            value: "c".into(),
        });
        assert!(matches!(rejected, Err(KvError::Parse(_))));
        engine.close().unwrap();
    }

    let engine = Engine::open(&wal_config(temp.path())).unwrap();
    assert_eq!(engine.memtable().len(), 1);
    assert_eq!(engine.get("a"), None);
    assert_eq!(engine.replay_stats().unwrap().last_lsn, Some(1));
    engine.close().unwrap();
}

// =============================================================================
// Close Tests
// =============================================================================

#[test]
fn test_writes_after_close_fail_reads_still_work() {
    let temp = TempDir::new().unwrap();
    let engine = Engine::open(&wal_config(temp.path())).unwrap();
    engine.process("SET k v").unwrap();
    engine.close().unwrap();

    assert!(matches!(engine.process("SET k other"), Err(KvError::WalClosed)));
    assert!(matches!(engine.process("DEL k"), Err(KvError::WalClosed)));
    assert_eq!(engine.process("GET k").unwrap(), Response::Value("v".to_string()));

    // Idempotent
    engine.close().unwrap();
}
