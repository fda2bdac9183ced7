//! MemTable Tests
//!
//! Tests verify:
//! - Basic set/get/delete operations
//! - Overwrites and deletes of absent keys
//! - Snapshot contents
//! - Concurrent access patterns

use std::sync::Arc;
use std::thread;

use walkv::memtable::MemTable;

// =============================================================================
// Basic Operations Tests
// =============================================================================

#[test]
fn test_new_memtable_is_empty() {
    let memtable = MemTable::new();
    assert_eq!(memtable.len(), 0);
    assert!(memtable.is_empty());
}

#[test]
fn test_set_and_get() {
    let memtable = MemTable::new();

    memtable.set("key1".to_string(), "value1".to_string());

    assert_eq!(memtable.get("key1"), Some("value1".to_string()));
    assert_eq!(memtable.len(), 1);
}

#[test]
fn test_get_nonexistent_key() {
    let memtable = MemTable::new();
    assert_eq!(memtable.get("nonexistent"), None);
}

#[test]
fn test_set_overwrites_existing() {
    let memtable = MemTable::new();

    memtable.set("key".to_string(), "old".to_string());
    memtable.set("key".to_string(), "new".to_string());

    assert_eq!(memtable.get("key"), Some("new".to_string()));
    assert_eq!(memtable.len(), 1);
}

#[test]
fn test_delete_existing_key() {
    let memtable = MemTable::new();
    memtable.set("key".to_string(), "value".to_string());

    assert!(memtable.delete("key"));
    assert_eq!(memtable.get("key"), None);
    assert!(memtable.is_empty());
}

#[test]
fn test_delete_absent_key_has_no_effect() {
    let memtable = MemTable::new();
    memtable.set("other".to_string(), "value".to_string());

    assert!(!memtable.delete("missing"));
    assert_eq!(memtable.len(), 1);
    assert_eq!(memtable.get("other"), Some("value".to_string()));
}

#[test]
fn test_delete_twice() {
    let memtable = MemTable::new();
    memtable.set("key".to_string(), "value".to_string());

    assert!(memtable.delete("key"));
    assert!(!memtable.delete("key"));
}

#[test]
fn test_value_with_spaces() {
    let memtable = MemTable::new();
    memtable.set("greeting".to_string(), "hello big world".to_string());
    assert_eq!(memtable.get("greeting"), Some("hello big world".to_string()));
}

#[test]
fn test_snapshot_is_a_copy() {
    let memtable = MemTable::new();
    memtable.set("a".to_string(), "1".to_string());
    memtable.set("b".to_string(), "2".to_string());

    let snapshot = memtable.snapshot();
    memtable.delete("a");

    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot.get("a"), Some(&"1".to_string()));
    assert_eq!(memtable.len(), 1);
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_reads() {
    let memtable = Arc::new(MemTable::new());
    for i in 0..100 {
        memtable.set(format!("key{}", i), format!("value{}", i));
    }

    let mut handles = vec![];
    for _ in 0..4 {
        let memtable = Arc::clone(&memtable);
        handles.push(thread::spawn(move || {
            for i in 0..100 {
                assert_eq!(memtable.get(&format!("key{}", i)), Some(format!("value{}", i)));
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_concurrent_writers_and_readers() {
    let memtable = Arc::new(MemTable::new());

    let mut handles = vec![];
    for t in 0..4 {
        let memtable = Arc::clone(&memtable);
        handles.push(thread::spawn(move || {
            for i in 0..250 {
                memtable.set(format!("t{}_k{}", t, i), format!("v{}", i));
            }
        }));
    }
    for _ in 0..2 {
        let memtable = Arc::clone(&memtable);
        handles.push(thread::spawn(move || {
            for _ in 0..250 {
                // Readers may see any prefix of the writes, never a torn map
                let len = memtable.len();
                assert!(len <= 1000);
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(memtable.len(), 1000);
    assert_eq!(memtable.get("t3_k249"), Some("v249".to_string()));
}
