//! Tests for the WAL Segment Manager
//!
//! These tests verify:
//! - Directory and first segment creation
//! - Size tracking across writes
//! - Rotation to new, chronologically named files
//! - Segment filename parsing

use std::fs;

use tempfile::TempDir;
use walkv::error::FlushStage;
use walkv::wal::{parse_segment_timestamp, segment_file_name, SegmentManager};

#[test]
fn test_open_creates_directory_and_segment() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("nested").join("wal");

    let manager = SegmentManager::open(&dir).unwrap();

    assert!(dir.is_dir());
    let path = manager.current_path().unwrap();
    assert!(path.exists());
    assert!(manager.is_open());
    assert_eq!(manager.size(), 0);

    let name = path.file_name().unwrap().to_str().unwrap();
    assert!(parse_segment_timestamp(name).is_some(), "bad name {}", name);
}

#[test]
fn test_write_and_sync_tracks_size() {
    let temp = TempDir::new().unwrap();
    let mut manager = SegmentManager::open(temp.path()).unwrap();

    manager.write_and_sync(b"LSN=1 SET a 1\n").unwrap();
    manager.write_and_sync(b"LSN=2 SET b 2\n").unwrap();

    assert_eq!(manager.size(), 28);
    let content = fs::read_to_string(manager.current_path().unwrap()).unwrap();
    assert_eq!(content, "LSN=1 SET a 1\nLSN=2 SET b 2\n");
}

#[test]
fn test_rotate_leaves_old_segment_intact() {
    let temp = TempDir::new().unwrap();
    let mut manager = SegmentManager::open(temp.path()).unwrap();

    manager.write_and_sync(b"LSN=1 SET a 1\n").unwrap();
    let old_path = manager.current_path().unwrap().to_path_buf();

    let new_path = manager.rotate().unwrap();

    assert_ne!(old_path, new_path);
    assert_eq!(manager.size(), 0);
    assert_eq!(fs::read_to_string(&old_path).unwrap(), "LSN=1 SET a 1\n");
    assert_eq!(fs::read_to_string(&new_path).unwrap(), "");
}

#[test]
fn test_rapid_rotations_produce_increasing_names() {
    let temp = TempDir::new().unwrap();
    let mut manager = SegmentManager::open(temp.path()).unwrap();

    let mut stamps = Vec::new();
    for _ in 0..50 {
        let path = manager.rotate().unwrap();
        let name = path.file_name().unwrap().to_str().unwrap().to_string();
        stamps.push(parse_segment_timestamp(&name).unwrap());
    }

    assert!(stamps.windows(2).all(|pair| pair[0] < pair[1]));
    assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 51);
}

#[test]
fn test_write_after_close_fails() {
    let temp = TempDir::new().unwrap();
    let mut manager = SegmentManager::open(temp.path()).unwrap();

    manager.close().unwrap();

    assert!(!manager.is_open());
    let failure = manager.write_and_sync(b"LSN=1 SET a 1\n").unwrap_err();
    assert_eq!(failure.stage, FlushStage::Write);
}

#[test]
fn test_segment_name_parsing() {
    assert_eq!(segment_file_name(42), "wal_segment_42.log");
    assert_eq!(parse_segment_timestamp("wal_segment_1700000000000000000.log"), Some(1_700_000_000_000_000_000));
    assert_eq!(parse_segment_timestamp("wal_segment_.log"), None);
    assert_eq!(parse_segment_timestamp("wal_segment_12a.log"), None);
    assert_eq!(parse_segment_timestamp("wal_segment_12.log.bak"), None);
    assert_eq!(parse_segment_timestamp("segment_12.log"), None);
}
