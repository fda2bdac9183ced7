//! WAL Replay
//!
//! Rebuilds in-memory state from persisted segments at startup.
//!
//! Replay only reads. The WAL writer is opened after replay completes, so
//! the segments being read are never appended to concurrently.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::error::{KvError, Result};

use super::record::{Operation, Record};
use super::segment::parse_segment_timestamp;

/// Anything replayed operations can be applied to
pub trait Replayer {
    fn set(&self, key: String, value: String);

    /// Returns whether the key was present. Replay ignores the result.
    fn delete(&self, key: &str) -> bool;
}

/// Summary of a completed replay
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayStats {
    /// Number of segment files read
    pub segments: usize,

    /// Number of records applied
    pub records: u64,

    /// Highest LSN seen, if any record was read
    pub last_lsn: Option<u64>,
}

/// List segment files in `dir` in replay order.
///
/// Files not matching `wal_segment_<digits>.log` are ignored. A missing
/// directory yields an empty list.
pub fn list_segments(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut segments: Vec<(u128, PathBuf)> = Vec::new();
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let timestamp = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(parse_segment_timestamp);

        if let Some(timestamp) = timestamp {
            segments.push((timestamp, path));
        }
    }

    // Oldest first
    segments.sort();

    Ok(segments.into_iter().map(|(_, path)| path).collect())
}

/// Replay every segment in `dir`, oldest first, into `target`.
///
/// Any unreadable file or malformed line aborts the whole replay.
pub fn replay_dir<R: Replayer + ?Sized>(dir: &Path, target: &R) -> Result<ReplayStats> {
    let mut stats = ReplayStats::default();

    for path in list_segments(dir)? {
        tracing::info!("Replaying WAL segment {}", path.display());
        replay_segment(&path, target, &mut stats)?;
        stats.segments += 1;
    }

    Ok(stats)
}

/// Replay a single segment file into `target`
///
/// A final line without its newline is rejected, not applied.
pub fn replay_segment<R: Replayer + ?Sized>(
    path: &Path,
    target: &R,
    stats: &mut ReplayStats,
) -> Result<()> {
    let file = File::open(path).map_err(|e| replay_error(path, 0, e))?;
    let mut reader = BufReader::new(file);
    let mut line = String::new();
    let mut line_no = 0;

    loop {
        line.clear();
        let read = reader
            .read_line(&mut line)
            .map_err(|e| replay_error(path, line_no + 1, e))?;
        if read == 0 {
            break;
        }
        line_no += 1;

        // Every flushed record ends with a newline; anything else is a torn write
        let encoded = line
            .strip_suffix('\n')
            .ok_or_else(|| replay_error(path, line_no, "record is missing its line terminator"))?;
        let record = Record::decode(encoded).map_err(|e| replay_error(path, line_no, e))?;

        apply(record.operation, target);

        stats.records += 1;
        stats.last_lsn = Some(stats.last_lsn.map_or(record.lsn, |lsn| lsn.max(record.lsn)));
    }

    Ok(())
}

fn apply<R: Replayer + ?Sized>(operation: Operation, target: &R) {
    match operation {
        Operation::Set { key, value } => target.set(key, value),
        Operation::Delete { key } => {
            target.delete(&key);
        }
    }
}

fn replay_error(path: &Path, line: usize, reason: impl std::fmt::Display) -> KvError {
    KvError::Replay {
        path: path.display().to_string(),
        line,
        reason: reason.to_string(),
    }
}
