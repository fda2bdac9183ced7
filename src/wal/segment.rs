//! WAL Segment Manager
//!
//! Owns the currently open segment file and rotates to new ones.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{FlushFailure, FlushStage, Result};

/// Segment filename prefix
pub const SEGMENT_PREFIX: &str = "wal_segment_";

/// Segment filename extension (including the dot)
pub const SEGMENT_SUFFIX: &str = ".log";

/// Build the filename for a segment created at `timestamp_nanos`
pub fn segment_file_name(timestamp_nanos: u128) -> String {
    format!("{}{}{}", SEGMENT_PREFIX, timestamp_nanos, SEGMENT_SUFFIX)
}

/// Extract the creation timestamp from a segment filename.
///
/// Returns `None` for names that don't follow `wal_segment_<digits>.log`.
pub fn parse_segment_timestamp(file_name: &str) -> Option<u128> {
    let digits = file_name
        .strip_prefix(SEGMENT_PREFIX)?
        .strip_suffix(SEGMENT_SUFFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// What a segment needs from its backing file
trait SegmentFile: Write {
    fn sync_data(&mut self) -> io::Result<()>;
    fn sync_all(&mut self) -> io::Result<()>;
    fn set_len(&mut self, len: u64) -> io::Result<()>;
}

impl SegmentFile for File {
    fn sync_data(&mut self) -> io::Result<()> {
        File::sync_data(self)
    }

    fn sync_all(&mut self) -> io::Result<()> {
        File::sync_all(self)
    }

    fn set_len(&mut self, len: u64) -> io::Result<()> {
        File::set_len(self, len)
    }
}

/// The open segment and the length of its committed prefix
struct ActiveSegment<F> {
    file: F,
    path: PathBuf,

    /// Bytes of fully written and synced batches
    size: u64,

    /// A failed batch could not be cut off; the file must not be reused
    torn: bool,
}

impl<F: SegmentFile> ActiveSegment<F> {
    fn new(file: F, path: PathBuf) -> Self {
        Self {
            file,
            path,
            size: 0,
            torn: false,
        }
    }

    /// Write and sync one batch. On failure the file is truncated back to
    /// the committed prefix, so no part of a failed batch can be replayed.
    fn append(&mut self, bytes: &[u8]) -> std::result::Result<(), FlushFailure> {
        let result = self
            .file
            .write_all(bytes)
            .map_err(|e| FlushFailure::new(FlushStage::Write, e))
            .and_then(|()| {
                self.file
                    .sync_data()
                    .map_err(|e| FlushFailure::new(FlushStage::Sync, e))
            });

        match result {
            Ok(()) => {
                self.size += bytes.len() as u64;
                Ok(())
            }
            Err(failure) => {
                let committed = self.size;
                let rollback = self
                    .file
                    .set_len(committed)
                    .and_then(|()| self.file.sync_all());
                if let Err(e) = rollback {
                    tracing::error!(
                        "Failed to truncate WAL segment {} to {} bytes: {}",
                        self.path.display(),
                        committed,
                        e
                    );
                    self.torn = true;
                }
                Err(failure)
            }
        }
    }
}

/// Manages the single open, append-only segment file
///
/// Owned exclusively by the flush worker, so none of its state is locked.
pub struct SegmentManager {
    /// Directory where segments are created
    dir: PathBuf,

    /// Currently open segment, if any
    active: Option<ActiveSegment<File>>,

    /// Timestamp of the most recently created segment
    last_timestamp: u128,
}

impl SegmentManager {
    /// Create the data directory if needed and open a first segment
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;

        let mut manager = Self {
            dir: dir.to_path_buf(),
            active: None,
            last_timestamp: 0,
        };
        manager.rotate()?;

        Ok(manager)
    }

    /// Close the current segment (if open) and start a new one.
    ///
    /// The new file is named from the wall clock. Timestamps are forced to
    /// increase strictly, so filename order always equals creation order and
    /// an old segment is never reopened.
    pub fn rotate(&mut self) -> Result<PathBuf> {
        if let Some(segment) = self.active.take() {
            segment.file.sync_all()?;
        }

        let mut timestamp = wall_clock_nanos().max(self.last_timestamp + 1);
        let (file, path) = loop {
            let path = self.dir.join(segment_file_name(timestamp));
            match OpenOptions::new().append(true).create_new(true).open(&path) {
                Ok(file) => break (file, path),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => timestamp += 1,
                Err(e) => return Err(e.into()),
            }
        };

        self.last_timestamp = timestamp;
        self.active = Some(ActiveSegment::new(file, path.clone()));

        tracing::info!("Opened new WAL segment {}", path.display());
        Ok(path)
    }

    /// Append `bytes` in one write call, then force them to stable storage.
    ///
    /// A failed write or sync leaves the segment as it was before the call.
    /// If that cannot be guaranteed the segment is dropped and the next
    /// batch has to rotate first.
    pub fn write_and_sync(&mut self, bytes: &[u8]) -> std::result::Result<(), FlushFailure> {
        let segment = self
            .active
            .as_mut()
            .ok_or_else(|| FlushFailure::new(FlushStage::Write, "no open segment"))?;

        let result = segment.append(bytes);
        if segment.torn {
            self.active = None;
        }
        result
    }

    /// Sync and close the current segment
    pub fn close(&mut self) -> Result<()> {
        if let Some(segment) = self.active.take() {
            segment.file.sync_all()?;
        }
        Ok(())
    }

    /// Whether a segment is currently open for writing
    pub fn is_open(&self) -> bool {
        self.active.is_some()
    }

    /// Bytes committed to the current segment
    pub fn size(&self) -> u64 {
        self.active.as_ref().map_or(0, |segment| segment.size)
    }

    /// Path of the current segment
    pub fn current_path(&self) -> Option<&Path> {
        self.active.as_ref().map(|segment| segment.path.as_path())
    }
}

fn wall_clock_nanos() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0)
}
