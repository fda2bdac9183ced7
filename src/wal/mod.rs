//! Write-Ahead Log (WAL) Module
//!
//! Provides durability guarantees through append-only, group-committed
//! logging.
//!
//! ## Responsibilities
//! - Append operations before they are applied to the MemTable
//! - Batch concurrent writers into one write + fsync (group commit)
//! - Log Sequence Numbers (LSN) for ordering
//! - Segment rotation by size
//! - Replay on startup
//!
//! ## File Format
//! One record per line, in segment files named
//! `wal_segment_<nanosecond-timestamp>.log`:
//! ```text
//! LSN=1 SET user:1 alice
//! LSN=2 SET greeting hello world
//! LSN=3 DEL user:1
//! ```

mod batcher;
mod record;
mod replay;
mod segment;

pub use batcher::{FileWal, WalStats};
pub use record::{Operation, Record};
pub use replay::{list_segments, replay_dir, replay_segment, ReplayStats, Replayer};
pub use segment::{
    parse_segment_timestamp, segment_file_name, SegmentManager, SEGMENT_PREFIX, SEGMENT_SUFFIX,
};

use crate::error::Result;

/// A durability backend
///
/// Selected once at startup: [`FileWal`] when the WAL is enabled,
/// [`NoopWal`] when it is not.
pub trait Wal: Send + Sync {
    /// Block until `operation` is durably persisted or has permanently
    /// failed. The LSN is assigned downstream.
    fn append_and_wait(&self, operation: Operation) -> Result<()>;

    /// Stop accepting requests, flush anything buffered and release files
    fn close(&self) -> Result<()>;
}

/// WAL used when durability is disabled: acknowledges everything, writes
/// nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopWal;

impl Wal for NoopWal {
    fn append_and_wait(&self, _operation: Operation) -> Result<()> {
        Ok(())
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}
