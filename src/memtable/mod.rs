//! MemTable Module
//!
//! The in-memory key-value engine: the system of record for committed state.
//!
//! ## Responsibilities
//! - Fast reads and writes in memory
//! - Concurrent readers, exclusive writers (one shared lock, no sharding)
//! - Target of WAL replay at startup
//!
//! ## Data Structure Choice
//! `HashMap` wrapped in a `parking_lot::RwLock`:
//! - Callers never observe iteration order, so no ordered map is needed
//! - Entries are overwritten or removed in place (no tombstones: the WAL is
//!   the only persistence)

mod table;

pub use table::MemTable;
