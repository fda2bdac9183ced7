//! Engine Module
//!
//! The durability coordinator: every client request passes through here.
//!
//! ## Responsibilities
//! - Route reads straight to the MemTable
//! - Send mutations through the WAL and apply them only once durable
//! - Replay the WAL on startup before any request is served

use crate::config::WalConfig;
use crate::error::Result;
use crate::memtable::MemTable;
use crate::protocol::{Command, Response};
use crate::wal::{self, FileWal, NoopWal, ReplayStats, Replayer, Wal};

/// The main storage engine
///
/// ## Ordering
/// A mutating request is appended to the WAL and the call blocks until its
/// batch is synced; only then is the MemTable updated. If the WAL reports
/// failure the MemTable is left untouched. There is no lock spanning both
/// steps: for any single caller, disk order matches the order in which its
/// mutations become visible.
pub struct Engine {
    /// Committed state (internal RwLock)
    memtable: MemTable,

    /// Durability backend, chosen once at open
    wal: Box<dyn Wal>,

    /// Result of startup replay, if the WAL is enabled
    replay_stats: Option<ReplayStats>,
}

impl Engine {
    /// Open an engine with the given WAL config
    ///
    /// On startup with the WAL enabled:
    /// 1. Replay every existing segment into the MemTable
    /// 2. Open a fresh segment, continuing LSNs after the replayed ones
    /// 3. Ready to serve requests
    ///
    /// With the WAL disabled, nothing is read or written on disk.
    pub fn open(config: &WalConfig) -> Result<Self> {
        // Nothing can be logged until replay is done
        let mut engine = Self::with_wal(Box::new(NoopWal));

        if !config.enabled {
            tracing::warn!("WAL disabled: writes will not survive a restart");
            return Ok(engine);
        }

        let stats = wal::replay_dir(&config.data_directory, &engine)?;
        tracing::info!(
            "WAL replay: {} records from {} segments, {} keys live",
            stats.records,
            stats.segments,
            engine.memtable.len()
        );

        engine.wal = Box::new(FileWal::open(config, stats.last_lsn.unwrap_or(0))?);
        engine.replay_stats = Some(stats);

        Ok(engine)
    }

    /// Create an engine over an empty MemTable with the given WAL
    pub fn with_wal(wal: Box<dyn Wal>) -> Self {
        Self {
            memtable: MemTable::new(),
            wal,
            replay_stats: None,
        }
    }

    /// Parse and execute one request line
    pub fn process(&self, line: &str) -> Result<Response> {
        let command = Command::parse(line).map_err(|e| {
            tracing::debug!("Rejected request {:?}: {}", line, e);
            e
        })?;
        self.execute(command)
    }

    /// Execute a parsed command
    ///
    /// Mutations are WAL-confirmed before they are applied. A WAL error is
    /// returned as is and the mutation does not happen. Keys or values that
    /// cannot be logged as one record line are rejected with a parse error.
    pub fn execute(&self, command: Command) -> Result<Response> {
        if let Some(operation) = command.to_operation() {
            operation.validate()?;
            self.wal.append_and_wait(operation)?;
        }
        Ok(self.apply(command))
    }

    /// Apply a command without touching the WAL.
    ///
    /// Used by startup replay (through [`Replayer`]), where the WAL already
    /// holds the operation.
    pub fn apply_replayed(&self, command: Command) -> Response {
        self.apply(command)
    }

    fn apply(&self, command: Command) -> Response {
        match command {
            Command::Set { key, value } => {
                self.memtable.set(key, value);
                Response::Stored
            }
            Command::Get { key } => match self.memtable.get(&key) {
                Some(value) => Response::Value(value),
                None => Response::NotFound,
            },
            Command::Delete { key } => {
                if self.memtable.delete(&key) {
                    Response::Deleted
                } else {
                    Response::NotFound
                }
            }
        }
    }

    /// Drain and close the WAL
    ///
    /// Every request enqueued before this call is flushed and answered.
    pub fn close(&self) -> Result<()> {
        self.wal.close()
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Read a key directly
    pub fn get(&self, key: &str) -> Option<String> {
        self.memtable.get(key)
    }

    /// The committed state
    pub fn memtable(&self) -> &MemTable {
        &self.memtable
    }

    /// Replay summary, `None` when the WAL is disabled
    pub fn replay_stats(&self) -> Option<&ReplayStats> {
        self.replay_stats.as_ref()
    }
}

impl Replayer for Engine {
    fn set(&self, key: String, value: String) {
        self.apply_replayed(Command::Set { key, value });
    }

    fn delete(&self, key: &str) -> bool {
        let response = self.apply_replayed(Command::Delete {
            key: key.to_string(),
        });
        response == Response::Deleted
    }
}
