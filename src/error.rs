//! Error types for walkv
//!
//! Provides a unified error type for all operations.

use std::fmt;

use thiserror::Error;

/// Result type alias using KvError
pub type Result<T> = std::result::Result<T, KvError>;

/// Unified error type for walkv operations
#[derive(Debug, Error)]
pub enum KvError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Client Input Errors
    // -------------------------------------------------------------------------
    #[error("parse error: {0}")]
    Parse(String),

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    // -------------------------------------------------------------------------
    // WAL Errors
    // -------------------------------------------------------------------------
    /// A batch flush failed; every request in the batch receives a copy
    #[error("WAL {0}")]
    Flush(FlushFailure),

    #[error("WAL is closed")]
    WalClosed,

    #[error("WAL flush worker terminated: {0}")]
    WalWorker(String),

    // -------------------------------------------------------------------------
    // Replay Errors
    // -------------------------------------------------------------------------
    #[error("corrupt WAL record: {0}")]
    CorruptRecord(String),

    #[error("replay of {path} failed at line {line}: {reason}")]
    Replay {
        path: String,
        line: usize,
        reason: String,
    },

    // -------------------------------------------------------------------------
    // Network Errors
    // -------------------------------------------------------------------------
    #[error("Protocol error: {0}")]
    Protocol(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Stage of a batch flush that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushStage {
    Write,
    Sync,
    Rotate,
}

impl fmt::Display for FlushStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            FlushStage::Write => "write",
            FlushStage::Sync => "fsync",
            FlushStage::Rotate => "rotate",
        };
        f.write_str(stage)
    }
}

/// Cloneable description of a failed flush.
///
/// `std::io::Error` is not `Clone`, so the worker renders the cause once and
/// hands an identical copy to each waiter of the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushFailure {
    pub stage: FlushStage,
    pub reason: String,
}

impl FlushFailure {
    pub fn new(stage: FlushStage, reason: impl fmt::Display) -> Self {
        Self {
            stage,
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for FlushFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error: {}", self.stage, self.reason)
    }
}

impl From<FlushFailure> for KvError {
    fn from(failure: FlushFailure) -> Self {
        KvError::Flush(failure)
    }
}
