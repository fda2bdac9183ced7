//! # walkv
//!
//! A key-value store served over a line-oriented TCP protocol, with:
//! - Write-Ahead Logging (WAL) with group commit for durability
//! - Size-based WAL segment rotation
//! - Crash recovery by replaying segments on startup
//! - Concurrent readers, WAL-ordered writers
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      TCP Server                              │
//! │              (one thread per client, capped)                 │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │  process(line)
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                      Engine                                  │
//! │     (reads → MemTable, writes → WAL, then MemTable)          │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │     WAL     │          │  MemTable   │
//!   │ (batcher +  │          │  (RwLock)   │
//!   │  segments)  │          └─────────────┘
//!   └─────────────┘                 ▲
//!          │        startup replay  │
//!          └────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;

pub mod engine;
pub mod memtable;
pub mod network;
pub mod protocol;
pub mod wal;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::Config;
pub use engine::Engine;
pub use error::{KvError, Result};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of walkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
