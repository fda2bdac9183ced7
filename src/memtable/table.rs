//! MemTable implementation
//!
//! HashMap-based table with RwLock for concurrency.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::wal::Replayer;

/// In-memory key-value table
///
/// ## Concurrency:
/// - `get`, `len`, `snapshot`: shared read lock
/// - `set`, `delete`: exclusive write lock
/// - All methods use `&self`
pub struct MemTable {
    data: RwLock<HashMap<String, String>>,
}

impl MemTable {
    /// Create a new empty MemTable
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
        }
    }

    /// Insert or overwrite a value (write lock)
    pub fn set(&self, key: String, value: String) {
        tracing::trace!(key = %key, "set");
        self.data.write().insert(key, value);
    }

    /// Get a value by key (read lock)
    pub fn get(&self, key: &str) -> Option<String> {
        let value = self.data.read().get(key).cloned();
        tracing::trace!(key = %key, found = value.is_some(), "get");
        value
    }

    /// Remove a key (write lock)
    ///
    /// Returns whether the key was present. Deleting an absent key has no
    /// effect.
    pub fn delete(&self, key: &str) -> bool {
        let removed = self.data.write().remove(key).is_some();
        tracing::trace!(key = %key, removed, "delete");
        removed
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Copy of the full map at one instant
    pub fn snapshot(&self) -> HashMap<String, String> {
        self.data.read().clone()
    }
}

impl Default for MemTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Replayer for MemTable {
    fn set(&self, key: String, value: String) {
        MemTable::set(self, key, value);
    }

    fn delete(&self, key: &str) -> bool {
        MemTable::delete(self, key)
    }
}
