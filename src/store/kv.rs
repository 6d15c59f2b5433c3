//! In-memory key/value store.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::observability::metrics;
use crate::store::Value;

/// A thread-safe map from key paths to values.
///
/// Readers share the lock; `set` and `merge` take it exclusively, so a merge is
/// never observed half-applied. Keys are only ever inserted or overwritten.
#[derive(Debug, Default)]
pub struct KeyValueStore {
    data: RwLock<HashMap<String, Value>>,
}

impl KeyValueStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a key.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.read().get(key).cloned()
    }

    /// Insert or replace a single key.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        let mut data = self.write();
        data.insert(key.into(), value.into());
        metrics::record_store_size(data.len());
    }

    /// Apply every entry of `entries`, overwriting existing keys.
    pub fn merge(&self, entries: HashMap<String, Value>) {
        let mut data = self.write();
        data.extend(entries);
        metrics::record_store_size(data.len());
    }

    /// Number of keys currently held.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Sorted snapshot of the current keys.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    // A panic while holding the lock cannot leave the map structurally broken,
    // so poisoning is ignored.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Value>> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Value>> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }
}
