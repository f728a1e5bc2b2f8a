//! In-memory cache backend.
//!
//! Stands in for the Redis and Memcached connectors: one process-local map
//! per node, guarded by a single lock so [`CacheBackend::drain`] can snapshot
//! and clear atomically.

use corelib::{BackendFactory, CacheBackend, Key, NodeKind, Result, Value};
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::debug;

/// Process-local backend for one node.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<Key, Value>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheBackend for MemoryBackend {
    fn get(&self, key: &Key) -> Result<Option<Value>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn put(&self, key: Key, value: Value) -> Result<()> {
        self.entries.lock().insert(key, value);
        Ok(())
    }

    fn remove(&self, key: &Key) -> Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }

    fn evict_all(&self) -> Result<()> {
        self.entries.lock().clear();
        Ok(())
    }

    fn list_all(&self) -> Result<Vec<(Key, Value)>> {
        Ok(self
            .entries
            .lock()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn drain(&self) -> Result<Vec<(Key, Value)>> {
        let taken = std::mem::take(&mut *self.entries.lock());
        Ok(taken.into_iter().collect())
    }

    fn len(&self) -> Result<usize> {
        Ok(self.entries.lock().len())
    }
}

/// Gives every node a fresh [`MemoryBackend`], whatever its kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryBackendFactory;

impl BackendFactory for MemoryBackendFactory {
    fn connect(&self, kind: NodeKind, hostname: &str, port: u16) -> Result<Box<dyn CacheBackend>> {
        debug!(%kind, hostname, port, "attaching in-memory backend");
        Ok(Box::new(MemoryBackend::new()))
    }
}
