//! Cache backend capability.
//!
//! Every node stores its share of the cache in a backend: a Redis or
//! Memcached connector in production, an in-memory map in tests. The ring and
//! the coordinator only ever talk to backends through [`CacheBackend`], and
//! obtain them through a [`BackendFactory`] keyed by [`NodeKind`].

use crate::error::Result;
use crate::key::{Key, Value};
use crate::node::NodeKind;

/// Operations a node-local cache must provide.
///
/// Implementations do their own locking: calls on the same backend must be
/// linearizable, calls on different backends may run concurrently.
pub trait CacheBackend: Send + Sync {
    /// Returns the value stored under `key`, or `None` if absent.
    fn get(&self, key: &Key) -> Result<Option<Value>>;

    /// Stores `value` under `key`, replacing any previous value.
    fn put(&self, key: Key, value: Value) -> Result<()>;

    /// Removes `key`. Removing an absent key is a no-op.
    fn remove(&self, key: &Key) -> Result<()>;

    /// Removes every entry held by this backend.
    fn evict_all(&self) -> Result<()>;

    /// Snapshot of every entry held by this backend.
    fn list_all(&self) -> Result<Vec<(Key, Value)>>;

    /// Snapshots and clears the backend.
    ///
    /// The default is not atomic; backends that can do better should
    /// override it so no write slips in between the snapshot and the clear.
    fn drain(&self) -> Result<Vec<(Key, Value)>> {
        let entries = self.list_all()?;
        self.evict_all()?;
        Ok(entries)
    }

    /// Number of entries held by this backend.
    fn len(&self) -> Result<usize> {
        Ok(self.list_all()?.len())
    }

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// Builds the backend for a node from its kind and location.
pub trait BackendFactory: Send + Sync {
    fn connect(&self, kind: NodeKind, hostname: &str, port: u16) -> Result<Box<dyn CacheBackend>>;
}
