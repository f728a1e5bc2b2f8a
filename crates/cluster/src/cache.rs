//! Client-facing distributed cache.
//!
//! The nodes behind the cache are invisible to the client: every call is
//! validated, routed through [`NodeManager::route`] and forwarded to the
//! owning node's backend. Calls wait while a membership change is moving
//! entries.
//!
//! ```no_run
//! use std::sync::Arc;
//! use cluster::{DistributedCache, MemoryBackendFactory, NodeManager};
//! use corelib::{CacheBackend, HashAlgorithm, Key, Node, NodeKind, Value};
//!
//! # fn main() -> corelib::Result<()> {
//! let manager = Arc::new(NodeManager::with_algorithm(HashAlgorithm::Xxh3));
//! let node = Node::new("10.0.0.1", 6379, NodeKind::Redis).connect(&MemoryBackendFactory)?;
//! manager.init(vec![Arc::new(node)], 3)?;
//!
//! let cache = DistributedCache::new(manager);
//! cache.put(Key::from("key1"), Value::from_static(b"value1"))?;
//! # Ok(())
//! # }
//! ```

use crate::manager::NodeManager;
use corelib::{CacheBackend, Error, Key, Node, Result, Value};
use std::sync::Arc;

/// Single logical cache spread over the members of a [`NodeManager`].
#[derive(Debug, Clone)]
pub struct DistributedCache {
    manager: Arc<NodeManager>,
}

impl DistributedCache {
    pub fn new(manager: Arc<NodeManager>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &Arc<NodeManager> {
        &self.manager
    }

    /// Run `op` on the owner of `key`, checked to have a usable backend.
    fn route<T>(&self, key: &Key, op: impl FnOnce(&Node) -> Result<T>) -> Result<T> {
        if key.is_empty() {
            return Err(Error::invalid("key can't be empty"));
        }
        self.manager.route(key, |node| {
            node.backend()?;
            op(node)
        })
    }
}

impl CacheBackend for DistributedCache {
    fn get(&self, key: &Key) -> Result<Option<Value>> {
        self.route(key, |node| node.get(key))
    }

    fn put(&self, key: Key, value: Value) -> Result<()> {
        if value.is_empty() {
            return Err(Error::invalid("value can't be empty"));
        }
        let lookup = key.clone();
        self.route(&lookup, move |node| node.put(key, value))
    }

    fn remove(&self, key: &Key) -> Result<()> {
        self.route(key, |node| node.remove(key))
    }

    fn evict_all(&self) -> Result<()> {
        Err(Error::Unsupported(
            "can't evict all entries from distributed cache for all nodes".into(),
        ))
    }

    fn list_all(&self) -> Result<Vec<(Key, Value)>> {
        Err(Error::Unsupported(
            "can't get all entries from distributed cache for all nodes".into(),
        ))
    }
}
