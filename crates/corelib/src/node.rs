//! Node abstractions for the consistent hash ring.
//!
//! Nodes represent the physical cache servers of the cluster. They are
//! identified by a compact `NodeId` that is cheap to compare and hash, carry
//! the backend that actually stores their entries, and remember the ring
//! positions assigned to their virtual replicas.

use crate::backend::{BackendFactory, CacheBackend};
use crate::error::{Error, Result};
use crate::hash::HashFunction;
use crate::key::{Key, Value};
use crate::ring::Position;
use crate::vnode::VirtualNode;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Compact identifier for a node in the cluster.
///
/// Newtype over `u128` so comparisons and hashing are very fast; generated
/// as a random UUID and displayed in hyphenated UUID form.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(from = "Uuid", into = "Uuid")]
pub struct NodeId(pub u128);

impl NodeId {
    pub fn random() -> Self {
        NodeId(Uuid::new_v4().as_u128())
    }
}

impl From<Uuid> for NodeId {
    fn from(uuid: Uuid) -> Self {
        NodeId(uuid.as_u128())
    }
}

impl From<NodeId> for Uuid {
    fn from(id: NodeId) -> Self {
        Uuid::from_u128(id.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Uuid::from_u128(self.0).hyphenated())
    }
}

impl FromStr for NodeId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(NodeId::from)
            .map_err(|e| Error::invalid(format!("invalid node id {:?}: {}", s, e)))
    }
}

/// Kind of cache server behind a node. Only used to pick a backend.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Redis,
    Memcache,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Redis => f.write_str("redis"),
            NodeKind::Memcache => f.write_str("memcache"),
        }
    }
}

impl FromStr for NodeKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("redis") {
            Ok(NodeKind::Redis)
        } else if s.eq_ignore_ascii_case("memcache") {
            Ok(NodeKind::Memcache)
        } else {
            Err(Error::invalid(format!("invalid node type: {}", s)))
        }
    }
}

/// Physical node participating in the ring.
///
/// Shared as `Arc<Node>` between ring snapshots. The backend is owned by the
/// node and never moves; redistribution only copies key/value pairs.
pub struct Node {
    id: NodeId,
    hostname: String,
    port: u16,
    kind: NodeKind,
    positions: RwLock<Vec<Position>>,
    backend: Option<Box<dyn CacheBackend>>,
}

impl Node {
    /// Construct a node with a fresh random id and no backend attached.
    pub fn new(hostname: impl Into<String>, port: u16, kind: NodeKind) -> Self {
        Self::with_id(NodeId::random(), hostname, port, kind)
    }

    pub fn with_id(id: NodeId, hostname: impl Into<String>, port: u16, kind: NodeKind) -> Self {
        Self {
            id,
            hostname: hostname.into(),
            port,
            kind,
            positions: RwLock::new(Vec::new()),
            backend: None,
        }
    }

    /// Attach a backend directly.
    pub fn with_backend(mut self, backend: Box<dyn CacheBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Attach the backend the factory picks for this node's kind and location.
    pub fn connect(self, factory: &dyn BackendFactory) -> Result<Self> {
        let backend = factory.connect(self.kind, &self.hostname, self.port)?;
        Ok(self.with_backend(backend))
    }

    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Positions assigned by the last call to [`Node::hash`].
    pub fn positions(&self) -> Vec<Position> {
        self.positions.read().clone()
    }

    /// Assign ring positions for `replicas` virtual replicas.
    ///
    /// With zero replicas the node gets one position from its plain id,
    /// otherwise one per `"{id}_{i}"` label. Prior positions are replaced.
    pub fn hash(&self, hasher: &dyn HashFunction, replicas: usize) -> Result<Vec<Position>> {
        let positions = if replicas == 0 {
            vec![hasher.position(self.id.to_string().as_bytes())?]
        } else {
            (0..replicas)
                .map(|replica| hasher.position(VirtualNode::label(self.id, replica).as_bytes()))
                .collect::<Result<Vec<_>>>()?
        };
        *self.positions.write() = positions.clone();
        Ok(positions)
    }

    /// The attached backend.
    ///
    /// # Errors
    ///
    /// [`Error::Internal`] when no backend was ever attached.
    pub fn backend(&self) -> Result<&dyn CacheBackend> {
        self.backend
            .as_deref()
            .ok_or_else(|| Error::Internal(format!("cache is not initialized for node {}", self.id)))
    }

    pub fn get(&self, key: &Key) -> Result<Option<Value>> {
        self.backend()?.get(key)
    }

    pub fn put(&self, key: Key, value: Value) -> Result<()> {
        self.backend()?.put(key, value)
    }

    pub fn remove(&self, key: &Key) -> Result<()> {
        self.backend()?.remove(key)
    }

    /// Take every entry out of this node's backend.
    pub fn drain(&self) -> Result<Vec<(Key, Value)>> {
        self.backend()?.drain()
    }

    /// Number of entries currently stored on this node.
    pub fn len(&self) -> Result<usize> {
        self.backend()?.len()
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.backend()?.is_empty()
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("hostname", &self.hostname)
            .field("port", &self.port)
            .field("kind", &self.kind)
            .field("positions", &*self.positions.read())
            .field("backend", &self.backend.is_some())
            .finish()
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{}, {})", self.id, self.hostname, self.port, self.kind)
    }
}
