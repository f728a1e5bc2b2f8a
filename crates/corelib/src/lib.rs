//! Core library for the ring cache.
//!
//! This crate provides the fundamental abstractions for consistent hashing:
//! - Hash functions mapping keys and node labels into `[0, 1)`
//! - Ring positions and the sorted ring index with its placement rule
//! - Nodes, virtual nodes and the cache backend capability they carry

pub mod backend;
pub mod error;
pub mod hash;
pub mod key;
pub mod node;
pub mod ring;
pub mod vnode;

pub use backend::{BackendFactory, CacheBackend};
pub use error::{Error, Result};
pub use hash::{HashAlgorithm, HashFunction};
pub use key::{Key, Value};
pub use node::{Node, NodeId, NodeKind};
pub use ring::{Position, RingIndex};
pub use vnode::VirtualNode;
