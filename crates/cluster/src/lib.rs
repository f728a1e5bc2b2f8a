//! Distributed cache cluster.
//!
//! This crate ties the ring from `corelib` to live nodes:
//! - [`NodeManager`] coordinates membership and moves entries on change
//! - [`DistributedCache`] is the single cache clients talk to
//! - [`MemoryBackend`] is the in-process backend used by nodes in tests and
//!   simulations

pub mod cache;
pub mod manager;
pub mod memory;

pub use cache::DistributedCache;
pub use manager::{NodeManager, Rebalance};
pub use memory::{MemoryBackend, MemoryBackendFactory};
