//! Virtual node abstractions.
//!
//! # Virtual Nodes (VNodes) Concept
//!
//! Instead of each physical node having a single position on the ring, each
//! node can own several positions (virtual replicas). This provides:
//!
//! 1. **Better Load Distribution**: More positions = smoother distribution of keys
//! 2. **Gradual Rebalancing**: When nodes join/leave, only a fraction of keys move
//!
//! With a replica count of `R > 0` a node owns `R` entries labelled
//! `"{node_id}_{i}"`; with `R = 0` it owns one entry derived from its plain id.
//!
//! # Performance Characteristics
//!
//! - **Memory**: O(R) per node
//! - **Lookup**: O(log n) where n = total entries on the ring

use crate::node::NodeId;
use crate::ring::Position;

/// A virtual node: one entry of the hash ring.
///
/// # Invariants
///
/// - Every `VirtualNode` belongs to exactly one physical node
/// - Entries are ordered by position (ties are kept in insertion order by the
///   ring's stable sort)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VirtualNode {
    /// Position on the ring.
    pub position: Position,

    /// The physical node that owns this virtual node.
    ///
    /// Multiple virtual nodes share the same `node_id`. A lookup finds the
    /// entry, then uses this id to route to the physical node.
    pub node_id: NodeId,
}

impl VirtualNode {
    #[inline]
    pub fn new(position: Position, node_id: NodeId) -> Self {
        Self { position, node_id }
    }

    /// Label hashed to place replica `replica` of `node_id`.
    pub fn label(node_id: NodeId, replica: usize) -> String {
        format!("{}_{}", node_id, replica)
    }

    #[inline]
    pub fn position(&self) -> Position {
        self.position
    }

    #[inline]
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }
}

impl std::fmt::Display for VirtualNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "VNode(position={}, node={})", self.position, self.node_id)
    }
}
