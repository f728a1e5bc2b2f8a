//! Hash ring index.
//!
//! A [`RingIndex`] is an immutable snapshot of cluster membership: the sorted
//! virtual node entries plus the nodes they point back to. Membership changes
//! never edit an index in place; they build a fresh one with
//! [`RingIndex::with_node`] / [`RingIndex::without_node`] and publish it.

use crate::error::{Error, Result};
use crate::hash::HashFunction;
use crate::node::{Node, NodeId};
use crate::ring::Position;
use crate::vnode::VirtualNode;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Index of the entry closest to `target` in ascending `positions`.
///
/// Exact matches win. Otherwise the two entries straddling `target` are
/// compared and the nearer one is returned, the upper one on a tie. Targets
/// below the first entry clamp to `0`, targets above the last clamp to the
/// last index. `positions` must not be empty.
pub fn closest_index(positions: &[Position], target: Position) -> usize {
    debug_assert!(!positions.is_empty());
    match positions.binary_search(&target) {
        Ok(index) => index,
        Err(0) => 0,
        Err(insert) if insert >= positions.len() => positions.len() - 1,
        Err(insert) => {
            let below = insert - 1;
            let above = insert;
            if target.distance(positions[below]) < target.distance(positions[above]) {
                below
            } else {
                above
            }
        }
    }
}

/// Sorted ring of virtual nodes.
#[derive(Debug, Clone, Default)]
pub struct RingIndex {
    entries: Vec<VirtualNode>,
    positions: Vec<Position>,
    nodes: HashMap<NodeId, Arc<Node>>,
    /// Membership in insertion order.
    order: Vec<NodeId>,
    replica_count: usize,
}

impl RingIndex {
    /// An empty ring that will give `replica_count` replicas to its nodes.
    pub fn empty(replica_count: usize) -> Self {
        Self {
            replica_count,
            ..Self::default()
        }
    }

    /// Build a ring from scratch, assigning positions to every node.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if two nodes share an id, or whatever the
    /// hash function reports.
    pub fn build(nodes: Vec<Arc<Node>>, replica_count: usize, hasher: &dyn HashFunction) -> Result<Self> {
        let mut entries = Vec::with_capacity(nodes.len() * replica_count.max(1));
        for node in &nodes {
            for position in node.hash(hasher, replica_count)? {
                entries.push(VirtualNode::new(position, node.id()));
            }
        }
        let ring = Self::from_parts(nodes, entries, replica_count)?;
        debug!(
            nodes = ring.node_count(),
            tokens = ring.token_count(),
            replicas = replica_count,
            hasher = hasher.name(),
            "rebuilt hash ring"
        );
        Ok(ring)
    }

    /// Assemble a ring from already placed entries.
    ///
    /// Entries are stable-sorted by position; every entry must point at one of
    /// `nodes`.
    pub fn from_parts(nodes: Vec<Arc<Node>>, mut entries: Vec<VirtualNode>, replica_count: usize) -> Result<Self> {
        let mut map = HashMap::with_capacity(nodes.len());
        let mut order = Vec::with_capacity(nodes.len());
        for node in nodes {
            let id = node.id();
            if map.insert(id, node).is_some() {
                return Err(Error::invalid(format!("node {} appears more than once", id)));
            }
            order.push(id);
        }
        if let Some(orphan) = entries.iter().find(|entry| !map.contains_key(&entry.node_id)) {
            return Err(Error::invalid(format!("ring entry {} has no member node", orphan)));
        }

        entries.sort_by_key(|entry| entry.position);
        let positions = entries.iter().map(|entry| entry.position).collect();

        Ok(Self {
            entries,
            positions,
            nodes: map,
            order,
            replica_count,
        })
    }

    /// A new ring with `node` added and every position recomputed.
    pub fn with_node(&self, node: Arc<Node>, hasher: &dyn HashFunction) -> Result<Self> {
        if self.contains(node.id()) {
            return Err(Error::invalid(format!("node {} already exists", node.id())));
        }
        let mut members: Vec<Arc<Node>> = self.nodes().cloned().collect();
        members.push(node);
        Self::build(members, self.replica_count, hasher)
    }

    /// A new ring without node `id`, every position recomputed.
    pub fn without_node(&self, id: NodeId, hasher: &dyn HashFunction) -> Result<Self> {
        if !self.contains(id) {
            return Err(Error::invalid(format!("node {} not found", id)));
        }
        let members = self.nodes().filter(|node| node.id() != id).cloned().collect();
        Self::build(members, self.replica_count, hasher)
    }

    /// Index of the entry that owns `position`.
    ///
    /// 1. empty ring: [`Error::Unavailable`];
    /// 2. a single member owns everything;
    /// 3. past the last entry the ring wraps to index 0;
    /// 4. otherwise the closest entry, see [`closest_index`].
    pub fn owner_index(&self, position: Position) -> Result<usize> {
        let last = match self.positions.last() {
            Some(last) => *last,
            None => {
                return Err(Error::Unavailable(
                    "no available node(s), check the cluster status or initialize the node manager".into(),
                ))
            }
        };
        if self.nodes.len() == 1 || position > last {
            return Ok(0);
        }
        Ok(closest_index(&self.positions, position))
    }

    /// The node that owns `position`.
    pub fn owner(&self, position: Position) -> Result<&Arc<Node>> {
        let index = self.owner_index(position)?;
        let id = self.entries[index].node_id;
        self.nodes
            .get(&id)
            .ok_or_else(|| Error::Internal(format!("ring entry points at unknown node {}", id)))
    }

    /// Distinct nodes adjacent to the entries of node `id`.
    ///
    /// For every entry of `id`, walks backward and forward (wrapping around)
    /// to the first entry owned by some other node. These are the only nodes
    /// whose keys can change owner when `id` joins or leaves the ring.
    pub fn neighbors(&self, id: NodeId) -> Vec<NodeId> {
        let len = self.entries.len();
        let mut found = Vec::new();
        for (index, entry) in self.entries.iter().enumerate() {
            if entry.node_id != id {
                continue;
            }
            // Backward is a step of len - 1 modulo len.
            for step in [len - 1, 1] {
                let mut cursor = index;
                for _ in 1..len {
                    cursor = (cursor + step) % len;
                    let owner = self.entries[cursor].node_id;
                    if owner != id {
                        if !found.contains(&owner) {
                            found.push(owner);
                        }
                        break;
                    }
                }
            }
        }
        found
    }

    pub fn entries(&self) -> &[VirtualNode] {
        &self.entries
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn node(&self, id: &NodeId) -> Option<&Arc<Node>> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Members in the order they joined.
    pub fn nodes(&self) -> impl Iterator<Item = &Arc<Node>> + '_ {
        self.order.iter().filter_map(move |id| self.nodes.get(id))
    }

    /// Distinct members ordered by their lowest ring position.
    pub fn members_by_position(&self) -> Vec<Arc<Node>> {
        let mut seen = Vec::with_capacity(self.nodes.len());
        let mut members = Vec::with_capacity(self.nodes.len());
        for entry in &self.entries {
            if seen.contains(&entry.node_id) {
                continue;
            }
            seen.push(entry.node_id);
            if let Some(node) = self.nodes.get(&entry.node_id) {
                members.push(Arc::clone(node));
            }
        }
        members
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn token_count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn replica_count(&self) -> usize {
        self.replica_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeKind;

    fn pos(value: f64) -> Position {
        Position::new(value).unwrap()
    }

    fn positions(values: &[f64]) -> Vec<Position> {
        values.iter().copied().map(pos).collect()
    }

    fn node(n: u128) -> Arc<Node> {
        Arc::new(Node::with_id(NodeId(n), format!("node{}", n), 6379, NodeKind::Redis))
    }

    #[test]
    fn test_closest_index_nearest() {
        let ring = positions(&[0.101, 0.202, 0.303, 0.404]);
        assert_eq!(closest_index(&ring, pos(0.232)), 1);
        assert_eq!(closest_index(&ring, pos(0.292)), 2);
    }

    #[test]
    fn test_closest_index_exact_match() {
        let ring = positions(&[0.101, 0.202, 0.303, 0.404]);
        assert_eq!(closest_index(&ring, pos(0.101)), 0);
        assert_eq!(closest_index(&ring, pos(0.404)), 3);
    }

    #[test]
    fn test_closest_index_clamps() {
        let ring = positions(&[0.101, 0.202, 0.303, 0.404]);
        assert_eq!(closest_index(&ring, pos(0.001)), 0);
        assert_eq!(closest_index(&ring, pos(0.9)), 3);
    }

    #[test]
    fn test_closest_index_tie_goes_up() {
        let ring = positions(&[0.25, 0.75]);
        assert_eq!(closest_index(&ring, pos(0.5)), 1);
    }

    #[test]
    fn test_closest_index_duplicates() {
        let ring = positions(&[0.101, 0.101, 0.303, 0.404]);
        let index = closest_index(&ring, pos(0.101));
        assert!(index <= 1);
        assert_eq!(closest_index(&ring, pos(0.15)), 1);
        assert_eq!(closest_index(&ring, pos(0.25)), 2);
    }

    #[test]
    fn test_empty_ring_is_unavailable() {
        let ring = RingIndex::empty(3);
        assert!(matches!(ring.owner_index(pos(0.5)), Err(Error::Unavailable(_))));
        assert!(ring.neighbors(NodeId(1)).is_empty());
    }

    #[test]
    fn test_single_node_owns_everything() {
        let entries = vec![
            VirtualNode::new(pos(0.4), NodeId(1)),
            VirtualNode::new(pos(0.6), NodeId(1)),
        ];
        let ring = RingIndex::from_parts(vec![node(1)], entries, 2).unwrap();
        for probe in [0.0, 0.39, 0.5, 0.99] {
            assert_eq!(ring.owner(pos(probe)).unwrap().id(), NodeId(1));
            assert_eq!(ring.owner_index(pos(probe)).unwrap(), 0);
        }
    }

    #[test]
    fn test_wraparound_above_max() {
        let entries = vec![
            VirtualNode::new(pos(0.3), NodeId(3)),
            VirtualNode::new(pos(0.1), NodeId(1)),
            VirtualNode::new(pos(0.2), NodeId(2)),
        ];
        let ring = RingIndex::from_parts(vec![node(1), node(2), node(3)], entries, 0).unwrap();
        // 0.95 is far closer to 0.3 than to 0.1, yet wraps to the minimum.
        assert_eq!(ring.owner(pos(0.95)).unwrap().id(), NodeId(1));
        assert_eq!(ring.owner(pos(0.31)).unwrap().id(), NodeId(1));
        assert_eq!(ring.owner(pos(0.3)).unwrap().id(), NodeId(3));
    }

    #[test]
    fn test_below_min_clamps_without_modular_distance() {
        let entries = vec![
            VirtualNode::new(pos(0.5), NodeId(1)),
            VirtualNode::new(pos(0.6), NodeId(2)),
            VirtualNode::new(pos(0.98), NodeId(3)),
        ];
        let ring = RingIndex::from_parts(vec![node(1), node(2), node(3)], entries, 0).unwrap();
        // Modular distance would pick 0.98; the ring clamps to index 0 instead.
        assert_eq!(ring.owner(pos(0.01)).unwrap().id(), NodeId(1));
    }

    #[test]
    fn test_from_parts_rejects_orphans_and_duplicates() {
        let orphan = vec![VirtualNode::new(pos(0.5), NodeId(9))];
        assert!(RingIndex::from_parts(vec![node(1)], orphan, 0).is_err());
        assert!(RingIndex::from_parts(vec![node(1), node(1)], Vec::new(), 0).is_err());
    }

    #[test]
    fn test_stable_sort_keeps_insertion_order_on_ties() {
        let entries = vec![
            VirtualNode::new(pos(0.5), NodeId(2)),
            VirtualNode::new(pos(0.5), NodeId(1)),
        ];
        let ring = RingIndex::from_parts(vec![node(1), node(2)], entries, 0).unwrap();
        assert_eq!(ring.entries()[0].node_id, NodeId(2));
        assert_eq!(ring.entries()[1].node_id, NodeId(1));
    }

    #[test]
    fn test_neighbors_middle_and_edges() {
        let entries = vec![
            VirtualNode::new(pos(0.1), NodeId(1)),
            VirtualNode::new(pos(0.2), NodeId(2)),
            VirtualNode::new(pos(0.3), NodeId(3)),
            VirtualNode::new(pos(0.4), NodeId(4)),
        ];
        let ring = RingIndex::from_parts(vec![node(1), node(2), node(3), node(4)], entries, 0).unwrap();
        assert_eq!(ring.neighbors(NodeId(2)), vec![NodeId(1), NodeId(3)]);
        // First entry: (last, index 1).
        assert_eq!(ring.neighbors(NodeId(1)), vec![NodeId(4), NodeId(2)]);
        // Last entry: (second to last, index 0).
        assert_eq!(ring.neighbors(NodeId(4)), vec![NodeId(3), NodeId(1)]);
    }

    #[test]
    fn test_neighbors_skip_own_adjacent_replicas() {
        let entries = vec![
            VirtualNode::new(pos(0.1), NodeId(1)),
            VirtualNode::new(pos(0.2), NodeId(2)),
            VirtualNode::new(pos(0.3), NodeId(2)),
            VirtualNode::new(pos(0.4), NodeId(3)),
            VirtualNode::new(pos(0.5), NodeId(1)),
        ];
        let ring = RingIndex::from_parts(vec![node(1), node(2), node(3)], entries, 2).unwrap();
        assert_eq!(ring.neighbors(NodeId(2)), vec![NodeId(1), NodeId(3)]);
        // Node 1 sits at both ends; its replicas wrap onto each other.
        assert_eq!(ring.neighbors(NodeId(1)), vec![NodeId(3), NodeId(2)]);
    }

    #[test]
    fn test_neighbors_of_sole_member() {
        let entries = vec![
            VirtualNode::new(pos(0.1), NodeId(1)),
            VirtualNode::new(pos(0.2), NodeId(1)),
        ];
        let ring = RingIndex::from_parts(vec![node(1)], entries, 2).unwrap();
        assert!(ring.neighbors(NodeId(1)).is_empty());
    }

    #[test]
    fn test_members_by_position() {
        let entries = vec![
            VirtualNode::new(pos(0.7), NodeId(1)),
            VirtualNode::new(pos(0.2), NodeId(2)),
            VirtualNode::new(pos(0.4), NodeId(1)),
        ];
        let ring = RingIndex::from_parts(vec![node(1), node(2)], entries, 2).unwrap();
        let ids: Vec<NodeId> = ring.members_by_position().iter().map(|n| n.id()).collect();
        assert_eq!(ids, vec![NodeId(2), NodeId(1)]);
        let joined: Vec<NodeId> = ring.nodes().map(|n| n.id()).collect();
        assert_eq!(joined, vec![NodeId(1), NodeId(2)]);
    }
}
