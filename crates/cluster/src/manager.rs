//! Cluster coordinator.
//!
//! The [`NodeManager`] owns the canonical membership, rebuilds the ring on
//! every change and moves cached entries to their new owners.
//!
//! # Concurrency
//!
//! Mutations (`init`, `add`, `crash_remove`, `shutdown`) are serialized by a
//! mutex held for the whole operation, redistribution included. The ring
//! itself is an immutable [`RingIndex`] published behind an `RwLock<Arc<_>>`:
//! lookups clone the `Arc` and never see a half-built ring.
//!
//! Client operations go through [`NodeManager::route`], which holds a shared
//! placement gate. Membership changes hold the gate exclusively from publishing
//! the new ring until every drained entry is re-placed, so a client write is
//! never overwritten by an older value being moved.

use corelib::hash::HashFunction;
use corelib::{CacheBackend, Error, HashAlgorithm, Key, Node, NodeId, Result, RingIndex};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of a membership change that moved entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rebalance {
    /// Nodes whose entries were drained and re-placed.
    pub drained: Vec<NodeId>,
    /// Entries written back through `locate`.
    pub relocated: usize,
}

/// Coordinator for ring membership and redistribution.
pub struct NodeManager {
    hasher: Arc<dyn HashFunction>,
    ring: RwLock<Arc<RingIndex>>,
    mutation: Mutex<()>,
    /// Shared by client operations, exclusive while entries move.
    placement: RwLock<()>,
}

impl NodeManager {
    /// Empty cluster with zero replicas, hashing with `hasher`.
    pub fn new(hasher: Arc<dyn HashFunction>) -> Self {
        Self {
            hasher,
            ring: RwLock::new(Arc::new(RingIndex::empty(0))),
            mutation: Mutex::new(()),
            placement: RwLock::new(()),
        }
    }

    pub fn with_algorithm(algorithm: HashAlgorithm) -> Self {
        Self::new(algorithm.hasher())
    }

    /// Reset the cluster to exactly `nodes`, each with `replica_count` replicas.
    ///
    /// Destructive: the previous membership is dropped and no entries are moved.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] for a negative replica count or repeated ids.
    pub fn init(&self, nodes: Vec<Arc<Node>>, replica_count: i64) -> Result<()> {
        let replicas = usize::try_from(replica_count).map_err(|_| {
            Error::invalid(format!(
                "replica count must be equal or larger than 0, got {}",
                replica_count
            ))
        })?;

        let _guard = self.mutation.lock();
        let ring = RingIndex::build(nodes, replicas, self.hasher.as_ref())?;
        let _placement = self.placement.write();
        info!(
            nodes = ring.node_count(),
            replicas,
            hasher = self.hasher.name(),
            "initialized cluster"
        );
        self.publish(ring, "init");
        Ok(())
    }

    /// Node that owns `key` on the current ring.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] for an empty key, [`Error::Unavailable`]
    /// when the cluster has no members.
    pub fn locate(&self, key: &Key) -> Result<Arc<Node>> {
        let ring = self.ring();
        self.locate_in(&ring, key)
    }

    /// Run `op` on the owner of `key` while no membership change is moving
    /// entries.
    ///
    /// # Errors
    ///
    /// Whatever [`locate`](Self::locate) or `op` report.
    pub fn route<T>(&self, key: &Key, op: impl FnOnce(&Node) -> Result<T>) -> Result<T> {
        let _placement = self.placement.read();
        let owner = self.locate(key)?;
        op(&owner)
    }

    fn locate_in(&self, ring: &RingIndex, key: &Key) -> Result<Arc<Node>> {
        if key.is_empty() {
            return Err(Error::invalid("key can not be empty"));
        }
        if ring.is_empty() {
            return Err(Error::Unavailable(
                "no available node(s), check the cluster status or initialize the node manager".into(),
            ));
        }
        let position = self.hasher.position(key.as_bytes())?;
        ring.owner(position).cloned()
    }

    /// Add `node` to the cluster and pull its share of entries from its ring
    /// neighbors.
    ///
    /// Every entry drained from a neighbor is re-placed with
    /// [`locate`](Self::locate), so the total number of cached entries is
    /// unchanged. Whatever the node's backend still holds from an earlier
    /// membership is discarded first.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if a node with the same id is a member. The
    /// first failure while re-placing entries aborts the operation.
    pub fn add(&self, node: Arc<Node>) -> Result<Rebalance> {
        let _guard = self.mutation.lock();
        let current = self.ring();
        let id = node.id();
        if current.contains(id) {
            return Err(Error::invalid(format!("node {} already exists", id)));
        }

        let next = Arc::new(current.with_node(Arc::clone(&node), self.hasher.as_ref())?);
        let sources = resolve(&next, next.neighbors(id));

        let _placement = self.placement.write();
        clear_stale(&node)?;
        self.publish_arc(Arc::clone(&next), "add");
        info!(node = %id, neighbors = sources.len(), "node added");

        self.redistribute(&next, &sources)
    }

    /// Drop node `id` without moving its entries; they are lost.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if `id` is not a member or is the last one.
    pub fn crash_remove(&self, id: NodeId) -> Result<()> {
        let _guard = self.mutation.lock();
        let current = self.ring();
        let departing = departing(&current, id)?;

        let next = current.without_node(id, self.hasher.as_ref())?;
        let _placement = self.placement.write();
        self.publish(next, "crash");

        let lost = match departing.len() {
            Ok(lost) => lost,
            Err(err) => {
                warn!(node = %id, error = %err, "can not count entries of crashed node");
                0
            }
        };
        metrics::counter!("ringcache_entries_lost_total").increment(lost as u64);
        warn!(node = %id, lost, "node removed without shutdown, its entries are lost");
        Ok(())
    }

    /// Take node `id` out of the cluster and hand its entries to the
    /// remaining nodes.
    ///
    /// The departing node's ring neighbors are re-placed as well: losing a
    /// node at the end of the ring shifts the wraparound boundary, which can
    /// move keys between the neighbors themselves.
    ///
    /// # Errors
    ///
    /// Same preconditions as [`crash_remove`](Self::crash_remove). The first
    /// failure while re-placing entries aborts the operation.
    pub fn shutdown(&self, id: NodeId) -> Result<Rebalance> {
        let _guard = self.mutation.lock();
        let current = self.ring();
        let departing = departing(&current, id)?;

        let mut sources = vec![departing];
        sources.extend(resolve(&current, current.neighbors(id)));

        let next = Arc::new(current.without_node(id, self.hasher.as_ref())?);
        let _placement = self.placement.write();
        self.publish_arc(Arc::clone(&next), "shutdown");
        info!(node = %id, neighbors = sources.len() - 1, "node shutting down");

        self.redistribute(&next, &sources)
    }

    /// Members ordered by ring position.
    pub fn members(&self) -> Vec<Arc<Node>> {
        self.ring().members_by_position()
    }

    pub fn node(&self, id: NodeId) -> Option<Arc<Node>> {
        self.ring().node(&id).cloned()
    }

    /// Current ring snapshot.
    pub fn ring(&self) -> Arc<RingIndex> {
        Arc::clone(&self.ring.read())
    }

    pub fn replica_count(&self) -> usize {
        self.ring().replica_count()
    }

    pub fn hasher(&self) -> &dyn HashFunction {
        self.hasher.as_ref()
    }

    fn publish(&self, ring: RingIndex, action: &'static str) {
        self.publish_arc(Arc::new(ring), action);
    }

    fn publish_arc(&self, ring: Arc<RingIndex>, action: &'static str) {
        metrics::gauge!("ringcache_ring_members").set(ring.node_count() as f64);
        metrics::gauge!("ringcache_ring_tokens").set(ring.token_count() as f64);
        metrics::counter!("ringcache_membership_changes_total", "action" => action).increment(1);
        *self.ring.write() = ring;
    }

    /// Drain every source and write each entry to its owner on `ring`.
    ///
    /// Callers hold the placement gate exclusively for the whole call.
    fn redistribute(&self, ring: &RingIndex, sources: &[Arc<Node>]) -> Result<Rebalance> {
        let mut report = Rebalance::default();
        for source in sources {
            let entries = source.drain()?;
            let total = entries.len();
            debug!(node = %source.id(), entries = total, "draining node");

            for (done, (key, value)) in entries.into_iter().enumerate() {
                let placed = self
                    .locate_in(ring, &key)
                    .and_then(|owner| owner.put(key, value));
                if let Err(err) = placed {
                    warn!(
                        node = %source.id(),
                        lost = total - done,
                        error = %err,
                        "redistribution aborted"
                    );
                    return Err(err);
                }
                report.relocated += 1;
            }
            report.drained.push(source.id());
        }
        metrics::counter!("ringcache_entries_relocated_total").increment(report.relocated as u64);
        debug!(drained = report.drained.len(), relocated = report.relocated, "redistribution complete");
        Ok(report)
    }
}

impl std::fmt::Debug for NodeManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeManager")
            .field("hasher", &self.hasher.name())
            .field("ring", &self.ring())
            .finish()
    }
}

/// Membership checks shared by crash removal and shutdown.
fn departing(ring: &RingIndex, id: NodeId) -> Result<Arc<Node>> {
    let node = ring
        .node(&id)
        .cloned()
        .ok_or_else(|| Error::invalid(format!("node to be removed not found: {}", id)))?;
    if ring.node_count() == 1 {
        return Err(Error::invalid("can not remove the last node"));
    }
    Ok(node)
}

/// Empty the backend of a node about to join; entries it kept from an earlier
/// membership are not restored.
fn clear_stale(node: &Node) -> Result<()> {
    let backend = match node.backend() {
        Ok(backend) => backend,
        Err(_) => return Ok(()),
    };
    let stale = backend.len()?;
    if stale > 0 {
        backend.evict_all()?;
        debug!(node = %node.id(), stale, "discarded entries held before joining");
    }
    Ok(())
}

fn resolve(ring: &RingIndex, ids: Vec<NodeId>) -> Vec<Arc<Node>> {
    ids.iter().filter_map(|id| ring.node(id).cloned()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::DistributedCache;
    use crate::memory::MemoryBackendFactory;
    use corelib::{NodeKind, Value};

    fn node() -> Arc<Node> {
        Arc::new(
            Node::new("localhost", 6379, NodeKind::Redis)
                .connect(&MemoryBackendFactory)
                .unwrap(),
        )
    }

    fn manager(nodes: usize, replicas: i64) -> (NodeManager, Vec<Arc<Node>>) {
        let manager = NodeManager::with_algorithm(HashAlgorithm::Xxh3);
        let members: Vec<_> = (0..nodes).map(|_| node()).collect();
        manager.init(members.clone(), replicas).unwrap();
        (manager, members)
    }

    #[test]
    fn test_negative_replicas_rejected() {
        let manager = NodeManager::with_algorithm(HashAlgorithm::Xxh3);
        let err = manager.init(vec![node()], -1).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_init_rejects_duplicate_ids() {
        let manager = NodeManager::with_algorithm(HashAlgorithm::Xxh3);
        let n = node();
        let err = manager.init(vec![Arc::clone(&n), n], 0).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_init_is_destructive_reset() {
        let (manager, first) = manager(3, 2);
        assert_eq!(manager.ring().token_count(), 6);

        let replacement = vec![node()];
        manager.init(replacement.clone(), 4).unwrap();
        assert_eq!(manager.members().len(), 1);
        assert_eq!(manager.replica_count(), 4);
        assert_eq!(manager.ring().token_count(), 4);
        assert!(manager.node(first[0].id()).is_none());
        assert!(manager.node(replacement[0].id()).is_some());
    }

    #[test]
    fn test_locate_validation() {
        let manager = NodeManager::with_algorithm(HashAlgorithm::Xxh3);
        assert!(matches!(
            manager.locate(&Key::from("1")),
            Err(Error::Unavailable(_))
        ));

        manager.init(vec![node()], 0).unwrap();
        assert!(matches!(
            manager.locate(&Key::default()),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_locate_empty_after_init_with_no_nodes() {
        let (manager, _) = manager(0, 0);
        assert!(matches!(
            manager.locate(&Key::from("1")),
            Err(Error::Unavailable(_))
        ));
    }

    #[test]
    fn test_locate_is_repeatable() {
        let (manager, _) = manager(5, 3);
        for i in 0..100u32 {
            let key = Key::from(i);
            let first = manager.locate(&key).unwrap().id();
            let second = manager.locate(&key).unwrap().id();
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_locate_matches_nearest_position() {
        let (manager, nodes) = manager(3, 0);
        let hasher = HashAlgorithm::Xxh3.hasher();
        let positions: Vec<(NodeId, f64)> = nodes
            .iter()
            .map(|n| (n.id(), n.positions()[0].as_f64()))
            .collect();
        let max = positions.iter().map(|(_, p)| *p).fold(f64::MIN, f64::max);
        let (min_id, _) = positions
            .iter()
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .copied()
            .unwrap();

        for i in 0..1000u32 {
            let key = Key::from(i);
            let hash = hasher.position(key.as_bytes()).unwrap().as_f64();
            let owner = manager.locate(&key).unwrap();
            if hash > max {
                assert_eq!(owner.id(), min_id);
            } else {
                let own = (hash - owner.positions()[0].as_f64()).abs();
                for (_, p) in &positions {
                    assert!(own <= (hash - p).abs());
                }
            }
        }
    }

    #[test]
    fn test_add_duplicate_rejected() {
        let (manager, nodes) = manager(1, 0);
        let err = manager.add(Arc::clone(&nodes[0])).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_add_to_empty_cluster() {
        let manager = NodeManager::with_algorithm(HashAlgorithm::Xxh3);
        let n = node();
        let report = manager.add(Arc::clone(&n)).unwrap();
        assert!(report.drained.is_empty());
        assert_eq!(report.relocated, 0);
        assert_eq!(manager.locate(&Key::from("k")).unwrap().id(), n.id());
    }

    #[test]
    fn test_add_drains_only_neighbors() {
        let (manager, _) = manager(6, 0);
        let newcomer = node();
        let report = manager.add(Arc::clone(&newcomer)).unwrap();
        assert_eq!(report.drained.len(), 2);
        assert!(!report.drained.contains(&newcomer.id()));
    }

    #[test]
    fn test_remove_validation() {
        let (manager, nodes) = manager(1, 0);
        let stranger = NodeId::random();

        assert!(matches!(manager.crash_remove(stranger), Err(Error::InvalidArgument(_))));
        assert!(matches!(manager.shutdown(stranger), Err(Error::InvalidArgument(_))));
        // The last node can not leave.
        assert!(matches!(manager.crash_remove(nodes[0].id()), Err(Error::InvalidArgument(_))));
        assert!(matches!(manager.shutdown(nodes[0].id()), Err(Error::InvalidArgument(_))));
        assert_eq!(manager.members().len(), 1);
    }

    #[test]
    fn test_removed_node_can_rejoin() {
        let (manager, nodes) = manager(3, 2);
        let leaving = Arc::clone(&nodes[1]);
        leaving.put(Key::from("stale"), Value::from_static(b"v")).unwrap();

        manager.crash_remove(leaving.id()).unwrap();
        assert!(manager.node(leaving.id()).is_none());
        assert!(matches!(manager.crash_remove(leaving.id()), Err(Error::InvalidArgument(_))));

        manager.add(Arc::clone(&leaving)).unwrap();
        assert!(manager.node(leaving.id()).is_some());
        assert_eq!(manager.ring().token_count(), 6);

        // Entries lost in the crash stay lost.
        let stale = Key::from("stale");
        assert_eq!(leaving.get(&stale).unwrap(), None);
        let manager = Arc::new(manager);
        let cache = DistributedCache::new(Arc::clone(&manager));
        assert_eq!(cache.get(&stale).unwrap(), None);
    }

    /// Backend that fails every listing, like a connector whose server went away.
    struct Unreadable;

    impl CacheBackend for Unreadable {
        fn get(&self, _key: &Key) -> Result<Option<Value>> {
            Ok(None)
        }

        fn put(&self, _key: Key, _value: Value) -> Result<()> {
            Ok(())
        }

        fn remove(&self, _key: &Key) -> Result<()> {
            Ok(())
        }

        fn evict_all(&self) -> Result<()> {
            Ok(())
        }

        fn list_all(&self) -> Result<Vec<(Key, Value)>> {
            Err(Error::Backend("connection refused".into()))
        }
    }

    #[test]
    fn test_crash_remove_with_unreadable_backend() {
        let manager = NodeManager::with_algorithm(HashAlgorithm::Xxh3);
        let broken = Arc::new(Node::new("localhost", 2, NodeKind::Redis).with_backend(Box::new(Unreadable)));
        manager.init(vec![node(), node(), Arc::clone(&broken)], 1).unwrap();

        manager.crash_remove(broken.id()).unwrap();
        assert!(manager.node(broken.id()).is_none());
        assert_eq!(manager.members().len(), 2);
    }

    #[test]
    fn test_route_runs_on_owner() {
        let (manager, _) = manager(4, 2);
        let key = Key::from("k");
        let owner = manager.locate(&key).unwrap().id();
        let routed = manager.route(&key, |node| Ok(node.id())).unwrap();
        assert_eq!(routed, owner);
        assert!(matches!(
            manager.route(&Key::default(), |node| Ok(node.id())),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_members_ordered_by_position() {
        let (manager, _) = manager(4, 0);
        let members = manager.members();
        assert_eq!(members.len(), 4);
        for pair in members.windows(2) {
            assert!(pair[0].positions()[0] <= pair[1].positions()[0]);
        }
    }

    #[test]
    fn test_add_fails_when_neighbor_has_no_backend() {
        let manager = NodeManager::with_algorithm(HashAlgorithm::Xxh3);
        let broken = Arc::new(Node::new("localhost", 1, NodeKind::Memcache));
        manager.init(vec![Arc::clone(&broken)], 0).unwrap();

        let err = manager.add(node()).unwrap_err();
        match err {
            Error::Internal(msg) => assert!(msg.contains(&broken.id().to_string())),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
