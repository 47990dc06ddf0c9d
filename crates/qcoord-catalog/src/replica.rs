use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;
use qcoord_meta::{KeyLayout, MetaStore};
use qcoord_types::{CollectionId, NodeId, ReplicaId, ResourceGroupName};
use rand::seq::SliceRandom;

use crate::error::CatalogError;
use crate::records::Replica;

struct ReplicaIndex {
    by_id: HashMap<(CollectionId, ReplicaId), Replica>,
    by_collection: HashMap<CollectionId, BTreeSet<ReplicaId>>,
    next_replica_id: i64,
}

impl ReplicaIndex {
    fn new() -> Self {
        Self {
            by_id: HashMap::new(),
            by_collection: HashMap::new(),
            next_replica_id: 1,
        }
    }

    fn insert(&mut self, replica: Replica) {
        self.by_collection
            .entry(replica.collection_id)
            .or_default()
            .insert(replica.replica_id);
        self.by_id.insert((replica.collection_id, replica.replica_id), replica);
    }

    fn remove_collection(&mut self, cid: CollectionId) {
        if let Some(rids) = self.by_collection.remove(&cid) {
            for rid in rids {
                self.by_id.remove(&(cid, rid));
            }
        }
    }
}

/// In-memory index over persisted replica records, one reader-writer lock
/// guarding the whole index per the fixed lock-acquisition order
/// `resourceGroup -> collection -> replica -> distribution`.
///
/// Every mutating method persists through the meta store first and only
/// updates the index once the write has been acknowledged, so a failed
/// persist never leaves the cache ahead of durable state.
pub struct ReplicaManager {
    meta: Arc<dyn MetaStore>,
    keys: KeyLayout,
    inner: RwLock<ReplicaIndex>,
}

impl ReplicaManager {
    pub fn new(meta: Arc<dyn MetaStore>, keys: KeyLayout) -> Self {
        Self {
            meta,
            keys,
            inner: RwLock::new(ReplicaIndex::new()),
        }
    }

    /// Rebuilds the index from the meta store at startup. Per the
    /// fatal-on-partial-view policy, a failed prefix load is propagated
    /// rather than silently starting empty.
    pub async fn load_all(&self) -> Result<(), CatalogError> {
        let prefix = self.keys.replica_prefix_all();
        let entries = self.meta.load_with_prefix(&prefix).await?;
        let mut index = ReplicaIndex::new();
        for (_, value) in entries {
            let replica: Replica = serde_json::from_slice(&value)
                .map_err(|e| CatalogError::IllegalArgument(format!("corrupt replica record: {e}")))?;
            index.next_replica_id = index.next_replica_id.max(i64::from(replica.replica_id) + 1);
            index.insert(replica);
        }
        *self.inner.write() = index;
        Ok(())
    }

    /// Deals `candidate_nodes` round-robin into `replica_number` new
    /// replicas after a single shuffle, so each replica's node count
    /// differs by at most one. Fails with [`CatalogError::InsufficientNodes`]
    /// if there are fewer candidates than replicas requested.
    pub async fn spawn_replicas(
        &self,
        cid: CollectionId,
        replica_number: u32,
        resource_group: ResourceGroupName,
        candidate_nodes: &[NodeId],
    ) -> Result<Vec<Replica>, CatalogError> {
        let requested = replica_number as usize;
        if candidate_nodes.len() < requested {
            return Err(CatalogError::InsufficientNodes {
                available: candidate_nodes.len(),
                requested,
            });
        }

        let mut shuffled = candidate_nodes.to_vec();
        shuffled.shuffle(&mut rand::thread_rng());

        let start_id = {
            let guard = self.inner.read();
            guard.next_replica_id
        };

        let mut replicas: Vec<Replica> = (0..requested)
            .map(|i| Replica::new(cid, ReplicaId::new(start_id + i as i64), resource_group.clone()))
            .collect();

        for (i, node) in shuffled.into_iter().enumerate() {
            replicas[i % requested].nodes.insert(node);
        }

        let entries = replicas
            .iter()
            .map(|r| {
                let key = self.keys.replica(cid, r.replica_id);
                let value = serde_json::to_vec(r).expect("Replica serializes");
                (key, value)
            })
            .collect();
        self.meta.multi_save(entries).await?;

        {
            let mut guard = self.inner.write();
            for replica in replicas.clone() {
                guard.insert(replica);
            }
            guard.next_replica_id = start_id + requested as i64;
        }

        tracing::info!(collection_id = %cid, count = requested, "spawned replicas");
        Ok(replicas)
    }

    pub async fn add_node(&self, cid: CollectionId, rid: ReplicaId, node: NodeId) -> Result<(), CatalogError> {
        let mut replica = self
            .get(cid, rid)
            .ok_or(CatalogError::IllegalArgument(format!("replica {rid} not found")))?;
        replica.nodes.insert(node);

        let key = self.keys.replica(cid, rid);
        let value = serde_json::to_vec(&replica).expect("Replica serializes");
        self.meta.save(&key, value).await?;

        self.inner.write().insert(replica);
        Ok(())
    }

    pub async fn remove_node(&self, cid: CollectionId, rid: ReplicaId, node: NodeId) -> Result<(), CatalogError> {
        let mut replica = self
            .get(cid, rid)
            .ok_or(CatalogError::IllegalArgument(format!("replica {rid} not found")))?;
        replica.nodes.remove(&node);

        let key = self.keys.replica(cid, rid);
        let value = serde_json::to_vec(&replica).expect("Replica serializes");
        self.meta.save(&key, value).await?;

        self.inner.write().insert(replica);
        Ok(())
    }

    /// Relabels a replica's resource group and replaces its node set in one
    /// persisted write — used by `TransferReplica` to move a replica onto a
    /// destination group's nodes atomically with the label change.
    pub async fn reassign(
        &self,
        cid: CollectionId,
        rid: ReplicaId,
        resource_group: ResourceGroupName,
        nodes: BTreeSet<NodeId>,
    ) -> Result<Replica, CatalogError> {
        let mut replica = self
            .get(cid, rid)
            .ok_or(CatalogError::IllegalArgument(format!("replica {rid} not found")))?;
        replica.resource_group = resource_group;
        replica.nodes = nodes;

        let key = self.keys.replica(cid, rid);
        let value = serde_json::to_vec(&replica).expect("Replica serializes");
        self.meta.save(&key, value).await?;

        self.inner.write().insert(replica.clone());
        Ok(replica)
    }

    pub fn get(&self, cid: CollectionId, rid: ReplicaId) -> Option<Replica> {
        self.inner.read().by_id.get(&(cid, rid)).cloned()
    }

    pub fn list_by_collection(&self, cid: CollectionId) -> Vec<Replica> {
        let guard = self.inner.read();
        guard
            .by_collection
            .get(&cid)
            .into_iter()
            .flatten()
            .filter_map(|rid| guard.by_id.get(&(cid, *rid)).cloned())
            .collect()
    }

    /// Returns the replica, if any, that currently holds `node` for this
    /// collection.
    pub fn replica_for_node(&self, cid: CollectionId, node: NodeId) -> Option<Replica> {
        self.list_by_collection(cid)
            .into_iter()
            .find(|r| r.nodes.contains(&node))
    }

    pub async fn remove_collection(&self, cid: CollectionId) -> Result<(), CatalogError> {
        let prefix = self.keys.replica_prefix(cid);
        self.meta.remove_with_prefix(&prefix).await?;
        self.inner.write().remove_collection(cid);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qcoord_meta::MemoryMetaStore;

    fn manager() -> ReplicaManager {
        let meta: Arc<dyn MetaStore> = Arc::new(MemoryMetaStore::new());
        ReplicaManager::new(meta, KeyLayout::new("root"))
    }

    #[tokio::test]
    async fn spawn_fails_with_insufficient_nodes() {
        let mgr = manager();
        let nodes = vec![NodeId::new(1), NodeId::new(2)];
        let err = mgr
            .spawn_replicas(CollectionId::new(1), 3, ResourceGroupName::default_group(), &nodes)
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::InsufficientNodes { .. }));
    }

    #[tokio::test]
    async fn spawn_deals_nodes_round_robin_within_one() {
        let mgr = manager();
        let nodes: Vec<NodeId> = (1..=7).map(NodeId::new).collect();
        let replicas = mgr
            .spawn_replicas(CollectionId::new(1), 3, ResourceGroupName::default_group(), &nodes)
            .await
            .unwrap();

        assert_eq!(replicas.len(), 3);
        let sizes: Vec<usize> = replicas.iter().map(|r| r.nodes.len()).collect();
        assert_eq!(sizes.iter().sum::<usize>(), 7);
        assert!(sizes.iter().max().unwrap() - sizes.iter().min().unwrap() <= 1);
    }

    #[tokio::test]
    async fn replica_partition_invariant_holds_across_replicas() {
        let mgr = manager();
        let nodes: Vec<NodeId> = (1..=10).map(NodeId::new).collect();
        let replicas = mgr
            .spawn_replicas(CollectionId::new(5), 3, ResourceGroupName::default_group(), &nodes)
            .await
            .unwrap();

        let mut seen = std::collections::HashSet::new();
        for replica in &replicas {
            for node in &replica.nodes {
                assert!(seen.insert(*node), "node {node} assigned to more than one replica");
            }
        }
    }

    #[tokio::test]
    async fn add_and_remove_node_persist_and_update_index() {
        let mgr = manager();
        let nodes = vec![NodeId::new(1), NodeId::new(2)];
        let replicas = mgr
            .spawn_replicas(CollectionId::new(1), 1, ResourceGroupName::default_group(), &nodes)
            .await
            .unwrap();
        let rid = replicas[0].replica_id;

        mgr.add_node(CollectionId::new(1), rid, NodeId::new(3)).await.unwrap();
        let replica = mgr.get(CollectionId::new(1), rid).unwrap();
        assert!(replica.nodes.contains(&NodeId::new(3)));

        mgr.remove_node(CollectionId::new(1), rid, NodeId::new(3)).await.unwrap();
        let replica = mgr.get(CollectionId::new(1), rid).unwrap();
        assert!(!replica.nodes.contains(&NodeId::new(3)));
    }
}
