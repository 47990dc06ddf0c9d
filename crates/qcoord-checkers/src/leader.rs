use std::sync::Arc;
use std::time::{Duration, Instant};

use qcoord_catalog::Catalog;
use qcoord_distribution::DistributionManager;
use qcoord_target::TargetManager;
use qcoord_types::NodeId;

const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(30);

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LeaderCheckReport {
    pub leaderships_cleared: usize,
}

/// Marks a shard leaderless when its reporting node's heartbeat has gone
/// stale, without declaring the node fully offline — that is the session
/// layer's call, made independently on an explicit disconnect.
pub struct LeaderChecker {
    catalog: Arc<Catalog>,
    distribution: Arc<DistributionManager>,
    target: Arc<TargetManager>,
    stale_after: Duration,
}

impl LeaderChecker {
    pub fn new(catalog: Arc<Catalog>, distribution: Arc<DistributionManager>, target: Arc<TargetManager>) -> Self {
        Self {
            catalog,
            distribution,
            target,
            stale_after: DEFAULT_STALE_AFTER,
        }
    }

    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    pub fn tick(&self) -> LeaderCheckReport {
        let mut report = LeaderCheckReport::default();
        let now = Instant::now();
        for collection in self.catalog.collections.list() {
            let Some(current) = self.target.current(collection.collection_id) else { continue };
            for replica in self.catalog.replicas.list_by_collection(collection.collection_id) {
                let nodes: Vec<NodeId> = replica.nodes.iter().copied().collect();
                for channel in current.channels.keys() {
                    let Some(leader) = self.distribution.shard_leader(&nodes, channel) else { continue };
                    let stale = match self.distribution.last_heartbeat(leader) {
                        Some(last) => now.duration_since(last) >= self.stale_after,
                        None => true,
                    };
                    if stale {
                        self.distribution.clear_leadership(leader);
                        tracing::warn!(node_id = %leader, channel = %channel, "cleared stale shard leadership");
                        report.leaderships_cleared += 1;
                    }
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qcoord_catalog::CollectionLoadInfo;
    use qcoord_distribution::ShardLeadership;
    use qcoord_meta::{KeyLayout, MemoryMetaStore, MetaStore};
    use qcoord_target::{DmChannelInfo, TargetSnapshot};
    use qcoord_types::{ChannelName, CollectionId, LoadType, MsgPosition, ResourceGroupName, Timestamp};

    fn catalog() -> Arc<Catalog> {
        let meta: Arc<dyn MetaStore> = Arc::new(MemoryMetaStore::new());
        Arc::new(Catalog::new(meta, KeyLayout::new("root")))
    }

    async fn with_one_replica(catalog: &Catalog, cid: CollectionId, nodes: &[NodeId]) {
        catalog
            .collections
            .persist(CollectionLoadInfo::new(cid, 1, LoadType::Collection, vec![ResourceGroupName::default_group()]))
            .await
            .unwrap();
        catalog
            .replicas
            .spawn_replicas(cid, 1, ResourceGroupName::default_group(), nodes)
            .await
            .unwrap();
    }

    fn snapshot_with_channel(name: &str) -> TargetSnapshot {
        let mut snapshot = TargetSnapshot::default();
        snapshot.channels.insert(
            ChannelName::new(name),
            DmChannelInfo { channel: ChannelName::new(name), seek_position: MsgPosition::new(name, Vec::new(), Timestamp::new(0)) },
        );
        snapshot
    }

    fn leadership(channel: &str, leader: NodeId) -> ShardLeadership {
        ShardLeadership {
            channel: ChannelName::new(channel),
            leader_node: leader,
            segment_versions: Default::default(),
            growing_segment_ids: Default::default(),
            target_version: 1,
        }
    }

    #[tokio::test]
    async fn fresh_heartbeat_keeps_leadership() {
        let catalog = catalog();
        let cid = CollectionId::new(1);
        let node = NodeId::new(1);
        with_one_replica(&catalog, cid, &[node]).await;

        let distribution = Arc::new(DistributionManager::new());
        distribution.update_leaders(node, vec![leadership("dmc0", node)]);

        let target = Arc::new(TargetManager::new());
        target.set_next(cid, snapshot_with_channel("dmc0"));
        target.promote(cid);

        let checker = LeaderChecker::new(catalog, distribution.clone(), target).with_stale_after(Duration::from_secs(30));
        let report = checker.tick();
        assert_eq!(report.leaderships_cleared, 0);
        assert_eq!(distribution.leaderships_on(node).len(), 1);
    }

    #[tokio::test]
    async fn stale_heartbeat_clears_leadership() {
        let catalog = catalog();
        let cid = CollectionId::new(1);
        let node = NodeId::new(1);
        with_one_replica(&catalog, cid, &[node]).await;

        let distribution = Arc::new(DistributionManager::new());
        distribution.update_leaders(node, vec![leadership("dmc0", node)]);
        tokio::time::sleep(Duration::from_millis(5)).await;

        let target = Arc::new(TargetManager::new());
        target.set_next(cid, snapshot_with_channel("dmc0"));
        target.promote(cid);

        let checker = LeaderChecker::new(catalog, distribution.clone(), target).with_stale_after(Duration::from_millis(1));
        let report = checker.tick();
        assert_eq!(report.leaderships_cleared, 1);
        assert!(distribution.leaderships_on(node).is_empty());
    }
}
