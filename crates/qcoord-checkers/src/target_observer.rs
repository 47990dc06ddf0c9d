use std::sync::Arc;

use qcoord_catalog::Catalog;
use qcoord_distribution::DistributionManager;
use qcoord_target::{TargetManager, TargetSnapshot};
use qcoord_types::CollectionId;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TargetObserverReport {
    pub promoted: usize,
}

/// Watches each collection's *next* target and promotes it to *current*
/// the moment the distribution fully satisfies it: every historical
/// segment held on at least one node of every replica, and every channel
/// subscribed by exactly one. A collection with no *next* snapshot, or
/// whose *next* already equals *current*, is left alone.
pub struct TargetObserver {
    catalog: Arc<Catalog>,
    distribution: Arc<DistributionManager>,
    target: Arc<TargetManager>,
}

impl TargetObserver {
    pub fn new(catalog: Arc<Catalog>, distribution: Arc<DistributionManager>, target: Arc<TargetManager>) -> Self {
        Self { catalog, distribution, target }
    }

    pub fn tick(&self) -> TargetObserverReport {
        let mut report = TargetObserverReport::default();
        for collection in self.catalog.collections.list() {
            let Some(next) = self.target.next(collection.collection_id) else { continue };
            if self.target.current(collection.collection_id).as_ref() == Some(&next) {
                continue;
            }
            if self.is_saturated(collection.collection_id, &next) {
                self.target.promote(collection.collection_id);
                report.promoted += 1;
            }
        }
        report
    }

    fn is_saturated(&self, cid: CollectionId, next: &TargetSnapshot) -> bool {
        for replica in self.catalog.replicas.list_by_collection(cid) {
            let nodes: Vec<_> = replica.nodes.iter().copied().collect();
            if nodes.is_empty() {
                return false;
            }

            for segment_id in next.historical_segments.keys() {
                if !nodes.iter().any(|&node| self.distribution.has_segment(node, *segment_id)) {
                    return false;
                }
            }

            for channel in next.channels.keys() {
                let subscribers = nodes.iter().filter(|&&node| self.distribution.has_channel(node, channel)).count();
                if subscribers != 1 {
                    return false;
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qcoord_catalog::CollectionLoadInfo;
    use qcoord_distribution::{ChannelView, SegmentView};
    use qcoord_meta::{KeyLayout, MemoryMetaStore, MetaStore};
    use qcoord_target::{DmChannelInfo, SegmentInfo};
    use qcoord_types::{ChannelName, LoadType, MsgPosition, NodeId, PartitionId, ResourceGroupName, SegmentId, SegmentLevel, Timestamp};

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

    fn segment_view(id: i64, node: NodeId, cid: CollectionId) -> SegmentView {
        SegmentView {
            segment_id: SegmentId::new(id),
            collection_id: cid,
            partition_id: PartitionId::new(1),
            channel: ChannelName::new("dmc0"),
            level: SegmentLevel::L1,
            num_rows: 10,
            storage_version: 1,
            index_info: String::new(),
            owning_node: node,
            version: 1,
        }
    }

    #[tokio::test]
    async fn does_not_promote_when_segment_missing() {
        let catalog = catalog();
        let cid = CollectionId::new(1);
        let node = NodeId::new(1);
        with_one_replica(&catalog, cid, &[node]).await;

        let distribution = Arc::new(DistributionManager::new());
        let target = Arc::new(TargetManager::new());
        let mut snapshot = TargetSnapshot::default();
        snapshot
            .historical_segments
            .insert(SegmentId::new(5), SegmentInfo { segment_id: SegmentId::new(5), num_rows: 10, insert_channel: ChannelName::new("dmc0") });
        target.set_next(cid, snapshot);

        let observer = TargetObserver::new(catalog, distribution, target.clone());
        let report = observer.tick();
        assert_eq!(report.promoted, 0);
        assert!(target.current(cid).is_none());
    }

    #[tokio::test]
    async fn promotes_once_segments_and_channels_are_saturated() {
        let catalog = catalog();
        let cid = CollectionId::new(1);
        let node = NodeId::new(1);
        with_one_replica(&catalog, cid, &[node]).await;

        let distribution = Arc::new(DistributionManager::new());
        distribution.update_segments(node, vec![segment_view(5, node, cid)]);
        distribution.update_channels(node, vec![ChannelView { channel: ChannelName::new("dmc0"), collection_id: cid, node }]);

        let target = Arc::new(TargetManager::new());
        let mut snapshot = TargetSnapshot::default();
        snapshot
            .historical_segments
            .insert(SegmentId::new(5), SegmentInfo { segment_id: SegmentId::new(5), num_rows: 10, insert_channel: ChannelName::new("dmc0") });
        snapshot.channels.insert(
            ChannelName::new("dmc0"),
            DmChannelInfo { channel: ChannelName::new("dmc0"), seek_position: MsgPosition::new("dmc0", Vec::new(), Timestamp::new(0)) },
        );
        target.set_next(cid, snapshot.clone());

        let observer = TargetObserver::new(catalog, distribution, target.clone());
        let report = observer.tick();
        assert_eq!(report.promoted, 1);
        assert_eq!(target.current(cid), Some(snapshot));
    }

    #[tokio::test]
    async fn already_promoted_snapshot_is_a_noop() {
        let catalog = catalog();
        let cid = CollectionId::new(1);
        with_one_replica(&catalog, cid, &[NodeId::new(1)]).await;

        let distribution = Arc::new(DistributionManager::new());
        let target = Arc::new(TargetManager::new());
        target.set_next(cid, TargetSnapshot::default());
        target.promote(cid);

        let observer = TargetObserver::new(catalog, distribution, target.clone());
        let report = observer.tick();
        assert_eq!(report.promoted, 0);
    }
}
