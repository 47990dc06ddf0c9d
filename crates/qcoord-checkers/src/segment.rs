use std::collections::HashMap;
use std::sync::Arc;

use qcoord_catalog::{Catalog, Replica};
use qcoord_distribution::DistributionManager;
use qcoord_target::{TargetManager, TargetSnapshot};
use qcoord_task::{Action, TaskScheduler, TaskTarget};
use qcoord_types::{ActionKind, ChannelName, CollectionId, DataScope, NodeId, Priority, SegmentId};

use crate::balancer;

/// Outcome of one [`SegmentChecker::tick`] pass. Rejections are the
/// expected steady state once the cluster has caught up to the target —
/// checkers tolerate `AlreadyDone`/`ConflictTaskExisted` rather than
/// treating them as errors.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SegmentCheckReport {
    pub grows_submitted: usize,
    pub reduces_submitted: usize,
    pub rejected: usize,
}

/// Diffs each loaded collection's *current* target against the
/// distribution and emits `Grow`/`Reduce` segment tasks to close the gap,
/// per replica. Detects duplicate loadings across a replica's nodes
/// (keeping the highest-version copy) and drops segments the target no
/// longer wants, including growing segments superseded by compaction.
pub struct SegmentChecker {
    catalog: Arc<Catalog>,
    distribution: Arc<DistributionManager>,
    target: Arc<TargetManager>,
    task: Arc<TaskScheduler>,
}

impl SegmentChecker {
    pub fn new(catalog: Arc<Catalog>, distribution: Arc<DistributionManager>, target: Arc<TargetManager>, task: Arc<TaskScheduler>) -> Self {
        Self { catalog, distribution, target, task }
    }

    pub fn tick(&self) -> SegmentCheckReport {
        let mut report = SegmentCheckReport::default();
        for collection in self.catalog.collections.list() {
            let Some(current) = self.target.current(collection.collection_id) else { continue };
            for replica in self.catalog.replicas.list_by_collection(collection.collection_id) {
                self.reconcile_replica(collection.collection_id, &replica, &current, &mut report);
            }
        }
        report
    }

    fn reconcile_replica(&self, cid: CollectionId, replica: &Replica, current: &TargetSnapshot, report: &mut SegmentCheckReport) {
        let nodes: Vec<NodeId> = replica.nodes.iter().copied().collect();
        if nodes.is_empty() {
            return;
        }

        let mut holders: HashMap<SegmentId, Vec<(NodeId, u64)>> = HashMap::new();
        for &node in &nodes {
            for seg in self.distribution.segments_on(node) {
                if seg.collection_id != cid {
                    continue;
                }
                holders.entry(seg.segment_id).or_default().push((node, seg.version));
            }
        }

        let delta = self.task.node_segment_delta(cid);

        for (&segment_id, info) in &current.historical_segments {
            match holders.get(&segment_id) {
                None => {
                    if let Some(dest) = balancer::pick_destination(&self.distribution, cid, &nodes, &delta) {
                        self.submit_grow(cid, replica.replica_id, segment_id, &info.insert_channel, DataScope::Historical, dest, report);
                    }
                }
                Some(copies) if copies.len() > 1 => {
                    self.reduce_duplicates(cid, replica.replica_id, segment_id, copies, report);
                }
                Some(_) => {}
            }
        }

        // Anything held that the target no longer names, historical or
        // growing, is redundant: either compaction superseded it or the
        // target simply moved on.
        for (&segment_id, copies) in &holders {
            if current.historical_segments.contains_key(&segment_id) || current.growing_segments.contains(&segment_id) {
                continue;
            }
            for &(node, _) in copies {
                self.submit_reduce(cid, replica.replica_id, segment_id, node, report);
            }
        }
    }

    fn reduce_duplicates(&self, cid: CollectionId, replica_id: qcoord_types::ReplicaId, segment_id: SegmentId, copies: &[(NodeId, u64)], report: &mut SegmentCheckReport) {
        let keep = copies.iter().max_by_key(|(_, version)| *version).map(|(node, _)| *node);
        for &(node, _) in copies {
            if Some(node) != keep {
                self.submit_reduce(cid, replica_id, segment_id, node, report);
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn submit_grow(
        &self,
        cid: CollectionId,
        replica_id: qcoord_types::ReplicaId,
        segment_id: SegmentId,
        channel: &ChannelName,
        scope: DataScope,
        dest: NodeId,
        report: &mut SegmentCheckReport,
    ) {
        let target = TaskTarget::Segment {
            replica_id,
            segment_id,
            channel: channel.clone(),
            scope,
        };
        match self.task.submit(cid, target, Priority::Normal, vec![Action::new(ActionKind::Grow, dest)]) {
            Ok(_) => report.grows_submitted += 1,
            Err(_) => report.rejected += 1,
        }
    }

    fn submit_reduce(&self, cid: CollectionId, replica_id: qcoord_types::ReplicaId, segment_id: SegmentId, node: NodeId, report: &mut SegmentCheckReport) {
        let target = TaskTarget::Segment {
            replica_id,
            segment_id,
            channel: ChannelName::new(""),
            scope: DataScope::All,
        };
        match self.task.submit(cid, target, Priority::Normal, vec![Action::new(ActionKind::Reduce, node)]) {
            Ok(_) => report.reduces_submitted += 1,
            Err(_) => report.rejected += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qcoord_catalog::CollectionLoadInfo;
    use qcoord_distribution::SegmentView;
    use qcoord_meta::{KeyLayout, MemoryMetaStore, MetaStore};
    use qcoord_target::{DmChannelInfo, SegmentInfo};
    use qcoord_task::FakeWorkerClient;
    use qcoord_types::{LoadType, PartitionId, ReplicaId, ResourceGroupName, SegmentLevel};

    fn catalog() -> Arc<Catalog> {
        let meta: Arc<dyn MetaStore> = Arc::new(MemoryMetaStore::new());
        Arc::new(Catalog::new(meta, KeyLayout::new("root")))
    }

    fn segment_view(id: i64, node: NodeId, cid: CollectionId, version: u64) -> SegmentView {
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
            version,
        }
    }

    async fn with_one_replica(catalog: &Catalog, cid: CollectionId, nodes: &[NodeId]) -> ReplicaId {
        catalog
            .collections
            .persist(CollectionLoadInfo::new(cid, 1, LoadType::Collection, vec![ResourceGroupName::default_group()]))
            .await
            .unwrap();
        let replicas = catalog
            .replicas
            .spawn_replicas(cid, 1, ResourceGroupName::default_group(), nodes)
            .await
            .unwrap();
        replicas[0].replica_id
    }

    fn checker(catalog: Arc<Catalog>, distribution: Arc<DistributionManager>, target: Arc<TargetManager>) -> SegmentChecker {
        let worker: Arc<dyn qcoord_task::WorkerClient> = Arc::new(FakeWorkerClient::new());
        let task = Arc::new(TaskScheduler::new(distribution.clone(), target.clone(), worker));
        SegmentChecker::new(catalog, distribution, target, task)
    }

    #[tokio::test]
    async fn emits_grow_for_missing_segment() {
        let catalog = catalog();
        let cid = CollectionId::new(1);
        let node = NodeId::new(1);
        with_one_replica(&catalog, cid, &[node]).await;

        let distribution = Arc::new(DistributionManager::new());
        let target = Arc::new(TargetManager::new());
        let mut snapshot = TargetSnapshot::default();
        snapshot.historical_segments.insert(
            SegmentId::new(100),
            SegmentInfo { segment_id: SegmentId::new(100), num_rows: 10, insert_channel: ChannelName::new("dmc0") },
        );
        target.set_next(cid, snapshot.clone());
        target.promote(cid);

        let checker = checker(catalog, distribution, target);
        let report = checker.tick();
        assert_eq!(report.grows_submitted, 1);
        assert_eq!(report.reduces_submitted, 0);
    }

    #[tokio::test]
    async fn emits_reduce_for_segment_dropped_from_target() {
        let catalog = catalog();
        let cid = CollectionId::new(1);
        let node = NodeId::new(1);
        with_one_replica(&catalog, cid, &[node]).await;

        let distribution = Arc::new(DistributionManager::new());
        distribution.update_segments(node, vec![segment_view(5, node, cid, 1)]);
        let target = Arc::new(TargetManager::new());
        target.set_next(cid, TargetSnapshot::default());
        target.promote(cid);

        let checker = checker(catalog, distribution, target);
        let report = checker.tick();
        assert_eq!(report.reduces_submitted, 1);
    }

    #[tokio::test]
    async fn keeps_highest_version_copy_on_duplicate_loading() {
        let catalog = catalog();
        let cid = CollectionId::new(1);
        let node_a = NodeId::new(1);
        let node_b = NodeId::new(2);
        with_one_replica(&catalog, cid, &[node_a, node_b]).await;

        let distribution = Arc::new(DistributionManager::new());
        distribution.update_segments(node_a, vec![segment_view(5, node_a, cid, 1)]);
        distribution.update_segments(node_b, vec![segment_view(5, node_b, cid, 2)]);

        let target = Arc::new(TargetManager::new());
        let mut snapshot = TargetSnapshot::default();
        snapshot
            .historical_segments
            .insert(SegmentId::new(5), SegmentInfo { segment_id: SegmentId::new(5), num_rows: 10, insert_channel: ChannelName::new("dmc0") });
        target.set_next(cid, snapshot);
        target.promote(cid);

        let checker = checker(catalog, distribution, target);
        let report = checker.tick();
        assert_eq!(report.reduces_submitted, 1, "the lower-version copy on node_a should be reduced");
    }

    #[tokio::test]
    async fn steady_state_emits_nothing() {
        let catalog = catalog();
        let cid = CollectionId::new(1);
        let node = NodeId::new(1);
        with_one_replica(&catalog, cid, &[node]).await;

        let distribution = Arc::new(DistributionManager::new());
        distribution.update_segments(node, vec![segment_view(5, node, cid, 1)]);
        distribution.update_channels(node, vec![]);

        let target = Arc::new(TargetManager::new());
        let mut snapshot = TargetSnapshot::default();
        snapshot
            .historical_segments
            .insert(SegmentId::new(5), SegmentInfo { segment_id: SegmentId::new(5), num_rows: 10, insert_channel: ChannelName::new("dmc0") });
        snapshot.channels.insert(
            ChannelName::new("dmc0"),
            DmChannelInfo { channel: ChannelName::new("dmc0"), seek_position: qcoord_types::MsgPosition::new("dmc0", Vec::new(), qcoord_types::Timestamp::new(0)) },
        );
        target.set_next(cid, snapshot);
        target.promote(cid);

        let checker = checker(catalog, distribution, target);
        let report = checker.tick();
        assert_eq!(report.grows_submitted, 0);
        assert_eq!(report.reduces_submitted, 0);
    }
}
