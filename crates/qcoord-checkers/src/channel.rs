use std::collections::HashMap;
use std::sync::Arc;

use qcoord_catalog::{Catalog, Replica};
use qcoord_distribution::DistributionManager;
use qcoord_target::{TargetManager, TargetSnapshot};
use qcoord_task::{Action, TaskScheduler, TaskTarget};
use qcoord_types::{ActionKind, ChannelName, CollectionId, NodeId, Priority};

use crate::balancer;

/// Same shape as [`crate::segment::SegmentCheckReport`], for the channel
/// side of reconciliation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ChannelCheckReport {
    pub grows_submitted: usize,
    pub reduces_submitted: usize,
    pub rejected: usize,
}

/// Diffs each loaded collection's *current* target channel set against the
/// distribution and assigns exactly one subscriber per channel, per
/// replica. A channel subscribed by more than one of a replica's nodes is
/// reduced down to one; the choice of which copy survives is arbitrary
/// since a dm-channel subscription carries no version to prefer.
pub struct ChannelChecker {
    catalog: Arc<Catalog>,
    distribution: Arc<DistributionManager>,
    target: Arc<TargetManager>,
    task: Arc<TaskScheduler>,
}

impl ChannelChecker {
    pub fn new(catalog: Arc<Catalog>, distribution: Arc<DistributionManager>, target: Arc<TargetManager>, task: Arc<TaskScheduler>) -> Self {
        Self { catalog, distribution, target, task }
    }

    pub fn tick(&self) -> ChannelCheckReport {
        let mut report = ChannelCheckReport::default();
        for collection in self.catalog.collections.list() {
            let Some(current) = self.target.current(collection.collection_id) else { continue };
            for replica in self.catalog.replicas.list_by_collection(collection.collection_id) {
                self.reconcile_replica(collection.collection_id, &replica, &current, &mut report);
            }
        }
        report
    }

    fn reconcile_replica(&self, cid: CollectionId, replica: &Replica, current: &TargetSnapshot, report: &mut ChannelCheckReport) {
        let nodes: Vec<NodeId> = replica.nodes.iter().copied().collect();
        if nodes.is_empty() {
            return;
        }

        let mut holders: HashMap<ChannelName, Vec<NodeId>> = HashMap::new();
        for &node in &nodes {
            for chan in self.distribution.channels_on(node) {
                if chan.collection_id != cid {
                    continue;
                }
                holders.entry(chan.channel).or_default().push(node);
            }
        }

        let delta = self.task.node_channel_delta(cid);

        for channel in current.channels.keys() {
            match holders.get(channel) {
                None => {
                    if let Some(dest) = balancer::pick_least_loaded(&nodes, &delta, |node| balancer::channel_count_on(&self.distribution, node, cid)) {
                        self.submit_grow(cid, replica.replica_id, channel, dest, report);
                    }
                }
                Some(subscribers) if subscribers.len() > 1 => {
                    for &node in &subscribers[1..] {
                        self.submit_reduce(cid, replica.replica_id, channel, node, report);
                    }
                }
                Some(_) => {}
            }
        }

        for (channel, subscribers) in &holders {
            if current.channels.contains_key(channel) {
                continue;
            }
            for &node in subscribers {
                self.submit_reduce(cid, replica.replica_id, channel, node, report);
            }
        }
    }

    fn submit_grow(&self, cid: CollectionId, replica_id: qcoord_types::ReplicaId, channel: &ChannelName, dest: NodeId, report: &mut ChannelCheckReport) {
        let target = TaskTarget::Channel { replica_id, channel: channel.clone() };
        match self.task.submit(cid, target, Priority::Normal, vec![Action::new(ActionKind::Grow, dest)]) {
            Ok(_) => report.grows_submitted += 1,
            Err(_) => report.rejected += 1,
        }
    }

    fn submit_reduce(&self, cid: CollectionId, replica_id: qcoord_types::ReplicaId, channel: &ChannelName, node: NodeId, report: &mut ChannelCheckReport) {
        let target = TaskTarget::Channel { replica_id, channel: channel.clone() };
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
    use qcoord_distribution::ChannelView;
    use qcoord_meta::{KeyLayout, MemoryMetaStore, MetaStore};
    use qcoord_target::DmChannelInfo;
    use qcoord_task::FakeWorkerClient;
    use qcoord_types::{LoadType, MsgPosition, ReplicaId, ResourceGroupName, Timestamp};

    fn catalog() -> Arc<Catalog> {
        let meta: Arc<dyn MetaStore> = Arc::new(MemoryMetaStore::new());
        Arc::new(Catalog::new(meta, KeyLayout::new("root")))
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

    fn checker(catalog: Arc<Catalog>, distribution: Arc<DistributionManager>, target: Arc<TargetManager>) -> ChannelChecker {
        let worker: Arc<dyn qcoord_task::WorkerClient> = Arc::new(FakeWorkerClient::new());
        let task = Arc::new(TaskScheduler::new(distribution.clone(), target.clone(), worker));
        ChannelChecker::new(catalog, distribution, target, task)
    }

    fn channel_info(name: &str) -> DmChannelInfo {
        DmChannelInfo {
            channel: ChannelName::new(name),
            seek_position: MsgPosition::new(name, Vec::new(), Timestamp::new(0)),
        }
    }

    #[tokio::test]
    async fn emits_grow_for_unsubscribed_channel() {
        let catalog = catalog();
        let cid = CollectionId::new(1);
        let node = NodeId::new(1);
        with_one_replica(&catalog, cid, &[node]).await;

        let distribution = Arc::new(DistributionManager::new());
        let target = Arc::new(TargetManager::new());
        let mut snapshot = TargetSnapshot::default();
        snapshot.channels.insert(ChannelName::new("dmc0"), channel_info("dmc0"));
        target.set_next(cid, snapshot);
        target.promote(cid);

        let checker = checker(catalog, distribution, target);
        let report = checker.tick();
        assert_eq!(report.grows_submitted, 1);
        assert_eq!(report.reduces_submitted, 0);
    }

    #[tokio::test]
    async fn emits_reduce_for_channel_dropped_from_target() {
        let catalog = catalog();
        let cid = CollectionId::new(1);
        let node = NodeId::new(1);
        with_one_replica(&catalog, cid, &[node]).await;

        let distribution = Arc::new(DistributionManager::new());
        distribution.update_channels(node, vec![ChannelView { channel: ChannelName::new("dmc0"), collection_id: cid, node }]);
        let target = Arc::new(TargetManager::new());
        target.set_next(cid, TargetSnapshot::default());
        target.promote(cid);

        let checker = checker(catalog, distribution, target);
        let report = checker.tick();
        assert_eq!(report.reduces_submitted, 1);
    }

    #[tokio::test]
    async fn reduces_duplicate_subscribers_to_one() {
        let catalog = catalog();
        let cid = CollectionId::new(1);
        let node_a = NodeId::new(1);
        let node_b = NodeId::new(2);
        with_one_replica(&catalog, cid, &[node_a, node_b]).await;

        let distribution = Arc::new(DistributionManager::new());
        distribution.update_channels(node_a, vec![ChannelView { channel: ChannelName::new("dmc0"), collection_id: cid, node: node_a }]);
        distribution.update_channels(node_b, vec![ChannelView { channel: ChannelName::new("dmc0"), collection_id: cid, node: node_b }]);

        let target = Arc::new(TargetManager::new());
        let mut snapshot = TargetSnapshot::default();
        snapshot.channels.insert(ChannelName::new("dmc0"), channel_info("dmc0"));
        target.set_next(cid, snapshot);
        target.promote(cid);

        let checker = checker(catalog, distribution, target);
        let report = checker.tick();
        assert_eq!(report.reduces_submitted, 1);
    }

    #[tokio::test]
    async fn steady_state_emits_nothing() {
        let catalog = catalog();
        let cid = CollectionId::new(1);
        let node = NodeId::new(1);
        with_one_replica(&catalog, cid, &[node]).await;

        let distribution = Arc::new(DistributionManager::new());
        distribution.update_channels(node, vec![ChannelView { channel: ChannelName::new("dmc0"), collection_id: cid, node }]);
        let target = Arc::new(TargetManager::new());
        let mut snapshot = TargetSnapshot::default();
        snapshot.channels.insert(ChannelName::new("dmc0"), channel_info("dmc0"));
        target.set_next(cid, snapshot);
        target.promote(cid);

        let checker = checker(catalog, distribution, target);
        let report = checker.tick();
        assert_eq!(report.grows_submitted, 0);
        assert_eq!(report.reduces_submitted, 0);
    }
}
