//! The client- and worker-facing RPC surface (spec §6): request
//! validation, health gating, and response shaping over the managers.
//! This module owns no reconciliation logic of its own — it only calls
//! into `qcoord-catalog`, `qcoord-distribution`, `qcoord-target`,
//! `qcoord-resource`, `qcoord-job`, and `qcoord-task`, and asks
//! [`crate::reconcile::Reconciler`] to rebuild a target when a refresh is
//! requested inline.

use std::sync::Arc;

use qcoord_catalog::{Catalog, Replica};
use qcoord_distribution::{ChannelView, DistributionManager, SegmentFilter, SegmentView, ShardLeadership};
use qcoord_job::{JobScheduler, LoadCollectionRequest, LoadPartitionRequest, ReleaseCollectionRequest, ReleasePartitionRequest};
use qcoord_resource::{ResourceError, ResourceGroup, ResourceManager};
use qcoord_target::TargetManager;
use qcoord_task::{Action, TaskScheduler, TaskTarget};
use qcoord_types::{ActionKind, ChannelName, CollectionId, DataScope, LoadStatus, NodeId, Priority, ResourceGroupName, SegmentId};

use qcoord_checkers::FailedLoadCache;

use crate::broker::Broker;
use crate::error::{CoordinatorError, CoordinatorResult};
use crate::metrics::Metrics;
use crate::reconcile::Reconciler;
use crate::state::StateHolder;

/// `ShowCollections`/idempotence-check response shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionStatusView {
    pub collection_id: CollectionId,
    pub load_percentage: u8,
    pub status: LoadStatus,
}

/// `ShowPartitions`/`GetPartitionStates` response shape. `unavailable_reason`
/// is populated only by `GetPartitionStates`, from the failed-load cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionStatusView {
    pub collection_id: CollectionId,
    pub partition_id: qcoord_types::PartitionId,
    pub load_percentage: u8,
    pub status: LoadStatus,
    pub unavailable_reason: Option<String>,
}

/// `GetShardLeaders` response entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardLeaderView {
    pub replica_id: qcoord_types::ReplicaId,
    pub channel: ChannelName,
    pub leader_node: NodeId,
}

/// Everything the facade needs to answer an RPC. One instance is shared
/// across every connection; all state behind it is already internally
/// synchronized.
pub struct CoordinatorService {
    catalog: Arc<Catalog>,
    distribution: Arc<DistributionManager>,
    target: Arc<TargetManager>,
    resources: Arc<ResourceManager>,
    jobs: Arc<JobScheduler>,
    task: Arc<TaskScheduler>,
    broker: Arc<dyn Broker>,
    reconciler: Arc<Reconciler>,
    failed_load: Arc<FailedLoadCache>,
    state: Arc<StateHolder>,
    metrics: Arc<Metrics>,
}

impl CoordinatorService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        catalog: Arc<Catalog>,
        distribution: Arc<DistributionManager>,
        target: Arc<TargetManager>,
        resources: Arc<ResourceManager>,
        jobs: Arc<JobScheduler>,
        task: Arc<TaskScheduler>,
        broker: Arc<dyn Broker>,
        failed_load: Arc<FailedLoadCache>,
        state: Arc<StateHolder>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let reconciler = Arc::new(Reconciler::new(catalog.clone(), distribution.clone(), target.clone(), task.clone(), broker.clone()));
        Self {
            catalog,
            distribution,
            target,
            resources,
            jobs,
            task,
            broker,
            reconciler,
            failed_load,
            state,
            metrics,
        }
    }

    /// The collection/partition/replica catalog, for callers that need to
    /// drive [`Catalog::load_all`] at startup.
    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// The reconciliation layer this service already wired, so a caller
    /// spawning its background loop doesn't need to build a second one.
    pub fn reconciler(&self) -> &Arc<Reconciler> {
        &self.reconciler
    }

    fn require_healthy(&self) -> CoordinatorResult<()> {
        if self.state.is_healthy() {
            Ok(())
        } else {
            Err(CoordinatorError::NotHealthy("coordinator is not serving requests".to_string()))
        }
    }

    /// Resolves the node pool an incoming load should draw from: the
    /// union of the named resource groups, or the default group when none
    /// are named.
    fn candidate_nodes(&self, resource_groups: &[ResourceGroupName]) -> CoordinatorResult<Vec<NodeId>> {
        let names: Vec<ResourceGroupName> = if resource_groups.is_empty() {
            vec![ResourceGroupName::default_group()]
        } else {
            resource_groups.to_vec()
        };
        let mut nodes = Vec::new();
        for name in &names {
            let group = self.resources.group(name).ok_or_else(|| ResourceError::NotFound(name.clone()))?;
            nodes.extend(group.nodes.iter().copied());
        }
        Ok(nodes)
    }

    fn replica_count_for_node(&self, node: NodeId) -> usize {
        self.catalog
            .collections
            .list()
            .iter()
            .flat_map(|c| self.catalog.replicas.list_by_collection(c.collection_id))
            .filter(|r| r.nodes.contains(&node))
            .count()
    }

    // ---- client-facing RPCs ----

    pub fn show_collections(&self, ids: Option<Vec<CollectionId>>) -> CoordinatorResult<Vec<CollectionStatusView>> {
        self.require_healthy()?;
        let all = self.catalog.collections.list();
        let views = all
            .into_iter()
            .filter(|c| ids.as_ref().is_none_or(|ids| ids.contains(&c.collection_id)))
            .map(|c| CollectionStatusView { collection_id: c.collection_id, load_percentage: c.load_percentage, status: c.status })
            .collect();
        Ok(views)
    }

    pub fn show_partitions(&self, cid: CollectionId, pids: Option<Vec<qcoord_types::PartitionId>>) -> CoordinatorResult<Vec<PartitionStatusView>> {
        self.require_healthy()?;
        let all = self.catalog.partitions.list_by_collection(cid);
        let views = all
            .into_iter()
            .filter(|p| pids.as_ref().is_none_or(|pids| pids.contains(&p.partition_id)))
            .map(|p| PartitionStatusView {
                collection_id: p.collection_id,
                partition_id: p.partition_id,
                load_percentage: p.load_percentage,
                status: p.status,
                unavailable_reason: None,
            })
            .collect();
        Ok(views)
    }

    /// `GetPartitionStates`: like `show_partitions`, but also surfaces the
    /// failed-load cache's reason when the collection has one recorded.
    pub fn get_partition_states(&self, cid: CollectionId, pids: Option<Vec<qcoord_types::PartitionId>>) -> CoordinatorResult<Vec<PartitionStatusView>> {
        self.require_healthy()?;
        let reason = self.failed_load.get(cid);
        let mut views = self.show_partitions(cid, pids)?;
        if let Some(reason) = reason {
            for view in &mut views {
                view.unavailable_reason = Some(reason.clone());
            }
        }
        Ok(views)
    }

    pub async fn load_collection(
        &self,
        cid: CollectionId,
        replica_number: u32,
        resource_groups: Vec<ResourceGroupName>,
        refresh: bool,
    ) -> CoordinatorResult<()> {
        self.require_healthy()?;
        if refresh {
            return self.refresh_loaded_collection(cid).await;
        }
        let candidate_nodes = self.candidate_nodes(&resource_groups)?;
        let partitions = self.broker.list_partitions(cid).await?;
        self.jobs
            .load_collection(LoadCollectionRequest { collection_id: cid, replica_number, resource_groups, candidate_nodes, partitions })
            .await?;
        Ok(())
    }

    pub async fn load_partitions(
        &self,
        cid: CollectionId,
        partition_ids: Vec<qcoord_types::PartitionId>,
        replica_number: u32,
        resource_groups: Vec<ResourceGroupName>,
        refresh: bool,
    ) -> CoordinatorResult<()> {
        self.require_healthy()?;
        if refresh {
            return self.refresh_loaded_collection(cid).await;
        }
        let candidate_nodes = self.candidate_nodes(&resource_groups)?;
        self.jobs
            .load_partitions(LoadPartitionRequest { collection_id: cid, partition_ids, replica_number, resource_groups, candidate_nodes })
            .await?;
        Ok(())
    }

    /// Shared `refresh=true` path for both load RPCs: requires the
    /// collection to already be fully loaded, rebuilds *next* from the
    /// broker, then blocks until the observer promotes it.
    async fn refresh_loaded_collection(&self, cid: CollectionId) -> CoordinatorResult<()> {
        let info = self.catalog.collections.get(cid).ok_or_else(|| CoordinatorError::IllegalArgument(format!("collection {cid} not found")))?;
        if info.load_percentage < 100 {
            return Err(CoordinatorError::IllegalArgument("must be fully loaded".to_string()));
        }
        self.reconciler.refresh_target(cid).await;
        self.target.wait_for_promotion(cid).await;
        Ok(())
    }

    pub async fn release_collection(&self, cid: CollectionId) -> CoordinatorResult<()> {
        self.require_healthy()?;
        self.jobs.release_collection(ReleaseCollectionRequest { collection_id: cid }).await?;
        self.failed_load.remove(cid);
        Ok(())
    }

    pub async fn release_partitions(&self, cid: CollectionId, partition_ids: Vec<qcoord_types::PartitionId>) -> CoordinatorResult<()> {
        self.require_healthy()?;
        self.jobs.release_partitions(ReleasePartitionRequest { collection_id: cid, partition_ids }).await?;
        Ok(())
    }

    pub fn get_segment_info(&self, cid: CollectionId, segment_ids: Option<Vec<SegmentId>>) -> CoordinatorResult<Vec<SegmentView>> {
        self.require_healthy()?;
        let filter = SegmentFilter { collection_id: Some(cid), ..Default::default() };
        let mut segments = self.distribution.segments_matching(&filter);
        if let Some(ids) = segment_ids {
            segments.retain(|s| ids.contains(&s.segment_id));
        }
        Ok(segments)
    }

    pub fn get_shard_leaders(&self, cid: CollectionId) -> CoordinatorResult<Vec<ShardLeaderView>> {
        self.require_healthy()?;
        let current = self.target.current(cid).ok_or_else(|| CoordinatorError::NoReplicaAvailable {
            collection: cid.to_string(),
            reason: "no current target published yet".to_string(),
        })?;

        let mut leaders = Vec::new();
        for replica in self.catalog.replicas.list_by_collection(cid) {
            let nodes: Vec<NodeId> = replica.nodes.iter().copied().collect();
            for channel in current.channels.keys() {
                let leader_node = self.distribution.shard_leader(&nodes, channel).ok_or_else(|| CoordinatorError::NoReplicaAvailable {
                    collection: cid.to_string(),
                    reason: format!("no live leader for channel {channel}"),
                })?;
                let missing_segment = current
                    .historical_segments
                    .values()
                    .any(|seg| seg.insert_channel == *channel && !self.distribution.has_segment(leader_node, seg.segment_id));
                if missing_segment {
                    return Err(CoordinatorError::NoReplicaAvailable {
                        collection: cid.to_string(),
                        reason: format!("leader {leader_node} is missing a segment for channel {channel}"),
                    });
                }
                leaders.push(ShardLeaderView { replica_id: replica.replica_id, channel: channel.clone(), leader_node });
            }
        }
        Ok(leaders)
    }

    /// `LoadBalance`: moves `segment_ids` (or, if empty, everything `src`
    /// currently reports) off `src` onto `dsts`, round-robin. Returns the
    /// number of move tasks actually enqueued — a task rejected as
    /// `AlreadyDone`/`ConflictTaskExisted` is not an error here, just not
    /// counted.
    pub fn load_balance(&self, cid: CollectionId, src: NodeId, dsts: Vec<NodeId>, segment_ids: Vec<SegmentId>) -> CoordinatorResult<usize> {
        self.require_healthy()?;
        if dsts.is_empty() {
            return Err(CoordinatorError::IllegalArgument("no destination nodes given".to_string()));
        }
        let replica = self
            .catalog
            .replicas
            .replica_for_node(cid, src)
            .ok_or_else(|| CoordinatorError::IllegalArgument(format!("node {src} does not hold a replica of collection {cid}")))?;

        let candidates: Vec<SegmentView> = self
            .distribution
            .segments_on(src)
            .into_iter()
            .filter(|s| s.collection_id == cid && (segment_ids.is_empty() || segment_ids.contains(&s.segment_id)))
            .collect();

        let mut submitted = 0;
        for (i, segment) in candidates.into_iter().enumerate() {
            let dst = dsts[i % dsts.len()];
            let scope = if segment.level == qcoord_types::SegmentLevel::Growing { DataScope::Streaming } else { DataScope::Historical };
            let target = TaskTarget::Segment { replica_id: replica.replica_id, segment_id: segment.segment_id, channel: segment.channel.clone(), scope };
            let actions = vec![Action::new(ActionKind::Grow, dst), Action::new(ActionKind::Reduce, src)];
            match self.task.submit(cid, target, Priority::Normal, actions) {
                Ok(_) => submitted += 1,
                Err(e) => tracing::debug!(collection_id = %cid, segment_id = %segment.segment_id, error = %e, "load-balance move rejected"),
            }
        }
        Ok(submitted)
    }

    pub fn create_resource_group(&self, name: ResourceGroupName, capacity: u32) -> CoordinatorResult<()> {
        self.require_healthy()?;
        self.resources.create(name, capacity)?;
        Ok(())
    }

    pub fn drop_resource_group(&self, name: &ResourceGroupName) -> CoordinatorResult<()> {
        self.require_healthy()?;
        let still_referenced = self
            .catalog
            .collections
            .list()
            .iter()
            .flat_map(|c| self.catalog.replicas.list_by_collection(c.collection_id))
            .any(|r| &r.resource_group == name);
        self.resources.drop_group(name, still_referenced)?;
        Ok(())
    }

    pub fn transfer_node(&self, src: &ResourceGroupName, dst: &ResourceGroupName, n: usize) -> CoordinatorResult<Vec<NodeId>> {
        self.require_healthy()?;
        let moved = self.resources.transfer(src, dst, n, |node| self.replica_count_for_node(node))?;
        Ok(moved)
    }

    pub async fn transfer_replica(&self, cid: CollectionId, src: ResourceGroupName, dst: ResourceGroupName, n: u32) -> CoordinatorResult<Vec<Replica>> {
        self.require_healthy()?;
        let replicas = self.jobs.transfer_replica(cid, src, dst, n).await?;
        Ok(replicas)
    }

    pub fn list_resource_groups(&self) -> CoordinatorResult<Vec<ResourceGroup>> {
        self.require_healthy()?;
        Ok(self.resources.list_groups())
    }

    pub fn describe_resource_group(&self, name: &ResourceGroupName) -> CoordinatorResult<ResourceGroup> {
        self.require_healthy()?;
        self.resources.group(name).ok_or_else(|| ResourceError::NotFound(name.clone()).into())
    }

    pub fn get_replicas(&self, cid: CollectionId) -> CoordinatorResult<Vec<Replica>> {
        self.require_healthy()?;
        Ok(self.catalog.replicas.list_by_collection(cid))
    }

    /// `GetMetrics(pattern)`. Unlike the other RPCs, served regardless of
    /// health state — an operator diagnosing a stuck `Starting` state
    /// needs this endpoint precisely when nothing else works.
    pub fn get_metrics(&self, pattern: &str) -> String {
        self.metrics.render_matching(pattern)
    }

    /// `ShowConfigurations(pattern)`: a flattened, glob-filtered view of
    /// the active config. Exempt from health gating for the same reason
    /// as `get_metrics`.
    pub fn show_configurations(&self, pattern: &str, config: &qcoord_config::QCoordConfig) -> Vec<(String, String)> {
        let entries = [
            ("meta.root".to_string(), config.meta.root.display().to_string()),
            ("meta.key_root".to_string(), config.meta.key_root.clone()),
            ("scheduler.dispatch_interval_secs".to_string(), config.scheduler.dispatch_interval_secs.to_string()),
            ("scheduler.balance_interval_secs".to_string(), config.scheduler.balance_interval_secs.to_string()),
            ("scheduler.channel_interval_secs".to_string(), config.scheduler.channel_interval_secs.to_string()),
            ("scheduler.segment_interval_secs".to_string(), config.scheduler.segment_interval_secs.to_string()),
            ("scheduler.leader_interval_secs".to_string(), config.scheduler.leader_interval_secs.to_string()),
            ("scheduler.target_interval_secs".to_string(), config.scheduler.target_interval_secs.to_string()),
            ("scheduler.failed_load_sweep_interval_secs".to_string(), config.scheduler.failed_load_sweep_interval_secs.to_string()),
            ("scheduler.balance_threshold_rows".to_string(), config.scheduler.balance_threshold_rows.to_string()),
            ("scheduler.leader_stale_after_secs".to_string(), config.scheduler.leader_stale_after_secs.to_string()),
            ("task.action_timeout_secs".to_string(), config.task.action_timeout_secs.to_string()),
            ("task.max_attempts".to_string(), config.task.max_attempts.to_string()),
            ("resource_groups.default_capacity".to_string(), config.resource_groups.default_capacity.to_string()),
            ("server.bind_address".to_string(), config.server.bind_address.clone()),
            ("server.metrics_bind_address".to_string(), config.server.metrics_bind_address.clone()),
        ];
        entries.into_iter().filter(|(key, _)| config_glob_match(pattern, key)).collect()
    }

    pub fn check_health(&self) -> bool {
        self.state.is_healthy()
    }

    // ---- worker-facing ingestion ----

    /// A worker's periodic heartbeat: an unconditional replacement of its
    /// reported segment/channel/leadership state.
    pub fn report_heartbeat(&self, node: NodeId, segments: Vec<SegmentView>, channels: Vec<ChannelView>, leaderships: Vec<ShardLeadership>) {
        self.distribution.update_segments(node, segments);
        self.distribution.update_channels(node, channels);
        self.distribution.update_leaders(node, leaderships);
    }

    /// Session discovery reports a new node: it lands in the default
    /// resource group unless an operator has already placed it.
    pub fn register_node(&self, node: NodeId) -> CoordinatorResult<()> {
        if self.resources.group_of(node).is_none() {
            self.resources.add_node(&ResourceGroupName::default_group(), node)?;
        }
        Ok(())
    }

    /// Session discovery reports a node's removal: both the resource-group
    /// membership and every transient distribution entry for it are
    /// dropped immediately.
    pub fn remove_node(&self, node: NodeId) {
        self.resources.remove_node(node);
        self.distribution.remove_node(node);
        tracing::info!(node_id = %node, "node left the cluster");
    }
}

/// Minimal `*`-wildcard matcher for config-key filtering, mirroring
/// `Metrics`'s glob handling without exposing that private helper across
/// crate boundaries.
fn config_glob_match(pattern: &str, key: &str) -> bool {
    if pattern.is_empty() || pattern == "*" {
        return true;
    }
    if !pattern.contains('*') {
        return pattern == key;
    }
    let mut rest = key;
    let segments: Vec<&str> = pattern.split('*').collect();
    for (i, seg) in segments.iter().enumerate() {
        if seg.is_empty() {
            continue;
        }
        if i == 0 && !pattern.starts_with('*') {
            if !rest.starts_with(seg) {
                return false;
            }
            rest = &rest[seg.len()..];
        } else if let Some(pos) = rest.find(seg) {
            rest = &rest[pos + seg.len()..];
        } else {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use qcoord_meta::{KeyLayout, MemoryMetaStore, MetaStore};
    use qcoord_resource::ResourceManager;
    use qcoord_task::FakeWorkerClient;

    use crate::broker::fakes::FakeBroker;
    use crate::state::CoordinatorState;

    fn service() -> (Arc<ResourceManager>, Arc<FakeBroker>, CoordinatorService) {
        let meta: Arc<dyn MetaStore> = Arc::new(MemoryMetaStore::new());
        let catalog = Arc::new(Catalog::new(meta, KeyLayout::new("root")));
        let distribution = Arc::new(DistributionManager::new());
        let target = Arc::new(TargetManager::new());
        let resources = Arc::new(ResourceManager::new());
        let (jobs, _events) = JobScheduler::new(catalog.clone(), resources.clone());
        let jobs = Arc::new(jobs);
        let worker: Arc<dyn qcoord_task::WorkerClient> = Arc::new(FakeWorkerClient::new());
        let task = Arc::new(TaskScheduler::new(distribution.clone(), target.clone(), worker));
        let broker = Arc::new(FakeBroker::new());
        let failed_load = Arc::new(FailedLoadCache::default());
        let state = Arc::new(StateHolder::new(CoordinatorState::Healthy));
        let metrics = Arc::new(Metrics::new());

        let svc = CoordinatorService::new(catalog, distribution, target, resources.clone(), jobs, task, broker.clone(), failed_load, state, metrics);
        (resources, broker, svc)
    }

    #[tokio::test]
    async fn load_collection_then_show_collections_reports_loading() {
        let (_resources, broker, svc) = service();
        let cid = CollectionId::new(1);
        broker.set_partitions(cid, vec![qcoord_types::PartitionId::new(100)]);

        svc.load_collection(cid, 1, Vec::new(), false).await.unwrap();

        let views = svc.show_collections(None).unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].collection_id, cid);
        assert_eq!(views[0].status, LoadStatus::Loading);
    }

    #[tokio::test]
    async fn load_collection_is_idempotent() {
        let (_resources, broker, svc) = service();
        let cid = CollectionId::new(1);
        broker.set_partitions(cid, vec![qcoord_types::PartitionId::new(100)]);

        svc.load_collection(cid, 1, Vec::new(), false).await.unwrap();
        svc.load_collection(cid, 1, Vec::new(), false).await.unwrap();

        assert_eq!(svc.get_replicas(cid).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn load_collection_with_unknown_resource_group_is_illegal_argument() {
        let (_resources, _broker, svc) = service();
        let cid = CollectionId::new(1);
        let err = svc.load_collection(cid, 1, vec![ResourceGroupName::new("does-not-exist")], false).await.unwrap_err();
        assert_eq!(err.code(), qcoord_types::ErrorCode::IllegalArgument);
    }

    #[tokio::test]
    async fn refresh_before_fully_loaded_is_rejected() {
        let (_resources, broker, svc) = service();
        let cid = CollectionId::new(1);
        broker.set_partitions(cid, vec![qcoord_types::PartitionId::new(100)]);
        svc.load_collection(cid, 1, Vec::new(), false).await.unwrap();

        let err = svc.load_collection(cid, 1, Vec::new(), true).await.unwrap_err();
        assert!(matches!(err, CoordinatorError::IllegalArgument(_)));
    }

    #[tokio::test]
    async fn get_shard_leaders_reports_no_replica_available_without_a_target() {
        let (_resources, _broker, svc) = service();
        let cid = CollectionId::new(1);
        let err = svc.get_shard_leaders(cid).unwrap_err();
        assert_eq!(err.code(), qcoord_types::ErrorCode::NoReplicaAvailable);
    }

    #[tokio::test]
    async fn unhealthy_coordinator_rejects_requests() {
        let (_resources, _broker, svc) = service();
        svc.state.set(CoordinatorState::Starting);
        let err = svc.show_collections(None).unwrap_err();
        assert_eq!(err.code(), qcoord_types::ErrorCode::NotHealthy);
    }

    #[tokio::test]
    async fn create_and_describe_resource_group_roundtrips() {
        let (_resources, _broker, svc) = service();
        let name = ResourceGroupName::new("rg1");
        svc.create_resource_group(name.clone(), 4).unwrap();
        let group = svc.describe_resource_group(&name).unwrap();
        assert_eq!(group.capacity, 4);
    }

    #[test]
    fn config_glob_match_handles_prefix_and_wildcard() {
        assert!(config_glob_match("*", "server.bind_address"));
        assert!(config_glob_match("server.*", "server.bind_address"));
        assert!(!config_glob_match("task.*", "server.bind_address"));
        assert!(config_glob_match("server.bind_address", "server.bind_address"));
    }

}
