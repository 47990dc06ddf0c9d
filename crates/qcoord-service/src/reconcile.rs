//! Drains [`JobOutcome`]s from the job scheduler and turns each into
//! either a target rebuild or a handoff load/release task pair. This is
//! the layer referenced in `qcoord-job`'s module doc as "the
//! reconciliation layer" — neither `qcoord-job` nor `qcoord-checkers`
//! depends on it; it depends on both, plus the broker, to close the loop.

use std::sync::Arc;

use qcoord_catalog::Catalog;
use qcoord_distribution::DistributionManager;
use qcoord_job::JobOutcome;
use qcoord_target::TargetManager;
use qcoord_task::{Action, TaskScheduler, TaskTarget};
use qcoord_types::{ActionKind, ChannelName, CollectionId, DataScope, NodeId, Priority, SegmentId};

use crate::broker::Broker;

/// Owns the receiving end of the job scheduler's outcome channel and the
/// handles needed to act on each variant.
pub struct Reconciler {
    catalog: Arc<Catalog>,
    distribution: Arc<DistributionManager>,
    target: Arc<TargetManager>,
    task: Arc<TaskScheduler>,
    broker: Arc<dyn Broker>,
}

impl Reconciler {
    pub fn new(catalog: Arc<Catalog>, distribution: Arc<DistributionManager>, target: Arc<TargetManager>, task: Arc<TaskScheduler>, broker: Arc<dyn Broker>) -> Self {
        Self { catalog, distribution, target, task, broker }
    }

    /// Consumes outcomes until the scheduler side of the channel is
    /// dropped (coordinator shutdown). Spawned as a long-lived background
    /// task by `qcoord`'s binary.
    pub async fn run(&self, mut events: tokio::sync::mpsc::UnboundedReceiver<JobOutcome>) {
        while let Some(outcome) = events.recv().await {
            self.handle(outcome).await;
        }
    }

    async fn handle(&self, outcome: JobOutcome) {
        match outcome {
            JobOutcome::TargetRefreshNeeded(cid) => self.refresh_target(cid).await,
            JobOutcome::HandoffLoadReady { collection_id, partition_id: _, segment_id } => {
                self.submit_handoff_grow(collection_id, segment_id);
            }
            JobOutcome::HandoffReleaseReady { collection_id, partition_id: _, sources } => {
                self.submit_handoff_reduces(collection_id, &sources);
            }
        }
    }

    /// `UpdateNextTarget` (spec §4.4): asks the broker for recovery info
    /// of every partition this collection currently has loaded, then
    /// publishes the result as the collection's *next* target. Promotion
    /// to *current* is the target observer's job, not this one's.
    pub async fn refresh_target(&self, cid: CollectionId) {
        if !self.catalog.collections.contains(cid) {
            self.target.clear(cid);
            return;
        }
        let partitions: Vec<_> = self.catalog.partitions.list_by_collection(cid).iter().map(|p| p.partition_id).collect();
        match self.broker.recovery_info(cid, &partitions).await {
            Ok(snapshot) => self.target.set_next(cid, snapshot),
            Err(e) => tracing::error!(collection_id = %cid, error = %e, "failed to rebuild next target from broker"),
        }
    }

    fn submit_handoff_grow(&self, cid: CollectionId, segment_id: SegmentId) {
        let Some(replica) = self.catalog.replicas.list_by_collection(cid).into_iter().next() else {
            tracing::warn!(collection_id = %cid, segment_id = %segment_id, "handoff load has no replica to target");
            return;
        };
        let Some(dest) = self.pick_destination(cid, &replica.nodes) else {
            tracing::warn!(collection_id = %cid, segment_id = %segment_id, "handoff load has no live node to target");
            return;
        };
        let target = TaskTarget::Segment {
            replica_id: replica.replica_id,
            segment_id,
            channel: ChannelName::new(""),
            scope: DataScope::Historical,
        };
        match self.task.submit(cid, target, Priority::High, vec![Action::new(ActionKind::Grow, dest)]) {
            Ok(_) => tracing::info!(collection_id = %cid, segment_id = %segment_id, node = %dest, "submitted handoff load"),
            Err(e) => tracing::debug!(collection_id = %cid, segment_id = %segment_id, error = %e, "handoff load task rejected"),
        }
    }

    fn submit_handoff_reduces(&self, cid: CollectionId, sources: &[SegmentId]) {
        for replica in self.catalog.replicas.list_by_collection(cid) {
            for &node in &replica.nodes {
                for &segment_id in sources {
                    if !self.distribution.has_segment(node, segment_id) {
                        continue;
                    }
                    let target = TaskTarget::Segment { replica_id: replica.replica_id, segment_id, channel: ChannelName::new(""), scope: DataScope::All };
                    match self.task.submit(cid, target, Priority::Normal, vec![Action::new(ActionKind::Reduce, node)]) {
                        Ok(_) => tracing::info!(collection_id = %cid, segment_id = %segment_id, node = %node, "submitted handoff compaction-source release"),
                        Err(e) => tracing::debug!(collection_id = %cid, segment_id = %segment_id, error = %e, "handoff release task rejected"),
                    }
                }
            }
        }
    }

    fn pick_destination(&self, cid: CollectionId, nodes: &std::collections::BTreeSet<NodeId>) -> Option<NodeId> {
        let delta = self.task.node_segment_delta(cid);
        nodes
            .iter()
            .copied()
            .min_by_key(|&n| (self.distribution.segment_count_on(n, cid) as i64) + delta.get(&n).copied().unwrap_or(0))
    }
}
