use std::sync::Arc;

use qcoord_catalog::Catalog;
use qcoord_distribution::DistributionManager;
use qcoord_task::{Action, TaskScheduler, TaskTarget};
use qcoord_types::{ActionKind, CollectionId, DataScope, LoadStatus, NodeId, Priority, ReplicaId, SegmentId};

use crate::balancer;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BalanceCheckReport {
    pub moves_submitted: usize,
    pub rejected: usize,
}

/// Row-count rebalancing across a replica's own nodes, run only against
/// fully-loaded collections — a collection still catching up to its
/// target is left entirely to the segment checker. A move is a paired
/// Grow-then-Reduce of the same segment: the grow is submitted first and
/// the reduce follows only once the grow has been accepted, so a
/// rejected grow never strands the collection a copy short.
pub struct BalanceChecker {
    catalog: Arc<Catalog>,
    distribution: Arc<DistributionManager>,
    task: Arc<TaskScheduler>,
    /// Minimum row-count gap between the heaviest and lightest node in a
    /// replica before a move is worth the churn.
    threshold_rows: u64,
}

impl BalanceChecker {
    pub fn new(catalog: Arc<Catalog>, distribution: Arc<DistributionManager>, task: Arc<TaskScheduler>) -> Self {
        Self { catalog, distribution, task, threshold_rows: 1000 }
    }

    pub fn with_threshold_rows(mut self, threshold_rows: u64) -> Self {
        self.threshold_rows = threshold_rows;
        self
    }

    pub fn tick(&self) -> BalanceCheckReport {
        let mut report = BalanceCheckReport::default();
        for collection in self.catalog.collections.list() {
            if collection.status != LoadStatus::Loaded {
                continue;
            }
            for replica in self.catalog.replicas.list_by_collection(collection.collection_id) {
                self.rebalance_replica(collection.collection_id, replica.replica_id, &replica.nodes, &mut report);
            }
        }
        report
    }

    fn rebalance_replica(&self, cid: CollectionId, replica_id: ReplicaId, nodes: &std::collections::BTreeSet<NodeId>, report: &mut BalanceCheckReport) {
        let nodes: Vec<NodeId> = nodes.iter().copied().collect();
        if nodes.len() < 2 {
            return;
        }

        let loads: Vec<(NodeId, u64)> = nodes.iter().map(|&n| (n, balancer::row_count_on(&self.distribution, n, cid))).collect();
        let Some(&(heaviest, max_rows)) = loads.iter().max_by_key(|(_, rows)| *rows) else { return };
        let Some(&(lightest, min_rows)) = loads.iter().min_by_key(|(_, rows)| *rows) else { return };

        if heaviest == lightest || max_rows.saturating_sub(min_rows) < self.threshold_rows {
            return;
        }

        let Some(segment) = self.pick_movable_segment(cid, heaviest) else { return };

        let target = TaskTarget::Segment {
            replica_id,
            segment_id: segment,
            channel: qcoord_types::ChannelName::new(""),
            scope: DataScope::All,
        };
        match self.task.submit(
            cid,
            target,
            Priority::Low,
            vec![Action::new(ActionKind::Grow, lightest), Action::new(ActionKind::Reduce, heaviest)],
        ) {
            Ok(_) => report.moves_submitted += 1,
            Err(_) => report.rejected += 1,
        }
    }

    fn pick_movable_segment(&self, cid: CollectionId, node: NodeId) -> Option<SegmentId> {
        self.distribution
            .segments_on(node)
            .into_iter()
            .filter(|s| s.collection_id == cid)
            .max_by_key(|s| s.num_rows)
            .map(|s| s.segment_id)
    }
}
