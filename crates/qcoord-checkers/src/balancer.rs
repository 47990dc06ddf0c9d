//! Destination selection shared by the segment, channel, and balance
//! checkers: a plain row-count balancer, not a cost-based planner. Ties
//! break on the lowest `NodeId` so repeated ticks are deterministic.

use std::collections::HashMap;

use qcoord_distribution::DistributionManager;
use qcoord_types::{CollectionId, NodeId};

/// Total row count `node` currently reports holding for `collection_id`,
/// summed across its reported segments.
pub fn row_count_on(distribution: &DistributionManager, node: NodeId, collection_id: CollectionId) -> u64 {
    distribution
        .segments_on(node)
        .into_iter()
        .filter(|s| s.collection_id == collection_id)
        .map(|s| s.num_rows)
        .sum()
}

/// Picks the candidate with the fewest rows for `collection_id`, folding in
/// `pending_delta` (the task scheduler's `GetNodeSegmentDelta`/
/// `GetNodeChannelDelta`) so a node with several in-flight grows is not
/// picked again before its heartbeat catches up. Returns `None` for an
/// empty candidate list.
pub fn pick_destination(
    distribution: &DistributionManager,
    collection_id: CollectionId,
    candidates: &[NodeId],
    pending_delta: &HashMap<NodeId, i64>,
) -> Option<NodeId> {
    pick_least_loaded(candidates, pending_delta, |node| row_count_on(distribution, node, collection_id))
}

/// Generalizes `pick_destination` to any per-node weight, e.g. channel
/// count rather than row count. Ties break on the lowest `NodeId`.
pub fn pick_least_loaded(candidates: &[NodeId], pending_delta: &HashMap<NodeId, i64>, weight: impl Fn(NodeId) -> u64) -> Option<NodeId> {
    candidates.iter().copied().min_by_key(|&node| {
        let base = weight(node) as i64;
        let delta = pending_delta.get(&node).copied().unwrap_or(0).max(0);
        (base + delta, node)
    })
}

/// Number of channels `node` currently reports subscribing to for
/// `collection_id`.
pub fn channel_count_on(distribution: &DistributionManager, node: NodeId, collection_id: CollectionId) -> u64 {
    distribution
        .channels_on(node)
        .into_iter()
        .filter(|c| c.collection_id == collection_id)
        .count() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use qcoord_distribution::SegmentView;
    use qcoord_types::{PartitionId, SegmentLevel};

    fn segment(id: i64, node: NodeId, rows: u64) -> SegmentView {
        SegmentView {
            segment_id: qcoord_types::SegmentId::new(id),
            collection_id: CollectionId::new(1),
            partition_id: PartitionId::new(1),
            channel: qcoord_types::ChannelName::new("dmc0"),
            level: SegmentLevel::L1,
            num_rows: rows,
            storage_version: 1,
            index_info: String::new(),
            owning_node: node,
            version: 1,
        }
    }

    #[test]
    fn picks_the_lightest_candidate() {
        let dm = DistributionManager::new();
        let light = NodeId::new(1);
        let heavy = NodeId::new(2);
        dm.update_segments(light, vec![segment(1, light, 10)]);
        dm.update_segments(heavy, vec![segment(2, heavy, 1000)]);

        let dest = pick_destination(&dm, CollectionId::new(1), &[light, heavy], &HashMap::new());
        assert_eq!(dest, Some(light));
    }

    #[test]
    fn pending_grows_count_against_a_node() {
        let dm = DistributionManager::new();
        let a = NodeId::new(1);
        let b = NodeId::new(2);
        // Both empty, but `a` already has 5 grows in flight.
        let mut pending = HashMap::new();
        pending.insert(a, 5);

        let dest = pick_destination(&dm, CollectionId::new(1), &[a, b], &pending);
        assert_eq!(dest, Some(b));
    }

    #[test]
    fn ties_break_on_lowest_node_id() {
        let dm = DistributionManager::new();
        let dest = pick_destination(&dm, CollectionId::new(1), &[NodeId::new(3), NodeId::new(1)], &HashMap::new());
        assert_eq!(dest, Some(NodeId::new(1)));
    }
}
