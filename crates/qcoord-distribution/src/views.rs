use std::collections::{HashMap, HashSet};

use qcoord_types::{ChannelName, CollectionId, NodeId, PartitionId, SegmentId, SegmentLevel};

/// One segment as currently reported loaded by a node.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentView {
    pub segment_id: SegmentId,
    pub collection_id: CollectionId,
    pub partition_id: PartitionId,
    pub channel: ChannelName,
    pub level: SegmentLevel,
    pub num_rows: u64,
    pub storage_version: u64,
    /// Opaque index descriptor, forwarded from the worker's report without
    /// interpretation — the coordinator never computes vector similarity.
    pub index_info: String,
    pub owning_node: NodeId,
    /// Monotonic per reassignment: bumped every time the segment moves to
    /// a different owning node.
    pub version: u64,
}

/// A channel subscription as currently reported by a node.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelView {
    pub channel: ChannelName,
    pub collection_id: CollectionId,
    pub node: NodeId,
}

/// One shard's leadership state as reported by the node currently leading
/// it: the segment ownership map plus the growing-segment set and the
/// target version the shard believes it is reconciling toward.
#[derive(Debug, Clone, PartialEq)]
pub struct ShardLeadership {
    pub channel: ChannelName,
    pub leader_node: NodeId,
    pub segment_versions: HashMap<SegmentId, (NodeId, u64)>,
    pub growing_segment_ids: HashSet<SegmentId>,
    pub target_version: u64,
}

/// AND-composed filter for [`crate::DistributionManager::segments_matching`].
/// Every `Some` field narrows the result; order of the returned segments is
/// not guaranteed.
#[derive(Debug, Clone, Default)]
pub struct SegmentFilter {
    pub collection_id: Option<CollectionId>,
    pub node: Option<NodeId>,
    pub channel: Option<ChannelName>,
    pub level: Option<SegmentLevel>,
}

impl SegmentFilter {
    pub fn matches(&self, node: NodeId, segment: &SegmentView) -> bool {
        self.collection_id.is_none_or(|cid| cid == segment.collection_id)
            && self.node.is_none_or(|n| n == node)
            && self.channel.as_ref().is_none_or(|c| *c == segment.channel)
            && self.level.is_none_or(|l| l == segment.level)
    }
}
