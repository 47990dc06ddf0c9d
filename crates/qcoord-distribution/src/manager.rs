use std::collections::HashMap;
use std::time::Instant;

use parking_lot::RwLock;
use qcoord_types::{ChannelName, CollectionId, NodeId, SegmentId};

use crate::views::{ChannelView, SegmentFilter, SegmentView, ShardLeadership};

/// Three independently locked maps keyed by `NodeId`, mirroring the
/// concurrency model in spec §4.3: readers of one view never block
/// readers or writers of another.
pub struct DistributionManager {
    segments: RwLock<HashMap<NodeId, Vec<SegmentView>>>,
    channels: RwLock<HashMap<NodeId, Vec<ChannelView>>>,
    leaders: RwLock<HashMap<NodeId, Vec<ShardLeadership>>>,
    last_heartbeat: RwLock<HashMap<NodeId, Instant>>,
}

impl DistributionManager {
    pub fn new() -> Self {
        Self {
            segments: RwLock::new(HashMap::new()),
            channels: RwLock::new(HashMap::new()),
            leaders: RwLock::new(HashMap::new()),
            last_heartbeat: RwLock::new(HashMap::new()),
        }
    }

    fn touch(&self, node: NodeId) {
        self.last_heartbeat.write().insert(node, Instant::now());
    }

    /// Unconditionally replaces `node`'s reported segment list.
    pub fn update_segments(&self, node: NodeId, segments: Vec<SegmentView>) {
        self.segments.write().insert(node, segments);
        self.touch(node);
    }

    /// Unconditionally replaces `node`'s reported channel subscriptions.
    pub fn update_channels(&self, node: NodeId, channels: Vec<ChannelView>) {
        self.channels.write().insert(node, channels);
        self.touch(node);
    }

    /// Unconditionally replaces `node`'s reported shard leaderships.
    pub fn update_leaders(&self, node: NodeId, leaderships: Vec<ShardLeadership>) {
        self.leaders.write().insert(node, leaderships);
        self.touch(node);
    }

    /// Drops every entry for `node` from all three views — called when the
    /// node's session is removed.
    pub fn remove_node(&self, node: NodeId) {
        self.segments.write().remove(&node);
        self.channels.write().remove(&node);
        self.leaders.write().remove(&node);
        self.last_heartbeat.write().remove(&node);
        tracing::info!(node_id = %node, "dropped distribution entries for removed node");
    }

    /// Drops only `node`'s reported leaderships, leaving its segment and
    /// channel views intact. Used by the leader checker to mark a shard as
    /// leaderless when the reporting node's heartbeat has gone stale
    /// without declaring the node fully offline.
    pub fn clear_leadership(&self, node: NodeId) {
        self.leaders.write().remove(&node);
    }

    pub fn last_heartbeat(&self, node: NodeId) -> Option<Instant> {
        self.last_heartbeat.read().get(&node).copied()
    }

    pub fn segments_on(&self, node: NodeId) -> Vec<SegmentView> {
        self.segments.read().get(&node).cloned().unwrap_or_default()
    }

    pub fn channels_on(&self, node: NodeId) -> Vec<ChannelView> {
        self.channels.read().get(&node).cloned().unwrap_or_default()
    }

    pub fn leaderships_on(&self, node: NodeId) -> Vec<ShardLeadership> {
        self.leaders.read().get(&node).cloned().unwrap_or_default()
    }

    /// Whether `segment` currently appears as loaded on `node`.
    pub fn has_segment(&self, node: NodeId, segment: SegmentId) -> bool {
        self.segments
            .read()
            .get(&node)
            .is_some_and(|segs| segs.iter().any(|s| s.segment_id == segment))
    }

    /// Whether `node` currently reports subscribing to `channel`.
    pub fn has_channel(&self, node: NodeId, channel: &ChannelName) -> bool {
        self.channels
            .read()
            .get(&node)
            .is_some_and(|chans| chans.iter().any(|c| &c.channel == channel))
    }

    /// AND-composed filter across collection, node, channel, and level;
    /// the returned order is not guaranteed.
    pub fn segments_matching(&self, filter: &SegmentFilter) -> Vec<SegmentView> {
        self.segments
            .read()
            .iter()
            .flat_map(|(&node, segs)| {
                segs.iter()
                    .filter(move |s| filter.matches(node, s))
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// The unique node that is both in `replica_nodes` and reports leading
    /// `channel`, or `None` if no such node exists.
    pub fn shard_leader(&self, replica_nodes: &[NodeId], channel: &ChannelName) -> Option<NodeId> {
        let guard = self.leaders.read();
        replica_nodes.iter().copied().find(|&node| {
            guard
                .get(&node)
                .is_some_and(|leaderships| leaderships.iter().any(|l| &l.channel == channel))
        })
    }

    /// Per-node delta used by balancing and merge decisions: how many
    /// segments a node is reported to currently hold for `collection_id`,
    /// used as the baseline the task scheduler's `GetNodeSegmentDelta`
    /// accounts against.
    pub fn segment_count_on(&self, node: NodeId, collection_id: CollectionId) -> usize {
        self.segments
            .read()
            .get(&node)
            .map(|segs| segs.iter().filter(|s| s.collection_id == collection_id).count())
            .unwrap_or(0)
    }
}

impl Default for DistributionManager {
    fn default() -> Self {
        Self::new()
    }
}
