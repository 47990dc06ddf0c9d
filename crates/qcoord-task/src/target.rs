use qcoord_types::{ChannelName, DataScope, ReplicaId, SegmentId};

/// The single entity — one segment or one channel — a task drives Grow/
/// Reduce actions against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskTarget {
    Segment {
        replica_id: ReplicaId,
        segment_id: SegmentId,
        channel: ChannelName,
        scope: DataScope,
    },
    Channel {
        replica_id: ReplicaId,
        channel: ChannelName,
    },
}

/// The `(replica, entity)` key the pre-admission conflict check is keyed
/// on. Two segment tasks conflict regardless of `DataScope` — the scope
/// only narrows which segment version a task is chasing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConflictKey {
    Segment(ReplicaId, SegmentId),
    Channel(ReplicaId, ChannelName),
}

impl TaskTarget {
    pub fn conflict_key(&self) -> ConflictKey {
        match self {
            TaskTarget::Segment { replica_id, segment_id, .. } => ConflictKey::Segment(*replica_id, *segment_id),
            TaskTarget::Channel { replica_id, channel } => ConflictKey::Channel(*replica_id, channel.clone()),
        }
    }
}
