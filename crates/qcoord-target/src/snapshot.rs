use std::collections::{HashMap, HashSet};

use qcoord_types::{ChannelName, MsgPosition, SegmentId};

/// Per-channel metadata carried by a target snapshot: the seek position a
/// worker should watch from.
#[derive(Debug, Clone, PartialEq)]
pub struct DmChannelInfo {
    pub channel: ChannelName,
    pub seek_position: MsgPosition,
}

/// A historical segment entry inside a target snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentInfo {
    pub segment_id: SegmentId,
    pub num_rows: u64,
    pub insert_channel: ChannelName,
}

/// An immutable, per-collection intended state: the channel set, the
/// historical segment set, the growing-segment id set, and a checkpoint
/// position. `current` and `next` are both instances of this type; they
/// are never mutated in place, only replaced wholesale by
/// [`crate::TargetManager::set_next`] / `promote`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TargetSnapshot {
    pub channels: HashMap<ChannelName, DmChannelInfo>,
    pub historical_segments: HashMap<SegmentId, SegmentInfo>,
    pub growing_segments: HashSet<SegmentId>,
    pub checkpoint: Option<MsgPosition>,
}

impl TargetSnapshot {
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty() && self.historical_segments.is_empty() && self.growing_segments.is_empty()
    }
}
