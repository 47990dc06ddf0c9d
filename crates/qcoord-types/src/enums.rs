use serde::{Deserialize, Serialize};

/// Load status of a collection or partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadStatus {
    Loading,
    Loaded,
}

/// Whether a collection was loaded in its entirety or as an explicit
/// partition set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadType {
    Collection,
    Partition,
}

/// Segment level, mirroring how the storage layer classifies segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SegmentLevel {
    /// Delete-only segment.
    L0,
    /// Normal sealed segment.
    L1,
    /// Receiving streaming writes.
    Growing,
}

/// Scope of data a segment task applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataScope {
    /// Growing segments only.
    Streaming,
    /// Sealed segments only.
    Historical,
    All,
}

/// Task priority bucket. Ordered so that `High > Normal > Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Normal,
    High,
}

/// A single per-node instruction kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    /// Load a segment onto / subscribe a channel on the target node.
    Grow,
    /// Release a segment from / unsubscribe a channel from the target node.
    Reduce,
}

#[cfg(test)]
mod tests {
    use super::Priority;

    #[test]
    fn priority_orders_high_above_low() {
        assert!(Priority::High > Priority::Normal);
        assert!(Priority::Normal > Priority::Low);
    }
}
