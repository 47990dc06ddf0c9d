use async_trait::async_trait;
use qcoord_types::{ChannelName, NodeId, SegmentId};

/// Outcome of a single worker RPC, classified the way the executor needs
/// to react: unrecoverable, treat-as-success, or retry.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum WorkerRpcError {
    #[error("node {0} not found")]
    NodeNotFound(NodeId),
    #[error("segment {0} not found on node")]
    SegmentNotFound(SegmentId),
    #[error("segment {0} not loaded on node")]
    SegmentNotLoaded(SegmentId),
    /// The worker rejected a `Grow` because it cannot fit the segment in
    /// memory. Distinct from a transient RPC failure: the caller should
    /// record this against the collection's failed-load cache rather than
    /// blindly retrying the same node.
    #[error("node has insufficient memory to load")]
    InsufficientMemoryToLoad,
    #[error("worker rpc failed: {0}")]
    Other(String),
}

/// The worker-facing RPC surface the executor drives. Named after the
/// spec's `LoadSegments`/`ReleaseSegments`/`WatchDmChannels`/
/// `UnsubDmChannel` worker RPCs (§6), grouped by the Grow/Reduce instruction
/// they implement rather than by wire method.
#[async_trait]
pub trait WorkerClient: Send + Sync {
    /// One batched `LoadSegments` call: all segments merged for this node
    /// and channel within one dispatch window.
    async fn grow_segments(&self, node: NodeId, channel: &ChannelName, segment_ids: &[SegmentId]) -> Result<(), WorkerRpcError>;

    async fn reduce_segment(&self, node: NodeId, segment_id: SegmentId) -> Result<(), WorkerRpcError>;

    async fn grow_channel(&self, node: NodeId, channel: &ChannelName) -> Result<(), WorkerRpcError>;

    async fn reduce_channel(&self, node: NodeId, channel: &ChannelName) -> Result<(), WorkerRpcError>;
}

#[cfg(any(test, feature = "test-fakes"))]
pub mod fakes {
    use std::collections::{HashMap, HashSet};

    use parking_lot::Mutex;

    use super::{async_trait, ChannelName, NodeId, SegmentId, WorkerClient, WorkerRpcError};

    #[derive(Debug, Default)]
    struct NodeState {
        segments: HashSet<SegmentId>,
        channels: HashSet<ChannelName>,
    }

    /// An in-memory worker fake for scheduler/executor tests: tracks
    /// per-node segment/channel membership and lets a test pre-configure
    /// which nodes are "offline" (`NodeNotFound`) or which segments should
    /// report missing on reduce.
    #[derive(Default)]
    pub struct FakeWorkerClient {
        nodes: Mutex<HashMap<NodeId, NodeState>>,
        offline: Mutex<HashSet<NodeId>>,
        out_of_memory: Mutex<HashSet<NodeId>>,
    }

    impl FakeWorkerClient {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_offline(&self, node: NodeId) {
            self.offline.lock().insert(node);
        }

        /// Makes subsequent `grow_segments`/`grow_channel` calls against
        /// `node` fail with `InsufficientMemoryToLoad` instead of succeeding.
        pub fn set_out_of_memory(&self, node: NodeId) {
            self.out_of_memory.lock().insert(node);
        }

        pub fn has_segment(&self, node: NodeId, segment_id: SegmentId) -> bool {
            self.nodes.lock().get(&node).is_some_and(|s| s.segments.contains(&segment_id))
        }

        pub fn has_channel(&self, node: NodeId, channel: &ChannelName) -> bool {
            self.nodes.lock().get(&node).is_some_and(|s| s.channels.contains(channel))
        }
    }

    #[async_trait]
    impl WorkerClient for FakeWorkerClient {
        async fn grow_segments(&self, node: NodeId, channel: &ChannelName, segment_ids: &[SegmentId]) -> Result<(), WorkerRpcError> {
            if self.offline.lock().contains(&node) {
                return Err(WorkerRpcError::NodeNotFound(node));
            }
            if self.out_of_memory.lock().contains(&node) {
                return Err(WorkerRpcError::InsufficientMemoryToLoad);
            }
            let mut guard = self.nodes.lock();
            let entry = guard.entry(node).or_default();
            entry.channels.insert(channel.clone());
            entry.segments.extend(segment_ids.iter().copied());
            Ok(())
        }

        async fn reduce_segment(&self, node: NodeId, segment_id: SegmentId) -> Result<(), WorkerRpcError> {
            if self.offline.lock().contains(&node) {
                return Err(WorkerRpcError::NodeNotFound(node));
            }
            let mut guard = self.nodes.lock();
            let entry = guard.entry(node).or_default();
            if !entry.segments.remove(&segment_id) {
                return Err(WorkerRpcError::SegmentNotFound(segment_id));
            }
            Ok(())
        }

        async fn grow_channel(&self, node: NodeId, channel: &ChannelName) -> Result<(), WorkerRpcError> {
            if self.offline.lock().contains(&node) {
                return Err(WorkerRpcError::NodeNotFound(node));
            }
            if self.out_of_memory.lock().contains(&node) {
                return Err(WorkerRpcError::InsufficientMemoryToLoad);
            }
            self.nodes.lock().entry(node).or_default().channels.insert(channel.clone());
            Ok(())
        }

        async fn reduce_channel(&self, node: NodeId, channel: &ChannelName) -> Result<(), WorkerRpcError> {
            if self.offline.lock().contains(&node) {
                return Err(WorkerRpcError::NodeNotFound(node));
            }
            self.nodes.lock().entry(node).or_default().channels.remove(channel);
            Ok(())
        }
    }
}
