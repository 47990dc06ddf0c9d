use qcoord_types::{CollectionId, NodeId, PartitionId, ResourceGroupName, SegmentId};

/// The five job kinds the scheduler serializes per collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    LoadCollection,
    LoadPartition,
    ReleaseCollection,
    ReleasePartition,
    HandoffSegments,
}

#[derive(Debug, Clone)]
pub struct LoadCollectionRequest {
    pub collection_id: CollectionId,
    pub replica_number: u32,
    pub resource_groups: Vec<ResourceGroupName>,
    pub candidate_nodes: Vec<NodeId>,
    /// Partitions discovered from the broker for this collection.
    pub partitions: Vec<PartitionId>,
}

#[derive(Debug, Clone)]
pub struct LoadPartitionRequest {
    pub collection_id: CollectionId,
    pub partition_ids: Vec<PartitionId>,
    pub replica_number: u32,
    pub resource_groups: Vec<ResourceGroupName>,
    pub candidate_nodes: Vec<NodeId>,
}

#[derive(Debug, Clone, Copy)]
pub struct ReleaseCollectionRequest {
    pub collection_id: CollectionId,
}

#[derive(Debug, Clone)]
pub struct ReleasePartitionRequest {
    pub collection_id: CollectionId,
    pub partition_ids: Vec<PartitionId>,
}

#[derive(Debug, Clone, Copy)]
pub struct HandoffSegmentsRequest {
    pub collection_id: CollectionId,
    pub partition_id: PartitionId,
    pub new_segment: SegmentId,
}
