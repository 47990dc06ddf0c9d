use std::collections::BTreeSet;

use qcoord_types::{CollectionId, LoadStatus, LoadType, NodeId, PartitionId, ReplicaId, ResourceGroupName};
use serde::{Deserialize, Serialize};

/// Durable load intent for one collection.
///
/// Invariant upheld by [`crate::collection::CollectionManager`]: a
/// `CollectionId` either has a record with at least one persisted replica,
/// or has none at all. There is no half state visible after a crash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionLoadInfo {
    pub collection_id: CollectionId,
    pub replica_number: u32,
    pub load_type: LoadType,
    pub resource_groups: Vec<ResourceGroupName>,
    pub field_index_ids: Vec<i64>,
    pub status: LoadStatus,
    /// 0..=100, the arithmetic mean of loaded-partition percentages.
    pub load_percentage: u8,
    pub schema_version: u64,
    /// Partitions explicitly released under partial-load semantics.
    pub released_partitions: BTreeSet<PartitionId>,
}

impl CollectionLoadInfo {
    pub fn new(
        collection_id: CollectionId,
        replica_number: u32,
        load_type: LoadType,
        resource_groups: Vec<ResourceGroupName>,
    ) -> Self {
        Self {
            collection_id,
            replica_number,
            load_type,
            resource_groups,
            field_index_ids: Vec::new(),
            status: LoadStatus::Loading,
            load_percentage: 0,
            schema_version: 0,
            released_partitions: BTreeSet::new(),
        }
    }

    /// Whether `other` describes the same load intent as `self` — the
    /// idempotence check for a repeated `LoadCollection` call.
    pub fn matches_request(
        &self,
        replica_number: u32,
        load_type: LoadType,
        resource_groups: &[ResourceGroupName],
    ) -> bool {
        self.replica_number == replica_number
            && self.load_type == load_type
            && self.resource_groups.as_slice() == resource_groups
    }
}

/// Durable load intent for one partition, keyed by `(CollectionId, PartitionId)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionLoadInfo {
    pub collection_id: CollectionId,
    pub partition_id: PartitionId,
    pub status: LoadStatus,
    pub load_percentage: u8,
}

impl PartitionLoadInfo {
    pub fn new(collection_id: CollectionId, partition_id: PartitionId) -> Self {
        Self {
            collection_id,
            partition_id,
            status: LoadStatus::Loading,
            load_percentage: 0,
        }
    }
}

/// A durable replica record, keyed by `(CollectionId, ReplicaId)`.
///
/// Invariant upheld by [`crate::replica::ReplicaManager`]: for any
/// collection, the replicas partition their node sets — a node may belong
/// to at most one replica of a given collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Replica {
    pub collection_id: CollectionId,
    pub replica_id: ReplicaId,
    pub resource_group: ResourceGroupName,
    pub nodes: BTreeSet<NodeId>,
}

impl Replica {
    pub fn new(collection_id: CollectionId, replica_id: ReplicaId, resource_group: ResourceGroupName) -> Self {
        Self {
            collection_id,
            replica_id,
            resource_group,
            nodes: BTreeSet::new(),
        }
    }
}
