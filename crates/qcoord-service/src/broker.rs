//! The storage-service broker: an external collaborator (spec §1, §4.4)
//! that knows a collection's partitions and can compute the recovery
//! info — channels, sealed/growing segments, and a checkpoint — a fresh
//! *next* target should be built from. The coordinator never talks to
//! storage directly; it only calls this trait.

use async_trait::async_trait;

use qcoord_target::TargetSnapshot;
use qcoord_types::{CollectionId, PartitionId};

use crate::error::CoordinatorResult;

/// RPC surface the coordinator drives to resolve partitions and rebuild
/// targets. Implemented against the real storage-service RPC client in
/// production; `test-fakes` exposes an in-memory stand-in for tests.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Every partition currently known to exist for `collection_id`, used
    /// to seed `PartitionLoadInfo` records on a whole-collection load.
    async fn list_partitions(&self, collection_id: CollectionId) -> CoordinatorResult<Vec<PartitionId>>;

    /// Builds the *next* target snapshot for `collection_id` by resolving
    /// recovery info (channels, sealed/growing segments, checkpoint) for
    /// every partition in `partitions`.
    async fn recovery_info(&self, collection_id: CollectionId, partitions: &[PartitionId]) -> CoordinatorResult<TargetSnapshot>;
}

#[cfg(any(test, feature = "test-fakes"))]
pub mod fakes {
    use std::collections::HashMap;

    use parking_lot::Mutex;

    use super::{async_trait, Broker, CollectionId, CoordinatorResult, PartitionId, TargetSnapshot};

    /// In-memory broker fake: a test pre-loads which partitions and which
    /// recovery snapshot a collection should resolve to, mirroring what a
    /// real storage-service broker would report.
    #[derive(Default)]
    pub struct FakeBroker {
        partitions: Mutex<HashMap<CollectionId, Vec<PartitionId>>>,
        snapshots: Mutex<HashMap<CollectionId, TargetSnapshot>>,
    }

    impl FakeBroker {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_partitions(&self, collection_id: CollectionId, partitions: Vec<PartitionId>) {
            self.partitions.lock().insert(collection_id, partitions);
        }

        pub fn set_snapshot(&self, collection_id: CollectionId, snapshot: TargetSnapshot) {
            self.snapshots.lock().insert(collection_id, snapshot);
        }
    }

    #[async_trait]
    impl Broker for FakeBroker {
        async fn list_partitions(&self, collection_id: CollectionId) -> CoordinatorResult<Vec<PartitionId>> {
            Ok(self.partitions.lock().get(&collection_id).cloned().unwrap_or_default())
        }

        async fn recovery_info(&self, collection_id: CollectionId, _partitions: &[PartitionId]) -> CoordinatorResult<TargetSnapshot> {
            Ok(self.snapshots.lock().get(&collection_id).cloned().unwrap_or_default())
        }
    }
}
