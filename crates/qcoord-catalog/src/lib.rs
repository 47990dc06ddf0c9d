//! # qcoord-catalog: collection, partition, and replica indices
//!
//! In-memory caches over the durable load intent held by `qcoord-meta`,
//! one reader-writer-locked manager per entity kind. Every mutating
//! operation persists first and updates its index only once the meta
//! store has acknowledged the write, so a crash never leaves the cache
//! ahead of durable state.

mod collection;
mod error;
mod partition;
mod records;
mod replica;

pub use collection::CollectionManager;
pub use error::CatalogError;
pub use partition::PartitionManager;
pub use records::{CollectionLoadInfo, PartitionLoadInfo, Replica};
pub use replica::ReplicaManager;

use std::sync::Arc;

use qcoord_meta::{KeyLayout, MetaStore};

/// Bundles the three entity managers behind one construction point so
/// callers wire a single meta store and key layout instead of threading
/// them through three constructors.
pub struct Catalog {
    pub collections: CollectionManager,
    pub partitions: PartitionManager,
    pub replicas: ReplicaManager,
}

impl Catalog {
    pub fn new(meta: Arc<dyn MetaStore>, keys: KeyLayout) -> Self {
        Self {
            collections: CollectionManager::new(meta.clone(), keys.clone()),
            partitions: PartitionManager::new(meta.clone(), keys.clone()),
            replicas: ReplicaManager::new(meta, keys),
        }
    }

    /// Rebuilds every index from the meta store. Indices are reconstructed
    /// top-down (collection, then partition, then replica) and never
    /// through cross-references between them.
    pub async fn load_all(&self) -> Result<(), CatalogError> {
        self.collections.load_all().await?;
        self.partitions.load_all().await?;
        self.replicas.load_all().await?;
        Ok(())
    }
}
