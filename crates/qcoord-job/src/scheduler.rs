use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use qcoord_catalog::{Catalog, CollectionLoadInfo, PartitionLoadInfo};
use qcoord_resource::{ResourceError, ResourceManager};
use qcoord_types::{CollectionId, LoadType, PartitionId, ResourceGroupName, SegmentId};
use tokio::sync::{mpsc, Mutex};

use crate::error::JobError;
use crate::kind::{
    HandoffSegmentsRequest, LoadCollectionRequest, LoadPartitionRequest, ReleaseCollectionRequest,
    ReleasePartitionRequest,
};

/// Follow-up work a completed job hands off to the reconciliation layer.
#[derive(Debug, Clone)]
pub enum JobOutcome {
    /// The collection's persisted intent changed; its target snapshot
    /// needs to be rebuilt and, once saturated, promoted.
    TargetRefreshNeeded(CollectionId),
    /// A handoff segment should be loaded onto the replica's leader node.
    HandoffLoadReady {
        collection_id: CollectionId,
        partition_id: PartitionId,
        segment_id: SegmentId,
    },
    /// Once the load above completes, these compaction sources should be
    /// released.
    HandoffReleaseReady {
        collection_id: CollectionId,
        partition_id: PartitionId,
        sources: Vec<SegmentId>,
    },
}

/// Serializes long-lived collection operations.
///
/// Each collection gets its own `tokio::sync::Mutex`, acquired for the
/// duration of a job and released only once the job's records are fully
/// persisted (or fully reverted on failure). Mutexes for distinct
/// collections are independent, so different collections' jobs run fully
/// in parallel; `tokio::sync::Mutex` queues waiters FIFO, which is what
/// gives a single collection's jobs their ordering.
pub struct JobScheduler {
    catalog: Arc<Catalog>,
    resources: Arc<ResourceManager>,
    locks: RwLock<HashMap<CollectionId, Arc<Mutex<()>>>>,
    events: mpsc::UnboundedSender<JobOutcome>,
}

impl JobScheduler {
    pub fn new(catalog: Arc<Catalog>, resources: Arc<ResourceManager>) -> (Self, mpsc::UnboundedReceiver<JobOutcome>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                catalog,
                resources,
                locks: RwLock::new(HashMap::new()),
                events: tx,
            },
            rx,
        )
    }

    fn lock_for(&self, cid: CollectionId) -> Arc<Mutex<()>> {
        if let Some(lock) = self.locks.read().get(&cid) {
            return lock.clone();
        }
        self.locks.write().entry(cid).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    fn validate_resource_groups(&self, names: &[ResourceGroupName]) -> Result<(), JobError> {
        for name in names {
            if self.resources.group(name).is_none() {
                return Err(JobError::Resource(ResourceError::NotFound(name.clone())));
            }
        }
        Ok(())
    }

    fn post(&self, outcome: JobOutcome) {
        // The receiving end is the reconciliation layer; if it has been
        // dropped (e.g. in a unit test that only checks catalog state)
        // there's nothing useful to do with the send error.
        let _ = self.events.send(outcome);
    }

    /// `LoadCollection`. Idempotent on identical parameters; fails with
    /// `ParameterMismatched` on a conflicting re-load. On any persist
    /// failure after replicas have been spawned, removes the partially
    /// written records before returning.
    pub async fn load_collection(&self, req: LoadCollectionRequest) -> Result<(), JobError> {
        let lock = self.lock_for(req.collection_id);
        let _guard = lock.lock().await;

        if self.catalog.collections.check_load_idempotence(
            req.collection_id,
            req.replica_number,
            LoadType::Collection,
            &req.resource_groups,
        )? {
            tracing::info!(collection_id = %req.collection_id, "load_collection: idempotent no-op");
            return Ok(());
        }

        self.validate_resource_groups(&req.resource_groups)?;
        let resource_group = req.resource_groups.first().cloned().unwrap_or_else(ResourceGroupName::default_group);

        let replicas = self
            .catalog
            .replicas
            .spawn_replicas(req.collection_id, req.replica_number, resource_group, &req.candidate_nodes)
            .await?;

        let partition_infos: Vec<PartitionLoadInfo> = req
            .partitions
            .iter()
            .map(|&pid| PartitionLoadInfo::new(req.collection_id, pid))
            .collect();

        if let Err(e) = self.catalog.partitions.persist_many(partition_infos).await {
            let _ = self.catalog.replicas.remove_collection(req.collection_id).await;
            return Err(e.into());
        }

        let info = CollectionLoadInfo::new(req.collection_id, req.replica_number, LoadType::Collection, req.resource_groups);
        if let Err(e) = self.catalog.collections.persist(info).await {
            let _ = self.catalog.replicas.remove_collection(req.collection_id).await;
            let _ = self.catalog.partitions.remove_collection(req.collection_id).await;
            return Err(e.into());
        }

        tracing::info!(collection_id = %req.collection_id, replicas = replicas.len(), "load_collection committed");
        self.post(JobOutcome::TargetRefreshNeeded(req.collection_id));
        Ok(())
    }

    /// `LoadPartition`. Fails with `ParameterMismatched` if the collection
    /// is already loaded in its entirety (partitions must be loaded at
    /// collection granularity in that case).
    pub async fn load_partitions(&self, req: LoadPartitionRequest) -> Result<(), JobError> {
        let lock = self.lock_for(req.collection_id);
        let _guard = lock.lock().await;

        if let Some(existing) = self.catalog.collections.get(req.collection_id) {
            if existing.load_type == LoadType::Collection {
                return Err(JobError::PartitionLoadOverWholeCollection(req.collection_id));
            }
        }

        self.catalog.collections.check_load_idempotence(
            req.collection_id,
            req.replica_number,
            LoadType::Partition,
            &req.resource_groups,
        )?;
        self.validate_resource_groups(&req.resource_groups)?;

        if self.catalog.replicas.list_by_collection(req.collection_id).is_empty() {
            let resource_group = req.resource_groups.first().cloned().unwrap_or_else(ResourceGroupName::default_group);
            if let Err(e) = self
                .catalog
                .replicas
                .spawn_replicas(req.collection_id, req.replica_number, resource_group, &req.candidate_nodes)
                .await
            {
                return Err(e.into());
            }
        }

        let partition_infos: Vec<PartitionLoadInfo> = req
            .partition_ids
            .iter()
            .map(|&pid| PartitionLoadInfo::new(req.collection_id, pid))
            .collect();
        if let Err(e) = self.catalog.partitions.persist_many(partition_infos).await {
            let _ = self.catalog.replicas.remove_collection(req.collection_id).await;
            return Err(e.into());
        }

        let collection_info = self.catalog.collections.get(req.collection_id).unwrap_or_else(|| {
            CollectionLoadInfo::new(req.collection_id, req.replica_number, LoadType::Partition, req.resource_groups.clone())
        });
        if let Err(e) = self.catalog.collections.persist(collection_info).await {
            let _ = self.catalog.replicas.remove_collection(req.collection_id).await;
            let _ = self.catalog.partitions.remove_collection(req.collection_id).await;
            return Err(e.into());
        }

        self.post(JobOutcome::TargetRefreshNeeded(req.collection_id));
        Ok(())
    }

    /// `ReleaseCollection`. Removes every persisted record for the
    /// collection.
    pub async fn release_collection(&self, req: ReleaseCollectionRequest) -> Result<(), JobError> {
        let lock = self.lock_for(req.collection_id);
        let _guard = lock.lock().await;

        self.catalog.partitions.remove_collection(req.collection_id).await?;
        self.catalog.replicas.remove_collection(req.collection_id).await?;
        self.catalog.collections.remove(req.collection_id).await?;

        self.post(JobOutcome::TargetRefreshNeeded(req.collection_id));
        Ok(())
    }

    /// `ReleasePartition`. Fails outright on a whole-collection-loaded
    /// collection — release must happen at collection granularity there.
    pub async fn release_partitions(&self, req: ReleasePartitionRequest) -> Result<(), JobError> {
        let lock = self.lock_for(req.collection_id);
        let _guard = lock.lock().await;

        if let Some(existing) = self.catalog.collections.get(req.collection_id) {
            if existing.load_type == LoadType::Collection {
                return Err(JobError::PartitionReleaseOverWholeCollection(req.collection_id));
            }
        }

        for pid in &req.partition_ids {
            self.catalog.partitions.remove(req.collection_id, *pid).await?;
        }

        self.post(JobOutcome::TargetRefreshNeeded(req.collection_id));
        Ok(())
    }

    /// `TransferReplica`. Relabels the `n` lowest-numbered replicas of
    /// `collection_id` currently in `src` to `dst`, round-robin-assigning
    /// them nodes from `dst`'s current membership. Unlike
    /// [`ResourceManager::transfer`], which migrates nodes between groups
    /// for general pool rebalancing, this composes the catalog's replica
    /// index with the already-populated destination group: the replica
    /// follows the group rather than dragging its old nodes along.
    pub async fn transfer_replica(
        &self,
        collection_id: CollectionId,
        src: ResourceGroupName,
        dst: ResourceGroupName,
        n: u32,
    ) -> Result<Vec<qcoord_catalog::Replica>, JobError> {
        let lock = self.lock_for(collection_id);
        let _guard = lock.lock().await;

        let dst_group = self.resources.group(&dst).ok_or_else(|| JobError::Resource(ResourceError::NotFound(dst.clone())))?;
        let dst_nodes: Vec<_> = dst_group.nodes.iter().copied().collect();
        if dst_nodes.is_empty() {
            return Err(JobError::Resource(ResourceError::InsufficientNodes {
                group: dst.clone(),
                available: 0,
                requested: 1,
            }));
        }

        let mut candidates: Vec<_> = self
            .catalog
            .replicas
            .list_by_collection(collection_id)
            .into_iter()
            .filter(|r| r.resource_group == src)
            .collect();
        candidates.sort_by_key(|r| r.replica_id.as_i64());

        let requested = n as usize;
        if candidates.len() < requested {
            return Err(JobError::InsufficientReplicas {
                group: src,
                available: candidates.len(),
                requested,
            });
        }

        let mut transferred = Vec::with_capacity(requested);
        for (i, replica) in candidates.into_iter().take(requested).enumerate() {
            let node = dst_nodes[i % dst_nodes.len()];
            let new_nodes = std::iter::once(node).collect();
            let updated = self.catalog.replicas.reassign(collection_id, replica.replica_id, dst.clone(), new_nodes).await?;
            transferred.push(updated);
        }

        tracing::info!(collection_id = %collection_id, src = %src, dst = %dst, count = transferred.len(), "transferred replicas between resource groups");
        self.post(JobOutcome::TargetRefreshNeeded(collection_id));
        Ok(transferred)
    }

    /// `HandoffSegments`. The job itself performs no catalog mutation —
    /// it synthesizes the load-then-release instruction pair for the
    /// reconciliation layer, which drives it through the task scheduler.
    pub async fn handoff_segments(&self, req: HandoffSegmentsRequest, sources: Vec<SegmentId>) -> Result<(), JobError> {
        let lock = self.lock_for(req.collection_id);
        let _guard = lock.lock().await;

        self.post(JobOutcome::HandoffLoadReady {
            collection_id: req.collection_id,
            partition_id: req.partition_id,
            segment_id: req.new_segment,
        });
        self.post(JobOutcome::HandoffReleaseReady {
            collection_id: req.collection_id,
            partition_id: req.partition_id,
            sources,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qcoord_meta::{KeyLayout, MemoryMetaStore, MetaStore};
    use qcoord_types::NodeId;

    fn scheduler() -> (JobScheduler, mpsc::UnboundedReceiver<JobOutcome>) {
        let meta: Arc<dyn MetaStore> = Arc::new(MemoryMetaStore::new());
        let catalog = Arc::new(Catalog::new(meta, KeyLayout::new("root")));
        let resources = Arc::new(ResourceManager::new());
        JobScheduler::new(catalog, resources)
    }

    #[tokio::test]
    async fn load_collection_persists_replicas_and_partitions() {
        let (scheduler, mut events) = scheduler();
        let req = LoadCollectionRequest {
            collection_id: CollectionId::new(1000),
            replica_number: 1,
            resource_groups: vec![ResourceGroupName::default_group()],
            candidate_nodes: vec![NodeId::new(1)],
            partitions: vec![PartitionId::new(100), PartitionId::new(101)],
        };

        scheduler.load_collection(req).await.unwrap();

        assert!(scheduler.catalog.collections.contains(CollectionId::new(1000)));
        assert_eq!(scheduler.catalog.partitions.list_by_collection(CollectionId::new(1000)).len(), 2);
        assert!(matches!(events.recv().await, Some(JobOutcome::TargetRefreshNeeded(_))));
    }

    #[tokio::test]
    async fn repeated_load_collection_with_same_params_is_a_no_op() {
        let (scheduler, _events) = scheduler();
        let req = LoadCollectionRequest {
            collection_id: CollectionId::new(1000),
            replica_number: 1,
            resource_groups: vec![ResourceGroupName::default_group()],
            candidate_nodes: vec![NodeId::new(1)],
            partitions: vec![PartitionId::new(100)],
        };
        scheduler.load_collection(req.clone()).await.unwrap();
        scheduler.load_collection(req).await.unwrap();

        assert_eq!(scheduler.catalog.replicas.list_by_collection(CollectionId::new(1000)).len(), 1);
    }

    #[tokio::test]
    async fn load_collection_with_mismatched_replica_count_fails() {
        let (scheduler, _events) = scheduler();
        let cid = CollectionId::new(1000);
        scheduler
            .load_collection(LoadCollectionRequest {
                collection_id: cid,
                replica_number: 1,
                resource_groups: vec![ResourceGroupName::default_group()],
                candidate_nodes: vec![NodeId::new(1)],
                partitions: vec![PartitionId::new(100)],
            })
            .await
            .unwrap();

        let err = scheduler
            .load_collection(LoadCollectionRequest {
                collection_id: cid,
                replica_number: 2,
                resource_groups: vec![ResourceGroupName::default_group()],
                candidate_nodes: vec![NodeId::new(1), NodeId::new(2)],
                partitions: vec![PartitionId::new(100)],
            })
            .await
            .unwrap_err();

        assert_eq!(err.code(), qcoord_types::ErrorCode::ParameterMismatched);
    }

    #[tokio::test]
    async fn load_partitions_over_whole_collection_is_rejected() {
        let (scheduler, _events) = scheduler();
        let cid = CollectionId::new(1000);
        scheduler
            .load_collection(LoadCollectionRequest {
                collection_id: cid,
                replica_number: 1,
                resource_groups: vec![ResourceGroupName::default_group()],
                candidate_nodes: vec![NodeId::new(1)],
                partitions: vec![PartitionId::new(100)],
            })
            .await
            .unwrap();

        let err = scheduler
            .load_partitions(LoadPartitionRequest {
                collection_id: cid,
                partition_ids: vec![PartitionId::new(200)],
                replica_number: 1,
                resource_groups: vec![ResourceGroupName::default_group()],
                candidate_nodes: vec![NodeId::new(1)],
            })
            .await
            .unwrap_err();

        assert!(matches!(err, JobError::PartitionLoadOverWholeCollection(_)));
    }

    #[tokio::test]
    async fn release_partitions_over_whole_collection_is_rejected() {
        let (scheduler, _events) = scheduler();
        let cid = CollectionId::new(1000);
        scheduler
            .load_collection(LoadCollectionRequest {
                collection_id: cid,
                replica_number: 1,
                resource_groups: vec![ResourceGroupName::default_group()],
                candidate_nodes: vec![NodeId::new(1)],
                partitions: vec![PartitionId::new(100)],
            })
            .await
            .unwrap();

        let err = scheduler
            .release_partitions(ReleasePartitionRequest {
                collection_id: cid,
                partition_ids: vec![PartitionId::new(100)],
            })
            .await
            .unwrap_err();

        assert_eq!(err.code(), qcoord_types::ErrorCode::UnexpectedError);
    }

    #[tokio::test]
    async fn load_collection_fails_with_unknown_resource_group() {
        let (scheduler, _events) = scheduler();
        let err = scheduler
            .load_collection(LoadCollectionRequest {
                collection_id: CollectionId::new(1000),
                replica_number: 1,
                resource_groups: vec![ResourceGroupName::new("does-not-exist")],
                candidate_nodes: vec![NodeId::new(1)],
                partitions: vec![],
            })
            .await
            .unwrap_err();

        assert!(matches!(err, JobError::Resource(ResourceError::NotFound(_))));
    }

    #[tokio::test]
    async fn handoff_segments_posts_load_then_release() {
        let (scheduler, mut events) = scheduler();
        scheduler
            .handoff_segments(
                HandoffSegmentsRequest {
                    collection_id: CollectionId::new(1000),
                    partition_id: PartitionId::new(100),
                    new_segment: SegmentId::new(99),
                },
                vec![SegmentId::new(1), SegmentId::new(2)],
            )
            .await
            .unwrap();

        assert!(matches!(events.recv().await, Some(JobOutcome::HandoffLoadReady { .. })));
        assert!(matches!(events.recv().await, Some(JobOutcome::HandoffReleaseReady { .. })));
    }

    #[tokio::test]
    async fn transfer_replica_relabels_and_reassigns_nodes() {
        let (scheduler, _events) = scheduler();
        let cid = CollectionId::new(1000);
        scheduler
            .load_collection(LoadCollectionRequest {
                collection_id: cid,
                replica_number: 2,
                resource_groups: vec![ResourceGroupName::default_group()],
                candidate_nodes: vec![NodeId::new(1), NodeId::new(2)],
                partitions: vec![],
            })
            .await
            .unwrap();

        scheduler.resources.create(ResourceGroupName::new("rg3"), 10).unwrap();
        scheduler.resources.add_node(&ResourceGroupName::new("rg3"), NodeId::new(10)).unwrap();
        scheduler.resources.add_node(&ResourceGroupName::new("rg3"), NodeId::new(11)).unwrap();

        let transferred = scheduler
            .transfer_replica(cid, ResourceGroupName::default_group(), ResourceGroupName::new("rg3"), 2)
            .await
            .unwrap();

        assert_eq!(transferred.len(), 2);
        for replica in &transferred {
            assert_eq!(replica.resource_group, ResourceGroupName::new("rg3"));
            assert_eq!(replica.nodes.len(), 1);
        }
    }

    #[tokio::test]
    async fn transfer_replica_fails_when_not_enough_replicas_in_source_group() {
        let (scheduler, _events) = scheduler();
        let cid = CollectionId::new(1000);
        scheduler.resources.create(ResourceGroupName::new("rg3"), 10).unwrap();
        scheduler.resources.add_node(&ResourceGroupName::new("rg3"), NodeId::new(10)).unwrap();

        let err = scheduler
            .transfer_replica(cid, ResourceGroupName::default_group(), ResourceGroupName::new("rg3"), 2)
            .await
            .unwrap_err();

        assert!(matches!(err, JobError::InsufficientReplicas { available: 0, requested: 2, .. }));
    }

    #[tokio::test]
    async fn release_collection_removes_all_records() {
        let (scheduler, _events) = scheduler();
        let cid = CollectionId::new(1000);
        scheduler
            .load_collection(LoadCollectionRequest {
                collection_id: cid,
                replica_number: 1,
                resource_groups: vec![ResourceGroupName::default_group()],
                candidate_nodes: vec![NodeId::new(1)],
                partitions: vec![PartitionId::new(100)],
            })
            .await
            .unwrap();

        scheduler.release_collection(ReleaseCollectionRequest { collection_id: cid }).await.unwrap();

        assert!(!scheduler.catalog.collections.contains(cid));
        assert!(scheduler.catalog.partitions.list_by_collection(cid).is_empty());
        assert!(scheduler.catalog.replicas.list_by_collection(cid).is_empty());
    }
}
