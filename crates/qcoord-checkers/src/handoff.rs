//! The handoff inbox record and its observer (§9). A compaction or
//! flush-on-seal writes one of these under `<root>/handoff/<cid>/<pid>/<sid>`
//! and the observer turns it into a `HandoffSegments` job; re-delivery of
//! the same key after the job has already run is a no-op, so at-least-once
//! watch semantics are safe to rely on.

use std::sync::Arc;

use qcoord_job::{HandoffSegmentsRequest, JobScheduler};
use qcoord_meta::{KeyLayout, MetaStore, WatchOp};
use qcoord_types::{CollectionId, PartitionId, SegmentId};
use serde::{Deserialize, Serialize};

use crate::error::CheckerError;

/// The durable payload behind a handoff key: the new segment produced by
/// a compaction or a seal, and the segments it supersedes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandoffRecord {
    pub collection_id: CollectionId,
    pub partition_id: PartitionId,
    pub new_segment: SegmentId,
    pub num_rows: u64,
    pub compaction_sources: Vec<SegmentId>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HandoffObserverReport {
    pub processed: usize,
    pub skipped_deletes: usize,
}

/// Drains `MetaStore::watch_prefix(handoff_prefix)` and turns each `Put`
/// into a `HandoffSegments` job, then deletes the key so the same record
/// is not handed off twice. `Delete` events (our own cleanup, observed
/// via the same watch) are ignored.
pub struct HandoffObserver {
    meta: Arc<dyn MetaStore>,
    keys: KeyLayout,
    jobs: Arc<JobScheduler>,
}

impl HandoffObserver {
    pub fn new(meta: Arc<dyn MetaStore>, keys: KeyLayout, jobs: Arc<JobScheduler>) -> Self {
        Self { meta, keys, jobs }
    }

    /// Processes every currently-pending handoff record under the prefix.
    /// Used at startup to recover records written before the last
    /// restart, and by [`Self::run`]'s initial pass.
    pub async fn drain_pending(&self) -> Result<HandoffObserverReport, CheckerError> {
        let mut report = HandoffObserverReport::default();
        let prefix = self.keys.handoff_prefix();
        for (key, value) in self.meta.load_with_prefix(&prefix).await? {
            self.process_one(&key, &value, &mut report).await?;
        }
        Ok(report)
    }

    /// Runs the long-lived watch loop. Exits once the watch channel
    /// closes (the store shutting down).
    pub async fn run(&self) -> Result<(), CheckerError> {
        self.drain_pending().await?;

        let mut rx = self.meta.watch_prefix(&self.keys.handoff_prefix());
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let mut report = HandoffObserverReport::default();
                    match event.op {
                        WatchOp::Put => {
                            if let Err(e) = self.process_one(&event.key, &event.value, &mut report).await {
                                tracing::error!(key = %event.key, error = %e, "handoff observer failed to process record");
                            }
                        }
                        WatchOp::Delete => report.skipped_deletes += 1,
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "handoff watch lagged; re-draining pending records");
                    self.drain_pending().await?;
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => return Ok(()),
            }
        }
    }

    async fn process_one(&self, key: &str, value: &[u8], report: &mut HandoffObserverReport) -> Result<(), CheckerError> {
        let record: HandoffRecord = serde_json::from_slice(value).map_err(|e| CheckerError::CorruptHandoffRecord(key.to_string(), e.to_string()))?;

        self.jobs
            .handoff_segments(
                HandoffSegmentsRequest {
                    collection_id: record.collection_id,
                    partition_id: record.partition_id,
                    new_segment: record.new_segment,
                },
                record.compaction_sources,
            )
            .await?;

        self.meta.remove(key).await?;
        report.processed += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qcoord_catalog::Catalog;
    use qcoord_meta::MemoryMetaStore;
    use qcoord_resource::ResourceManager;

    fn layout() -> KeyLayout {
        KeyLayout::new("root")
    }

    #[tokio::test]
    async fn drain_pending_processes_and_deletes_the_record() {
        let meta: Arc<dyn MetaStore> = Arc::new(MemoryMetaStore::new());
        let keys = layout();
        let catalog = Arc::new(Catalog::new(meta.clone(), keys.clone()));
        let resources = Arc::new(ResourceManager::new());
        let (jobs, _rx) = JobScheduler::new(catalog, resources);
        let jobs = Arc::new(jobs);

        let cid = CollectionId::new(1);
        let pid = PartitionId::new(1);
        let sid = SegmentId::new(100);
        let record = HandoffRecord {
            collection_id: cid,
            partition_id: pid,
            new_segment: sid,
            num_rows: 500,
            compaction_sources: vec![SegmentId::new(1), SegmentId::new(2)],
        };
        let key = keys.handoff(cid, pid, sid);
        meta.save(&key, serde_json::to_vec(&record).unwrap()).await.unwrap();

        let observer = HandoffObserver::new(meta.clone(), keys, jobs);
        let report = observer.drain_pending().await.unwrap();
        assert_eq!(report.processed, 1);
        assert!(meta.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_record_surfaces_as_an_error_without_deleting_the_key() {
        let meta: Arc<dyn MetaStore> = Arc::new(MemoryMetaStore::new());
        let keys = layout();
        let catalog = Arc::new(Catalog::new(meta.clone(), keys.clone()));
        let resources = Arc::new(ResourceManager::new());
        let (jobs, _rx) = JobScheduler::new(catalog, resources);
        let jobs = Arc::new(jobs);

        let key = keys.handoff(CollectionId::new(1), PartitionId::new(1), SegmentId::new(1));
        meta.save(&key, b"not json".to_vec()).await.unwrap();

        let observer = HandoffObserver::new(meta.clone(), keys, jobs);
        let err = observer.drain_pending().await.unwrap_err();
        assert!(matches!(err, CheckerError::CorruptHandoffRecord(..)));
        assert!(meta.get(&key).await.unwrap().is_some());
    }
}
