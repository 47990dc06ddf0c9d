use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use qcoord_meta::{KeyLayout, MetaStore};
use qcoord_types::{CollectionId, PartitionId};

use crate::error::CatalogError;
use crate::records::PartitionLoadInfo;

/// In-memory index over persisted [`PartitionLoadInfo`] records, grouped
/// by owning collection for the load-percentage aggregation the
/// collection manager performs.
pub struct PartitionManager {
    meta: Arc<dyn MetaStore>,
    keys: KeyLayout,
    inner: RwLock<HashMap<(CollectionId, PartitionId), PartitionLoadInfo>>,
}

impl PartitionManager {
    pub fn new(meta: Arc<dyn MetaStore>, keys: KeyLayout) -> Self {
        Self {
            meta,
            keys,
            inner: RwLock::new(HashMap::new()),
        }
    }

    pub async fn load_all(&self) -> Result<(), CatalogError> {
        let prefix = self.keys.partition_loadinfo_prefix_all();
        let entries = self.meta.load_with_prefix(&prefix).await?;
        let mut index = HashMap::new();
        for (_, value) in entries {
            let info: PartitionLoadInfo = serde_json::from_slice(&value)
                .map_err(|e| CatalogError::IllegalArgument(format!("corrupt partition record: {e}")))?;
            index.insert((info.collection_id, info.partition_id), info);
        }
        *self.inner.write() = index;
        Ok(())
    }

    pub fn get(&self, cid: CollectionId, pid: PartitionId) -> Option<PartitionLoadInfo> {
        self.inner.read().get(&(cid, pid)).cloned()
    }

    pub fn list_by_collection(&self, cid: CollectionId) -> Vec<PartitionLoadInfo> {
        self.inner
            .read()
            .values()
            .filter(|p| p.collection_id == cid)
            .cloned()
            .collect()
    }

    /// Percentages of every partition belonging to `cid`, in no particular
    /// order — the caller only needs the arithmetic mean.
    pub fn percentages_for_collection(&self, cid: CollectionId) -> Vec<u8> {
        self.list_by_collection(cid).iter().map(|p| p.load_percentage).collect()
    }

    pub async fn persist(&self, info: PartitionLoadInfo) -> Result<(), CatalogError> {
        let key = self.keys.partition_loadinfo(info.collection_id, info.partition_id);
        let value = serde_json::to_vec(&info).expect("PartitionLoadInfo serializes");
        self.meta.save(&key, value).await?;
        self.inner.write().insert((info.collection_id, info.partition_id), info);
        Ok(())
    }

    /// Persists every partition in one atomic batch — used when a
    /// whole-collection load discovers its partitions from the broker.
    pub async fn persist_many(&self, infos: Vec<PartitionLoadInfo>) -> Result<(), CatalogError> {
        let entries = infos
            .iter()
            .map(|info| {
                let key = self.keys.partition_loadinfo(info.collection_id, info.partition_id);
                let value = serde_json::to_vec(info).expect("PartitionLoadInfo serializes");
                (key, value)
            })
            .collect();
        self.meta.multi_save(entries).await?;

        let mut guard = self.inner.write();
        for info in infos {
            guard.insert((info.collection_id, info.partition_id), info);
        }
        Ok(())
    }

    pub async fn remove(&self, cid: CollectionId, pid: PartitionId) -> Result<(), CatalogError> {
        let key = self.keys.partition_loadinfo(cid, pid);
        self.meta.remove(&key).await?;
        self.inner.write().remove(&(cid, pid));
        Ok(())
    }

    pub async fn remove_collection(&self, cid: CollectionId) -> Result<(), CatalogError> {
        let prefix = self.keys.partition_loadinfo_prefix(cid);
        self.meta.remove_with_prefix(&prefix).await?;
        self.inner.write().retain(|(c, _), _| *c != cid);
        Ok(())
    }

    /// The set of partitions belonging to `cid` that are not present in
    /// `discovered` — used to detect partitions dropped upstream between
    /// loads (not currently acted on, but surfaced for callers that want
    /// to reconcile).
    pub fn missing_from(&self, cid: CollectionId, discovered: &HashSet<PartitionId>) -> Vec<PartitionId> {
        self.list_by_collection(cid)
            .into_iter()
            .map(|p| p.partition_id)
            .filter(|pid| !discovered.contains(pid))
            .collect()
    }
}
