use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use qcoord_meta::{KeyLayout, MetaStore};
use qcoord_types::{CollectionId, LoadType, ResourceGroupName};

use crate::error::CatalogError;
use crate::records::CollectionLoadInfo;

/// In-memory index over persisted [`CollectionLoadInfo`] records.
///
/// Each mutation persists through the meta store first, then updates the
/// index; reads acquire only a read lock and never touch the store.
pub struct CollectionManager {
    meta: Arc<dyn MetaStore>,
    keys: KeyLayout,
    inner: RwLock<HashMap<CollectionId, CollectionLoadInfo>>,
}

impl CollectionManager {
    pub fn new(meta: Arc<dyn MetaStore>, keys: KeyLayout) -> Self {
        Self {
            meta,
            keys,
            inner: RwLock::new(HashMap::new()),
        }
    }

    pub async fn load_all(&self) -> Result<(), CatalogError> {
        let prefix = self.keys.collection_loadinfo_prefix();
        let entries = self.meta.load_with_prefix(&prefix).await?;
        let mut index = HashMap::new();
        for (_, value) in entries {
            let info: CollectionLoadInfo = serde_json::from_slice(&value)
                .map_err(|e| CatalogError::IllegalArgument(format!("corrupt collection record: {e}")))?;
            index.insert(info.collection_id, info);
        }
        *self.inner.write() = index;
        Ok(())
    }

    pub fn get(&self, cid: CollectionId) -> Option<CollectionLoadInfo> {
        self.inner.read().get(&cid).cloned()
    }

    pub fn contains(&self, cid: CollectionId) -> bool {
        self.inner.read().contains_key(&cid)
    }

    pub fn list(&self) -> Vec<CollectionLoadInfo> {
        self.inner.read().values().cloned().collect()
    }

    /// Validates a `LoadCollection(cid, replica_number, load_type, resource_groups)`
    /// request against any persisted record for `cid`.
    ///
    /// Returns `Ok(true)` when the collection is already loaded with
    /// identical parameters (the idempotent no-op case), `Ok(false)` when
    /// there is no existing record (a fresh load should proceed), and
    /// `Err(ParameterMismatched)` when a record exists with different
    /// parameters.
    pub fn check_load_idempotence(
        &self,
        cid: CollectionId,
        replica_number: u32,
        load_type: LoadType,
        resource_groups: &[ResourceGroupName],
    ) -> Result<bool, CatalogError> {
        match self.get(cid) {
            None => Ok(false),
            Some(existing) if existing.matches_request(replica_number, load_type, resource_groups) => Ok(true),
            Some(_) => Err(CatalogError::ParameterMismatched(cid)),
        }
    }

    pub async fn persist(&self, info: CollectionLoadInfo) -> Result<(), CatalogError> {
        let key = self.keys.collection_loadinfo(info.collection_id);
        let value = serde_json::to_vec(&info).expect("CollectionLoadInfo serializes");
        self.meta.save(&key, value).await?;
        self.inner.write().insert(info.collection_id, info);
        Ok(())
    }

    pub async fn remove(&self, cid: CollectionId) -> Result<(), CatalogError> {
        let key = self.keys.collection_loadinfo(cid);
        self.meta.remove(&key).await?;
        self.inner.write().remove(&cid);
        Ok(())
    }

    /// Recomputes `load_percentage` as the floor of the arithmetic mean of
    /// `partition_percentages`, and flips `status` to `Loaded` the first
    /// time it reaches 100. Once `Loaded`, status stays `Loaded` until the
    /// collection is released (this method never downgrades status).
    pub async fn recompute_percentage(
        &self,
        cid: CollectionId,
        partition_percentages: &[u8],
    ) -> Result<(), CatalogError> {
        let mut info = self.get(cid).ok_or(CatalogError::CollectionNotFound(cid))?;

        let percentage = if partition_percentages.is_empty() {
            0
        } else {
            let sum: u32 = partition_percentages.iter().map(|&p| u32::from(p)).sum();
            (sum / partition_percentages.len() as u32) as u8
        };

        info.load_percentage = percentage;
        if percentage >= 100 {
            info.status = qcoord_types::LoadStatus::Loaded;
        }

        self.persist(info).await
    }
}
