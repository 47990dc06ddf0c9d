use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use parking_lot::RwLock;
use tokio::sync::broadcast;

use crate::error::MetaError;
use crate::store::{MetaStore, WatchEvent, WatchOp};

const SNAPSHOT_FILENAME: &str = "qcoord-meta.json";
const WATCH_CHANNEL_CAPACITY: usize = 1024;

/// Embedded file-backed [`MetaStore`] for single-node deployment.
///
/// Keeps the full key space in memory, mirrored to a single JSON snapshot
/// on disk. Every mutation writes the snapshot to a temp file in the same
/// directory and renames it into place, so a crash mid-write never leaves
/// a torn snapshot behind. This trades per-write fsync cost for simplicity;
/// a multi-node deployment is expected to swap in a real consensus-backed
/// store behind the same [`MetaStore`] trait.
pub struct FileMetaStore {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
    watch_tx: broadcast::Sender<WatchEvent>,
}

impl FileMetaStore {
    /// Opens (or initializes) a store rooted at `dir`.
    ///
    /// Per the fatal-on-partial-view policy, a corrupt or unreadable
    /// existing snapshot is returned as an error rather than silently
    /// starting from an empty store.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, MetaError> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let path = dir.join(SNAPSHOT_FILENAME);

        let entries = if path.exists() {
            let raw = std::fs::read(&path)?;
            let snapshot: BTreeMap<String, String> = serde_json::from_slice(&raw)?;
            let mut decoded = BTreeMap::new();
            for (key, value) in snapshot {
                let bytes = BASE64
                    .decode(value.as_bytes())
                    .map_err(|e| MetaError::StartupLoadFailed(key.clone(), e.to_string()))?;
                decoded.insert(key, bytes);
            }
            decoded
        } else {
            BTreeMap::new()
        };

        let (watch_tx, _rx) = broadcast::channel(WATCH_CHANNEL_CAPACITY);
        Ok(Self {
            path,
            entries: RwLock::new(entries),
            watch_tx,
        })
    }

    fn publish(&self, op: WatchOp, key: &str, value: &[u8]) {
        let _ = self.watch_tx.send(WatchEvent {
            op,
            key: key.to_string(),
            value: value.to_vec(),
        });
    }

    /// Persists the full snapshot, writing to a sibling temp file first.
    fn persist(&self) -> Result<(), MetaError> {
        let guard = self.entries.read();
        let snapshot: BTreeMap<&str, String> = guard
            .iter()
            .map(|(k, v)| (k.as_str(), BASE64.encode(v)))
            .collect();
        let json = serde_json::to_vec_pretty(&snapshot)?;
        drop(guard);

        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

impl Drop for FileMetaStore {
    fn drop(&mut self) {
        if let Err(e) = self.persist() {
            tracing::error!(error = %e, "failed to flush meta store snapshot on drop");
        }
    }
}

#[async_trait]
impl MetaStore for FileMetaStore {
    async fn save(&self, key: &str, value: Vec<u8>) -> Result<(), MetaError> {
        self.entries.write().insert(key.to_string(), value.clone());
        self.persist()?;
        self.publish(WatchOp::Put, key, &value);
        Ok(())
    }

    async fn multi_save(&self, entries: Vec<(String, Vec<u8>)>) -> Result<(), MetaError> {
        {
            let mut guard = self.entries.write();
            for (key, value) in &entries {
                guard.insert(key.clone(), value.clone());
            }
        }
        self.persist()?;
        for (key, value) in &entries {
            self.publish(WatchOp::Put, key, value);
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, MetaError> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn load_with_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, MetaError> {
        let guard = self.entries.read();
        Ok(guard
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    async fn remove(&self, key: &str) -> Result<(), MetaError> {
        self.entries.write().remove(key);
        self.persist()?;
        self.publish(WatchOp::Delete, key, &[]);
        Ok(())
    }

    async fn multi_remove(&self, keys: Vec<String>) -> Result<(), MetaError> {
        {
            let mut guard = self.entries.write();
            for key in &keys {
                guard.remove(key);
            }
        }
        self.persist()?;
        for key in &keys {
            self.publish(WatchOp::Delete, key, &[]);
        }
        Ok(())
    }

    async fn remove_with_prefix(&self, prefix: &str) -> Result<(), MetaError> {
        let removed: Vec<String> = {
            let mut guard = self.entries.write();
            let keys: Vec<String> = guard
                .range(prefix.to_string()..)
                .take_while(|(k, _)| k.starts_with(prefix))
                .map(|(k, _)| k.clone())
                .collect();
            for key in &keys {
                guard.remove(key);
            }
            keys
        };
        self.persist()?;
        for key in &removed {
            self.publish(WatchOp::Delete, key, &[]);
        }
        Ok(())
    }

    fn watch_prefix(&self, _prefix: &str) -> broadcast::Receiver<WatchEvent> {
        self.watch_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileMetaStore::open(dir.path()).unwrap();
            store
                .save("root/collection-loadinfo/1", b"payload".to_vec())
                .await
                .unwrap();
        }

        let reopened = FileMetaStore::open(dir.path()).unwrap();
        let got = reopened.get("root/collection-loadinfo/1").await.unwrap();
        assert_eq!(got, Some(b"payload".to_vec()));
    }

    #[tokio::test]
    async fn remove_with_prefix_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileMetaStore::open(dir.path()).unwrap();
        store.save("root/handoff/1/1/1", b"x".to_vec()).await.unwrap();
        store.remove_with_prefix("root/handoff/").await.unwrap();
        drop(store);

        let reopened = FileMetaStore::open(dir.path()).unwrap();
        assert!(reopened.get("root/handoff/1/1/1").await.unwrap().is_none());
    }
}
