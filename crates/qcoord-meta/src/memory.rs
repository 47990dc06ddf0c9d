use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::broadcast;

use crate::error::MetaError;
use crate::store::{MetaStore, WatchEvent, WatchOp};

const WATCH_CHANNEL_CAPACITY: usize = 1024;

/// An in-memory, non-durable [`MetaStore`] for tests and local development.
///
/// Keys are ordered so that prefix scans (`load_with_prefix`,
/// `remove_with_prefix`) are a contiguous `BTreeMap` range rather than a
/// full-table filter.
pub struct MemoryMetaStore {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
    watch_tx: broadcast::Sender<WatchEvent>,
}

impl MemoryMetaStore {
    pub fn new() -> Self {
        let (watch_tx, _rx) = broadcast::channel(WATCH_CHANNEL_CAPACITY);
        Self {
            entries: RwLock::new(BTreeMap::new()),
            watch_tx,
        }
    }

    fn publish(&self, op: WatchOp, key: &str, value: &[u8]) {
        // No subscribers is a routine case (most writes happen before any
        // checker has started watching); a send error here is silently
        // ignored by design.
        let _ = self.watch_tx.send(WatchEvent {
            op,
            key: key.to_string(),
            value: value.to_vec(),
        });
    }
}

impl Default for MemoryMetaStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetaStore for MemoryMetaStore {
    async fn save(&self, key: &str, value: Vec<u8>) -> Result<(), MetaError> {
        self.entries.write().insert(key.to_string(), value.clone());
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
    async fn save_then_get_roundtrips() {
        let store = MemoryMetaStore::new();
        store.save("root/collection-loadinfo/1", b"hello".to_vec()).await.unwrap();
        let got = store.get("root/collection-loadinfo/1").await.unwrap();
        assert_eq!(got, Some(b"hello".to_vec()));
    }

    #[tokio::test]
    async fn load_with_prefix_only_returns_matching_keys() {
        let store = MemoryMetaStore::new();
        store.save("root/replica/1/1", b"a".to_vec()).await.unwrap();
        store.save("root/replica/1/2", b"b".to_vec()).await.unwrap();
        store.save("root/replica/2/1", b"c".to_vec()).await.unwrap();

        let got = store.load_with_prefix("root/replica/1/").await.unwrap();
        assert_eq!(got.len(), 2);
    }

    #[tokio::test]
    async fn remove_with_prefix_deletes_only_matching_keys() {
        let store = MemoryMetaStore::new();
        store.save("root/handoff/1/1/1", b"x".to_vec()).await.unwrap();
        store.save("root/handoff/1/1/2", b"y".to_vec()).await.unwrap();
        store.save("root/collection-loadinfo/1", b"z".to_vec()).await.unwrap();

        store.remove_with_prefix("root/handoff/").await.unwrap();

        assert!(store.get("root/handoff/1/1/1").await.unwrap().is_none());
        assert!(store.get("root/collection-loadinfo/1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn multi_save_is_visible_to_a_read_issued_right_after() {
        let store = MemoryMetaStore::new();
        store
            .multi_save(vec![
                ("root/collection-loadinfo/1".to_string(), b"a".to_vec()),
                ("root/replica/1/1".to_string(), b"b".to_vec()),
            ])
            .await
            .unwrap();

        assert!(store.get("root/collection-loadinfo/1").await.unwrap().is_some());
        assert!(store.get("root/replica/1/1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn watch_prefix_observes_put_and_delete() {
        let store = MemoryMetaStore::new();
        let mut rx = store.watch_prefix("root/replica/");

        store.save("root/replica/1/1", b"a".to_vec()).await.unwrap();
        let event = rx.recv().await.unwrap();
        assert_eq!(event.op, WatchOp::Put);
        assert_eq!(event.key, "root/replica/1/1");

        store.remove("root/replica/1/1").await.unwrap();
        let event = rx.recv().await.unwrap();
        assert_eq!(event.op, WatchOp::Delete);
    }
}
