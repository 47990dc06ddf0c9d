use async_trait::async_trait;

use crate::error::MetaError;

/// Kind of change a prefix watch reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOp {
    Put,
    Delete,
}

/// A single change observed on a watched key prefix.
#[derive(Debug, Clone)]
pub struct WatchEvent {
    pub op: WatchOp,
    pub key: String,
    pub value: Vec<u8>,
}

/// Key-prefixed persistence contract for durable load intent.
///
/// Implementations must provide linearizable writes per key and atomic
/// multi-key writes within a single [`multi_save`](MetaStore::multi_save)
/// batch. Reads may be served from a local cache but must observe the
/// effect of prior writes issued by the same process.
#[async_trait]
pub trait MetaStore: Send + Sync {
    async fn save(&self, key: &str, value: Vec<u8>) -> Result<(), MetaError>;

    /// Atomically writes every key in `entries`, or none of them.
    async fn multi_save(&self, entries: Vec<(String, Vec<u8>)>) -> Result<(), MetaError>;

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, MetaError>;

    /// Returns every `(key, value)` pair whose key starts with `prefix`.
    ///
    /// Callers that invoke this at startup must treat failure as fatal:
    /// the coordinator must not serve a partial view of its own intent.
    async fn load_with_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, MetaError>;

    async fn remove(&self, key: &str) -> Result<(), MetaError>;

    async fn multi_remove(&self, keys: Vec<String>) -> Result<(), MetaError>;

    async fn remove_with_prefix(&self, prefix: &str) -> Result<(), MetaError>;

    /// Subscribes to create/update/delete events under `prefix`.
    ///
    /// The returned receiver observes events for the lifetime of the
    /// store; callers that only care about one collection's subtree
    /// should filter client-side, mirroring how the original watch
    /// primitive has no server-side filtering beyond the prefix itself.
    fn watch_prefix(&self, prefix: &str) -> tokio::sync::broadcast::Receiver<WatchEvent>;
}
