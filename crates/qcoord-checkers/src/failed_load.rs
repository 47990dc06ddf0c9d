//! The failed-load cache (§9): the one piece of shared mutable state
//! outside the managers. A worker's `InsufficientMemoryToLoad` RPC error
//! lands here so `GetPartitionStates`/load callers can report a clearer
//! reason than a bare retry-exhaustion, until the entry's TTL sweeps it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use qcoord_types::CollectionId;

const DEFAULT_TTL: Duration = Duration::from_secs(600);

#[derive(Debug, Clone)]
struct Entry {
    reason: String,
    inserted_at: Instant,
}

/// Process-scoped `collection-id -> reason` store with explicit
/// `Put`/`Get`/`Remove`/`TryExpire`, per the design notes' instruction to
/// treat it as initialized state rather than an incidental cache.
pub struct FailedLoadCache {
    ttl: Duration,
    entries: RwLock<HashMap<CollectionId, Entry>>,
}

impl FailedLoadCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn put(&self, collection_id: CollectionId, reason: impl Into<String>) {
        self.entries.write().insert(
            collection_id,
            Entry {
                reason: reason.into(),
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn get(&self, collection_id: CollectionId) -> Option<String> {
        self.entries.read().get(&collection_id).map(|e| e.reason.clone())
    }

    pub fn remove(&self, collection_id: CollectionId) {
        self.entries.write().remove(&collection_id);
    }

    /// Drops every entry whose TTL has elapsed, returning the collections
    /// that expired on this call.
    pub fn try_expire(&self) -> Vec<CollectionId> {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let expired: Vec<CollectionId> = entries
            .iter()
            .filter(|(_, e)| now.duration_since(e.inserted_at) >= self.ttl)
            .map(|(&cid, _)| cid)
            .collect();
        for cid in &expired {
            entries.remove(cid);
        }
        expired
    }
}

impl Default for FailedLoadCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

/// The fixed-interval tick that sweeps expired entries — the "who sweeps
/// expired entries" gap §9 leaves open, following the same
/// `tokio::time::interval`-driven tick shape as the other checkers.
pub struct FailedLoadSweeper {
    cache: Arc<FailedLoadCache>,
}

impl FailedLoadSweeper {
    pub fn new(cache: Arc<FailedLoadCache>) -> Self {
        Self { cache }
    }

    pub fn tick(&self) -> Vec<CollectionId> {
        let expired = self.cache.try_expire();
        for cid in &expired {
            tracing::info!(collection_id = %cid, "failed-load cache entry expired");
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_roundtrips_the_reason() {
        let cache = FailedLoadCache::new(Duration::from_secs(60));
        let cid = CollectionId::new(1);
        cache.put(cid, "node ran out of memory");
        assert_eq!(cache.get(cid).as_deref(), Some("node ran out of memory"));
    }

    #[test]
    fn remove_drops_the_entry() {
        let cache = FailedLoadCache::new(Duration::from_secs(60));
        let cid = CollectionId::new(1);
        cache.put(cid, "reason");
        cache.remove(cid);
        assert!(cache.get(cid).is_none());
    }

    #[test]
    fn try_expire_is_a_noop_before_ttl_elapses() {
        let cache = FailedLoadCache::new(Duration::from_secs(3600));
        cache.put(CollectionId::new(1), "reason");
        assert!(cache.try_expire().is_empty());
        assert!(cache.get(CollectionId::new(1)).is_some());
    }

    #[test]
    fn sweeper_expires_entries_past_ttl() {
        let cache = Arc::new(FailedLoadCache::new(Duration::from_millis(1)));
        cache.put(CollectionId::new(7), "out of memory");
        std::thread::sleep(Duration::from_millis(5));

        let sweeper = FailedLoadSweeper::new(cache.clone());
        let expired = sweeper.tick();
        assert_eq!(expired, vec![CollectionId::new(7)]);
        assert!(cache.get(CollectionId::new(7)).is_none());
    }
}
