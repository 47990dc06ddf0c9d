use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use qcoord_types::CollectionId;
use tokio::sync::Notify;

use crate::snapshot::TargetSnapshot;

struct CollectionTargets {
    current: Option<TargetSnapshot>,
    next: Option<TargetSnapshot>,
    /// Notified every time `promote` runs for this collection, so a
    /// refresh caller's wait resolves as soon as saturation is observed
    /// rather than polling.
    promoted: Arc<Notify>,
}

impl CollectionTargets {
    fn empty() -> Self {
        Self {
            current: None,
            next: None,
            promoted: Arc::new(Notify::new()),
        }
    }
}

/// Owns the current/next target snapshot pair for every collection.
///
/// `set_next` is how the job scheduler and checkers publish a freshly
/// rebuilt *next* target; `promote` is invoked only by the target
/// observer, after it has independently verified the distribution
/// saturates *next*.
pub struct TargetManager {
    inner: RwLock<HashMap<CollectionId, CollectionTargets>>,
}

impl TargetManager {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    pub fn current(&self, cid: CollectionId) -> Option<TargetSnapshot> {
        self.inner.read().get(&cid).and_then(|t| t.current.clone())
    }

    pub fn next(&self, cid: CollectionId) -> Option<TargetSnapshot> {
        self.inner.read().get(&cid).and_then(|t| t.next.clone())
    }

    /// Replaces *next* wholesale. Does not touch *current*.
    pub fn set_next(&self, cid: CollectionId, snapshot: TargetSnapshot) {
        let mut guard = self.inner.write();
        let entry = guard.entry(cid).or_insert_with(CollectionTargets::empty);
        entry.next = Some(snapshot);
    }

    /// Atomically swaps *next* into *current* and wakes every task
    /// currently awaiting this collection's saturation via
    /// [`TargetManager::wait_for_promotion`].
    ///
    /// Invoked by the observer only after it has verified the
    /// distribution fully matches *next*; this method itself performs no
    /// saturation check.
    pub fn promote(&self, cid: CollectionId) {
        let mut guard = self.inner.write();
        if let Some(entry) = guard.get_mut(&cid) {
            entry.current = entry.next.clone();
            entry.promoted.notify_waiters();
            tracing::info!(collection_id = %cid, "promoted next target to current");
        }
    }

    /// Resolves the next time [`TargetManager::promote`] runs for `cid`.
    /// Callers of `LoadPartitions(..., refresh=true)` poll this instead of
    /// spin-waiting on the distribution themselves.
    pub async fn wait_for_promotion(&self, cid: CollectionId) {
        let notify = {
            let mut guard = self.inner.write();
            let entry = guard.entry(cid).or_insert_with(CollectionTargets::empty);
            entry.promoted.clone()
        };
        notify.notified().await;
    }

    /// Clears both snapshots for `cid`, e.g. on `ReleaseCollection`.
    pub fn clear(&self, cid: CollectionId) {
        self.inner.write().remove(&cid);
    }
}

impl Default for TargetManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_next_does_not_affect_current() {
        let mgr = TargetManager::new();
        let cid = CollectionId::new(1);
        mgr.set_next(cid, TargetSnapshot::default());
        assert!(mgr.current(cid).is_none());
        assert!(mgr.next(cid).is_some());
    }

    #[test]
    fn promote_copies_next_into_current() {
        let mgr = TargetManager::new();
        let cid = CollectionId::new(1);
        let mut snapshot = TargetSnapshot::default();
        snapshot.growing_segments.insert(qcoord_types::SegmentId::new(1));
        mgr.set_next(cid, snapshot.clone());

        mgr.promote(cid);

        assert_eq!(mgr.current(cid), Some(snapshot));
    }

    #[tokio::test]
    async fn wait_for_promotion_resolves_once_promoted() {
        let mgr = Arc::new(TargetManager::new());
        let cid = CollectionId::new(1);
        mgr.set_next(cid, TargetSnapshot::default());

        let waiter = {
            let mgr = mgr.clone();
            tokio::spawn(async move {
                mgr.wait_for_promotion(cid).await;
            })
        };

        // Give the waiter a chance to register before promoting.
        tokio::task::yield_now().await;
        mgr.promote(cid);

        tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .expect("wait_for_promotion should resolve promptly")
            .unwrap();
    }

    #[test]
    fn clear_removes_both_snapshots() {
        let mgr = TargetManager::new();
        let cid = CollectionId::new(1);
        mgr.set_next(cid, TargetSnapshot::default());
        mgr.promote(cid);
        mgr.clear(cid);

        assert!(mgr.current(cid).is_none());
        assert!(mgr.next(cid).is_none());
    }
}
