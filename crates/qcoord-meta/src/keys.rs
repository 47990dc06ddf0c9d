use qcoord_types::{CollectionId, PartitionId, ReplicaId, SegmentId};

/// Builds the fixed key layout described for the meta store:
///
/// ```text
/// <root>/collection-loadinfo/<cid>
/// <root>/partition-loadinfo/<cid>/<pid>
/// <root>/replica/<cid>/<rid>
/// <root>/handoff/<cid>/<pid>/<sid>
/// ```
#[derive(Debug, Clone)]
pub struct KeyLayout {
    root: String,
}

impl KeyLayout {
    pub fn new(root: impl Into<String>) -> Self {
        let mut root = root.into();
        while root.ends_with('/') {
            root.pop();
        }
        Self { root }
    }

    pub fn collection_loadinfo_prefix(&self) -> String {
        format!("{}/collection-loadinfo/", self.root)
    }

    pub fn collection_loadinfo(&self, cid: CollectionId) -> String {
        format!("{}/collection-loadinfo/{cid}", self.root)
    }

    pub fn partition_loadinfo_prefix(&self, cid: CollectionId) -> String {
        format!("{}/partition-loadinfo/{cid}/", self.root)
    }

    pub fn partition_loadinfo_prefix_all(&self) -> String {
        format!("{}/partition-loadinfo/", self.root)
    }

    pub fn partition_loadinfo(&self, cid: CollectionId, pid: PartitionId) -> String {
        format!("{}/partition-loadinfo/{cid}/{pid}", self.root)
    }

    pub fn replica_prefix(&self, cid: CollectionId) -> String {
        format!("{}/replica/{cid}/", self.root)
    }

    pub fn replica_prefix_all(&self) -> String {
        format!("{}/replica/", self.root)
    }

    pub fn replica(&self, cid: CollectionId, rid: ReplicaId) -> String {
        format!("{}/replica/{cid}/{rid}", self.root)
    }

    pub fn handoff_prefix(&self) -> String {
        format!("{}/handoff/", self.root)
    }

    pub fn handoff(&self, cid: CollectionId, pid: PartitionId, sid: SegmentId) -> String {
        format!("{}/handoff/{cid}/{pid}/{sid}", self.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_trailing_slash_from_root() {
        let layout = KeyLayout::new("/var/lib/qcoord/");
        assert_eq!(
            layout.collection_loadinfo(CollectionId::new(7)),
            "/var/lib/qcoord/collection-loadinfo/7"
        );
    }

    #[test]
    fn handoff_key_orders_collection_partition_segment() {
        let layout = KeyLayout::new("root");
        let key = layout.handoff(CollectionId::new(1), PartitionId::new(2), SegmentId::new(3));
        assert_eq!(key, "root/handoff/1/2/3");
    }
}
