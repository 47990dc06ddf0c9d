use std::collections::HashMap;

use parking_lot::RwLock;
use qcoord_types::{NodeId, ResourceGroupName};

use crate::error::ResourceError;
use crate::group::ResourceGroup;

struct Index {
    groups: HashMap<ResourceGroupName, ResourceGroup>,
    /// Every live node belongs to exactly one group; this is the reverse
    /// index used to validate that invariant on `add_node`.
    node_group: HashMap<NodeId, ResourceGroupName>,
    /// Nodes that were moved out of the group a replica still labels
    /// itself with. Cleared once the caller confirms the replica's shards
    /// have been reconciled onto a currently-resident node.
    outgoing: HashMap<NodeId, ResourceGroupName>,
}

impl Index {
    fn new() -> Self {
        let mut groups = HashMap::new();
        groups.insert(
            ResourceGroupName::default_group(),
            ResourceGroup::new(ResourceGroupName::default_group(), u32::MAX),
        );
        Self {
            groups,
            node_group: HashMap::new(),
            outgoing: HashMap::new(),
        }
    }
}

/// Node partitioning across named resource groups.
///
/// The default group (see [`ResourceGroupName::default_group`]) always
/// exists, has unbounded capacity, and cannot be dropped.
pub struct ResourceManager {
    inner: RwLock<Index>,
}

impl ResourceManager {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Index::new()),
        }
    }

    pub fn create(&self, name: ResourceGroupName, capacity: u32) -> Result<(), ResourceError> {
        let mut guard = self.inner.write();
        if guard.groups.contains_key(&name) {
            return Err(ResourceError::AlreadyExists(name));
        }
        guard.groups.insert(name.clone(), ResourceGroup::new(name, capacity));
        Ok(())
    }

    /// Drops `name`. Fails for the default group, or when `still_referenced`
    /// reports that some replica still labels itself with this group — the
    /// caller (which owns the replica index) makes that determination.
    pub fn drop_group(&self, name: &ResourceGroupName, still_referenced: bool) -> Result<(), ResourceError> {
        if name.is_default() {
            return Err(ResourceError::CannotDropDefault);
        }
        if still_referenced {
            return Err(ResourceError::StillReferenced(name.clone()));
        }

        let mut guard = self.inner.write();
        let group = guard.groups.remove(name).ok_or_else(|| ResourceError::NotFound(name.clone()))?;
        for node in group.nodes {
            guard.node_group.remove(&node);
        }
        Ok(())
    }

    /// Adds `node` to `group`, moving it out of whatever group it
    /// previously belonged to so the one-group-per-node invariant holds.
    pub fn add_node(&self, group: &ResourceGroupName, node: NodeId) -> Result<(), ResourceError> {
        let mut guard = self.inner.write();
        if !guard.groups.contains_key(group) {
            return Err(ResourceError::NotFound(group.clone()));
        }

        if let Some(prev) = guard.node_group.get(&node).cloned() {
            if let Some(prev_group) = guard.groups.get_mut(&prev) {
                prev_group.nodes.remove(&node);
            }
        }

        guard.groups.get_mut(group).expect("checked above").nodes.insert(node);
        guard.node_group.insert(node, group.clone());
        Ok(())
    }

    pub fn remove_node(&self, node: NodeId) {
        let mut guard = self.inner.write();
        if let Some(group) = guard.node_group.remove(&node) {
            if let Some(g) = guard.groups.get_mut(&group) {
                g.nodes.remove(&node);
            }
        }
        guard.outgoing.remove(&node);
    }

    pub fn group(&self, name: &ResourceGroupName) -> Option<ResourceGroup> {
        self.inner.read().groups.get(name).cloned()
    }

    pub fn list_groups(&self) -> Vec<ResourceGroup> {
        self.inner.read().groups.values().cloned().collect()
    }

    pub fn group_of(&self, node: NodeId) -> Option<ResourceGroupName> {
        self.inner.read().node_group.get(&node).cloned()
    }

    /// Atomically moves `n` nodes from `src` to `dst`, preferring the
    /// nodes `replica_count` reports as holding the fewest replicas.
    /// Moved nodes that `replica_count` implies are still referenced by a
    /// replica labeled `src` are tagged *outgoing* against `src` so the
    /// caller's next reconcile can move their shards off.
    pub fn transfer(
        &self,
        src: &ResourceGroupName,
        dst: &ResourceGroupName,
        n: usize,
        replica_count: impl Fn(NodeId) -> usize,
    ) -> Result<Vec<NodeId>, ResourceError> {
        if src == dst {
            return Err(ResourceError::SameGroup(src.clone()));
        }

        let mut guard = self.inner.write();
        if !guard.groups.contains_key(dst) {
            return Err(ResourceError::NotFound(dst.clone()));
        }
        let src_group = guard.groups.get(src).ok_or_else(|| ResourceError::NotFound(src.clone()))?;

        if src_group.nodes.len() < n {
            return Err(ResourceError::InsufficientNodes {
                group: src.clone(),
                available: src_group.nodes.len(),
                requested: n,
            });
        }

        let mut candidates: Vec<NodeId> = src_group.nodes.iter().copied().collect();
        candidates.sort_by_key(|&node| replica_count(node));
        let moving: Vec<NodeId> = candidates.into_iter().take(n).collect();

        for &node in &moving {
            guard.groups.get_mut(src).expect("checked above").nodes.remove(&node);
            guard.groups.get_mut(dst).expect("checked above").nodes.insert(node);
            guard.node_group.insert(node, dst.clone());
            if replica_count(node) > 0 {
                guard.outgoing.insert(node, src.clone());
            }
        }

        tracing::info!(src = %src, dst = %dst, moved = moving.len(), "transferred nodes between resource groups");
        Ok(moving)
    }

    /// Nodes currently tagged outgoing against `group` — still referenced
    /// by a replica labeled `group` despite having moved elsewhere.
    pub fn outgoing_from(&self, group: &ResourceGroupName) -> Vec<NodeId> {
        self.inner
            .read()
            .outgoing
            .iter()
            .filter(|(_, g)| *g == group)
            .map(|(&node, _)| node)
            .collect()
    }

    /// Clears the outgoing tag once the caller has confirmed the node's
    /// shards were reconciled onto a currently-resident node.
    pub fn clear_outgoing(&self, node: NodeId) {
        self.inner.write().outgoing.remove(&node);
    }
}

impl Default for ResourceManager {
    fn default() -> Self {
        Self::new()
    }
}
