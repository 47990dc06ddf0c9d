use std::collections::BTreeSet;

use qcoord_types::{NodeId, ResourceGroupName};

/// A named pool of worker nodes with a declared capacity.
#[derive(Debug, Clone)]
pub struct ResourceGroup {
    pub name: ResourceGroupName,
    pub capacity: u32,
    pub nodes: BTreeSet<NodeId>,
}

impl ResourceGroup {
    pub fn new(name: ResourceGroupName, capacity: u32) -> Self {
        Self {
            name,
            capacity,
            nodes: BTreeSet::new(),
        }
    }

    /// Whether this group currently has enough live nodes *and* capacity
    /// headroom to satisfy a request for `n` more nodes. A group that is
    /// momentarily short on live nodes but still under its declared
    /// capacity reports a different reason than one that is simply full.
    pub fn can_satisfy(&self, n: usize) -> bool {
        self.nodes.len() >= n && (self.nodes.len() as u32) <= self.capacity
    }
}
