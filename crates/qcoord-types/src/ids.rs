use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

/// Unique identifier for a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CollectionId(i64);

impl CollectionId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for CollectionId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<CollectionId> for i64 {
    fn from(id: CollectionId) -> Self {
        id.0
    }
}

/// Unique identifier for a partition, scoped within its owning collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PartitionId(i64);

impl PartitionId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for PartitionId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<PartitionId> for i64 {
    fn from(id: PartitionId) -> Self {
        id.0
    }
}

/// Unique identifier for a replica, scoped within its owning collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReplicaId(i64);

impl ReplicaId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for ReplicaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ReplicaId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<ReplicaId> for i64 {
    fn from(id: ReplicaId) -> Self {
        id.0
    }
}

/// Unique identifier for a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SegmentId(i64);

impl SegmentId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for SegmentId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<SegmentId> for i64 {
    fn from(id: SegmentId) -> Self {
        id.0
    }
}

/// Unique identifier for a query worker node, as assigned by session discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(i64);

impl NodeId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for NodeId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<NodeId> for i64 {
    fn from(id: NodeId) -> Self {
        id.0
    }
}

/// Logical append-only stream name bound to a collection shard.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChannelName(String);

impl ChannelName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ChannelName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl From<&str> for ChannelName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<ChannelName> for String {
    fn from(value: ChannelName) -> Self {
        value.0
    }
}

/// Name of a resource group (a named pool of worker nodes).
///
/// The group named `"__default_resource_group"` is special: it always
/// exists and cannot be dropped.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceGroupName(String);

impl ResourceGroupName {
    /// The name of the default resource group, always present.
    pub const DEFAULT: &'static str = "__default_resource_group";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn default_group() -> Self {
        Self(Self::DEFAULT.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_default(&self) -> bool {
        self.0 == Self::DEFAULT
    }
}

impl Display for ResourceGroupName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ResourceGroupName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl From<&str> for ResourceGroupName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl Default for ResourceGroupName {
    fn default() -> Self {
        Self::default_group()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_resource_group_name_is_recognized() {
        let g = ResourceGroupName::default_group();
        assert!(g.is_default());
        assert!(!ResourceGroupName::new("rg1").is_default());
    }

    #[test]
    fn ids_roundtrip_through_json() {
        let cid = CollectionId::new(1000);
        let json = serde_json::to_string(&cid).unwrap();
        let back: CollectionId = serde_json::from_str(&json).unwrap();
        assert_eq!(cid, back);
    }
}
