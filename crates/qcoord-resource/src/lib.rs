//! # qcoord-resource: resource-group node partitioning
//!
//! A resource group is a named pool of worker nodes with a declared
//! capacity; every live node belongs to exactly one group. The default
//! group always exists and cannot be dropped — it is the overflow/source
//! pool new nodes land in before an operator moves them.
//!
//! Node movement (`transfer`) is deliberately decoupled from replica
//! bookkeeping: this crate has no dependency on `qcoord-catalog` and
//! therefore no back-pointer to replicas. Per the cyclic-graph-avoidance
//! design, the caller (the job scheduler) supplies a node-affinity
//! closure — "how many replicas currently hold this node" — so that
//! `Transfer` can prefer moving lightly-loaded nodes first without this
//! crate reaching into the catalog's indices directly. `TransferReplica`,
//! which additionally rewrites replica resource-group labels, is
//! orchestrated one layer up for the same reason.

mod error;
mod group;
mod manager;

pub use error::ResourceError;
pub use group::ResourceGroup;
pub use manager::ResourceManager;
