//! # qcoord-distribution: transient per-node cluster state
//!
//! Holds what the cluster currently reports, as opposed to what the
//! coordinator intends (that is `qcoord-catalog`'s durable load intent and
//! `qcoord-target`'s target snapshots). Every entry here lives only as
//! long as the originating node's session: on node removal, all three
//! views drop that node's entries, and every update is an unconditional
//! replacement of the node's list, since heartbeats carry full state
//! rather than deltas.

mod manager;
mod views;

pub use manager::DistributionManager;
pub use views::{ChannelView, SegmentFilter, SegmentView, ShardLeadership};
