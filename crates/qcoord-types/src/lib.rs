//! # qcoord-types: Shared types for the query coordinator
//!
//! This crate contains types shared across every coordinator subsystem:
//! - Entity identifiers ([`CollectionId`], [`PartitionId`], [`ReplicaId`],
//!   [`SegmentId`], [`NodeId`])
//! - Naming types ([`ChannelName`], [`ResourceGroupName`])
//! - Load/replica/task enums ([`LoadStatus`], [`LoadType`], [`SegmentLevel`],
//!   [`DataScope`], [`Priority`], [`ActionKind`])
//! - Timestamps ([`Timestamp`])
//! - The cross-cutting error taxonomy ([`ErrorCode`])

mod enums;
mod error;
mod ids;
mod position;

pub use enums::{ActionKind, DataScope, LoadStatus, LoadType, Priority, SegmentLevel};
pub use error::ErrorCode;
pub use ids::{ChannelName, CollectionId, NodeId, PartitionId, ReplicaId, ResourceGroupName, SegmentId};
pub use position::{MsgPosition, Timestamp};
