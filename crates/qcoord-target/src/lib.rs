//! # qcoord-target: current/next target snapshots
//!
//! Each collection has up to two immutable [`TargetSnapshot`]s: *current*
//! (what reads should route against) and *next* (what the task scheduler
//! is reconciling toward). Promotion from next to current is atomic per
//! collection and only ever invoked by the target observer once it has
//! verified the distribution fully satisfies *next*.

mod manager;
mod snapshot;

pub use manager::TargetManager;
pub use snapshot::{DmChannelInfo, SegmentInfo, TargetSnapshot};
