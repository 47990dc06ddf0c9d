//! # qcoord-job: per-collection job scheduler
//!
//! Jobs serialize long-lived load/release operations against one
//! collection at a time. Per collection, jobs run in FIFO order behind an
//! async mutex held for the job's entire duration; different collections'
//! queues run fully in parallel.
//!
//! A job does not drive reconciliation itself — it only persists catalog
//! intent, then posts a [`JobOutcome`] describing the follow-up work (a
//! target rebuild, or a handoff's load-then-release pair) onto an
//! unbounded channel. The task-scheduling layer drains that channel; this
//! crate has no dependency on it, matching the cyclic-graph-avoidance
//! design shared with `qcoord-resource`.

mod error;
mod kind;
mod scheduler;

pub use error::JobError;
pub use kind::{
    HandoffSegmentsRequest, JobKind, LoadCollectionRequest, LoadPartitionRequest, ReleaseCollectionRequest,
    ReleasePartitionRequest,
};
pub use scheduler::{JobOutcome, JobScheduler};
