//! Reconciliation engine: turns Grow/Reduce instructions submitted by the
//! job scheduler and checkers into dispatched worker RPCs, tracking each
//! instruction as a [`Task`] until the distribution confirms its effect.
//!
//! The scheduler never calls back into `qcoord-job` or `qcoord-checkers` —
//! it only exposes `submit`/`cancel`/`dispatch_tick` and the per-node delta
//! accessors those layers poll.

mod action;
mod delta;
mod error;
mod scheduler;
mod target;
mod task;
mod worker_client;

pub use action::{Action, ActionState};
pub use error::TaskError;
pub use scheduler::{DispatchReport, TaskScheduler};
pub use target::{ConflictKey, TaskTarget};
pub use task::{Task, TaskId, TaskStatus};
pub use worker_client::{WorkerClient, WorkerRpcError};

#[cfg(any(test, feature = "test-fakes"))]
pub use worker_client::fakes::FakeWorkerClient;
