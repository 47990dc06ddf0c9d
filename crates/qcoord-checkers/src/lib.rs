//! # qcoord-checkers: fixed-interval diff loops
//!
//! Each checker wakes on a fixed interval, diffs the distribution against
//! a collection's current target (or, for the balance checker, against
//! its own siblings), and submits advisory Grow/Reduce tasks to close the
//! gap. `AlreadyDone`/`ConflictTaskExisted` rejections from the task
//! scheduler are the expected steady state, not errors — a checker simply
//! counts them and moves on.
//!
//! The target observer and handoff observer are not diff loops in the
//! same sense: the former promotes a saturated *next* target to
//! *current*, and the latter drains the handoff inbox into jobs. Both
//! still run on the same fixed-interval/watch-driven cadence as the
//! others and live in this crate for the same reason.

mod balance;
mod balancer;
mod channel;
mod error;
mod failed_load;
mod handoff;
mod leader;
mod segment;
mod target_observer;

pub use balance::{BalanceCheckReport, BalanceChecker};
pub use channel::{ChannelCheckReport, ChannelChecker};
pub use error::CheckerError;
pub use failed_load::{FailedLoadCache, FailedLoadSweeper};
pub use handoff::{HandoffObserver, HandoffObserverReport, HandoffRecord};
pub use leader::{LeaderCheckReport, LeaderChecker};
pub use segment::{SegmentCheckReport, SegmentChecker};
pub use target_observer::{TargetObserver, TargetObserverReport};
