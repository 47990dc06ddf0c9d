use std::time::Instant;

use qcoord_types::{ActionKind, NodeId};

/// Dispatch state of one [`crate::task::Task`]'s current action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionState {
    /// Not yet sent to the worker.
    Pending,
    /// RPC accepted; waiting for the next distribution heartbeat to
    /// confirm the effect.
    Dispatched,
}

/// A single Grow/Reduce instruction against one node.
#[derive(Debug, Clone)]
pub struct Action {
    pub kind: ActionKind,
    pub node: NodeId,
    pub state: ActionState,
    pub attempts: u32,
    /// Set the first time this action is dispatched; used for the
    /// action-scoped timeout. `None` while `Pending`.
    pub dispatched_at: Option<Instant>,
}

impl Action {
    pub fn new(kind: ActionKind, node: NodeId) -> Self {
        Self {
            kind,
            node,
            state: ActionState::Pending,
            attempts: 0,
            dispatched_at: None,
        }
    }

    pub fn mark_dispatched(&mut self, now: Instant) {
        self.state = ActionState::Dispatched;
        self.attempts += 1;
        self.dispatched_at = Some(now);
    }

    /// Clears dispatch state so the next tick retries from scratch — used
    /// both for transient-RPC-error retries and for abandoning a
    /// timed-out action without a forced rollback.
    pub fn reset_for_retry(&mut self) {
        self.state = ActionState::Pending;
        self.dispatched_at = None;
    }

    pub fn timed_out(&self, now: Instant, timeout: std::time::Duration) -> bool {
        self.dispatched_at.is_some_and(|at| now.duration_since(at) > timeout)
    }
}
