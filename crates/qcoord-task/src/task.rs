use std::collections::VecDeque;

use qcoord_distribution::DistributionManager;
use qcoord_types::{ActionKind, CollectionId, Priority};

use crate::action::Action;
use crate::target::TaskTarget;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Waiting,
    Processing,
    Completed,
    Canceled,
    Stale,
    Failed,
}

/// One reconciliation unit: an ordered sequence of actions against a
/// single segment or channel. A move is two actions, `[Grow(dst),
/// Reduce(src)]`; the step only advances past the current action once
/// its effect is observed in the distribution.
#[derive(Debug, Clone)]
pub struct Task {
    pub id: TaskId,
    pub collection_id: CollectionId,
    pub target: TaskTarget,
    pub priority: Priority,
    pub actions: VecDeque<Action>,
    pub status: TaskStatus,
}

impl Task {
    pub fn new(id: TaskId, collection_id: CollectionId, target: TaskTarget, priority: Priority, actions: Vec<Action>) -> Self {
        Self {
            id,
            collection_id,
            target,
            priority,
            actions: actions.into(),
            status: TaskStatus::Waiting,
        }
    }

    pub fn current_action(&self) -> Option<&Action> {
        self.actions.front()
    }

    pub fn current_action_mut(&mut self) -> Option<&mut Action> {
        self.actions.front_mut()
    }

    pub fn is_finished(&self) -> bool {
        self.actions.is_empty()
    }

    /// Whether the current action's effect is now visible in the
    /// distribution — a `Grow` is observed when the node reports holding
    /// the segment/channel; a `Reduce` is observed when it no longer does.
    fn current_action_observed(&self, distribution: &DistributionManager) -> bool {
        let Some(action) = self.current_action() else { return true };
        let present = match &self.target {
            TaskTarget::Segment { segment_id, .. } => distribution.has_segment(action.node, *segment_id),
            TaskTarget::Channel { channel, .. } => distribution.has_channel(action.node, channel),
        };
        match action.kind {
            ActionKind::Grow => present,
            ActionKind::Reduce => !present,
        }
    }

    /// Advances past the current action if the distribution confirms it
    /// completed. Returns `true` if the task made progress this call
    /// (including transitioning to `Completed`).
    pub fn advance_if_observed(&mut self, distribution: &DistributionManager) -> bool {
        if !self.current_action_observed(distribution) {
            return false;
        }
        self.actions.pop_front();
        if self.is_finished() {
            self.status = TaskStatus::Completed;
        }
        true
    }

    /// Drops the current action unconditionally, treating it as a
    /// success without waiting for a heartbeat — used for the
    /// `SegmentNotFound`/`SegmentNotLoaded`-during-reduce RPC outcome,
    /// which the spec defines as an immediate success.
    pub fn force_advance(&mut self) {
        self.actions.pop_front();
        if self.is_finished() {
            self.status = TaskStatus::Completed;
        }
    }

    pub fn cancel(&mut self) {
        self.status = TaskStatus::Canceled;
    }
}
