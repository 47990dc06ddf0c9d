use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use qcoord_distribution::DistributionManager;
use qcoord_target::TargetManager;
use qcoord_types::{ActionKind, ChannelName, CollectionId, DataScope, NodeId, Priority};

use crate::action::{Action, ActionState};
use crate::error::TaskError;
use crate::target::{ConflictKey, TaskTarget};
use crate::task::{Task, TaskId, TaskStatus};
use crate::worker_client::{WorkerClient, WorkerRpcError};

const DEFAULT_ACTION_TIMEOUT: Duration = Duration::from_secs(120);
const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Outcome of one [`TaskScheduler::dispatch_tick`] pass, returned for
/// observability and testing rather than threaded through any control flow.
#[derive(Debug, Default, Clone)]
pub struct DispatchReport {
    pub dispatched: usize,
    pub completed: Vec<TaskId>,
    pub failed: Vec<TaskId>,
    pub stale: Vec<TaskId>,
    /// Tasks failed because the worker reported `InsufficientMemoryToLoad`,
    /// paired with the collection they belong to. Callers feed these into
    /// a failed-load cache rather than treating them as an ordinary retry
    /// exhaustion.
    pub insufficient_memory: Vec<(TaskId, CollectionId)>,
}

struct Queues {
    wait: HashMap<Priority, std::collections::VecDeque<TaskId>>,
    process: HashMap<Priority, std::collections::VecDeque<TaskId>>,
}

impl Queues {
    fn empty() -> Self {
        let mut wait = HashMap::new();
        let mut process = HashMap::new();
        for p in [Priority::High, Priority::Normal, Priority::Low] {
            wait.insert(p, std::collections::VecDeque::new());
            process.insert(p, std::collections::VecDeque::new());
        }
        Self { wait, process }
    }
}

/// The reconciliation engine: accepts Grow/Reduce task submissions from the
/// job scheduler and balance/leader checkers, serializes them against a
/// per-`(replica, entity)` conflict index, and drives them to completion
/// against the worker RPC surface. Has no dependency on `qcoord-job` or
/// `qcoord-checkers` — it only consumes [`TaskTarget`]s and actions, never
/// calls back into the layers that submit them.
pub struct TaskScheduler {
    distribution: Arc<DistributionManager>,
    target: Arc<TargetManager>,
    worker: Arc<dyn WorkerClient>,
    next_id: AtomicU64,
    tasks: RwLock<HashMap<TaskId, Task>>,
    index: RwLock<HashMap<ConflictKey, TaskId>>,
    queues: RwLock<Queues>,
    action_timeout: Duration,
    max_attempts: u32,
}

impl TaskScheduler {
    pub fn new(distribution: Arc<DistributionManager>, target: Arc<TargetManager>, worker: Arc<dyn WorkerClient>) -> Self {
        Self {
            distribution,
            target,
            worker,
            next_id: AtomicU64::new(1),
            tasks: RwLock::new(HashMap::new()),
            index: RwLock::new(HashMap::new()),
            queues: RwLock::new(Queues::empty()),
            action_timeout: DEFAULT_ACTION_TIMEOUT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    #[cfg(test)]
    fn with_action_timeout(mut self, timeout: Duration) -> Self {
        self.action_timeout = timeout;
        self
    }

    fn target_is_satisfied(&self, target: &TaskTarget, actions: &std::collections::VecDeque<Action>) -> bool {
        let Some(first) = actions.front() else { return true };
        let present = match target {
            TaskTarget::Segment { segment_id, .. } => self.distribution.has_segment(first.node, *segment_id),
            TaskTarget::Channel { channel, .. } => self.distribution.has_channel(first.node, channel),
        };
        match first.kind {
            ActionKind::Grow => present,
            ActionKind::Reduce => !present,
        }
    }

    /// Admits a new task. Rejects `AlreadyDone` if the first action's effect
    /// is already visible in the distribution, and `ConflictTaskExisted` if
    /// an equal-or-higher priority task already targets the same
    /// `(replica, entity)` pair. A strictly higher priority submission
    /// cancels and replaces the existing one.
    pub fn submit(&self, collection_id: CollectionId, target: TaskTarget, priority: Priority, actions: Vec<Action>) -> Result<TaskId, TaskError> {
        let actions: std::collections::VecDeque<Action> = actions.into();
        if self.target_is_satisfied(&target, &actions) {
            return Err(TaskError::AlreadyDone);
        }

        let key = target.conflict_key();
        {
            let index = self.index.read();
            if let Some(&existing_id) = index.get(&key) {
                let tasks = self.tasks.read();
                if let Some(existing) = tasks.get(&existing_id) {
                    if existing.priority >= priority {
                        return Err(TaskError::ConflictTaskExisted);
                    }
                }
            }
        }
        // Higher priority than whatever is indexed (or nothing indexed): cancel-and-replace.
        if let Some(existing_id) = self.index.read().get(&key).copied() {
            self.cancel(existing_id);
        }

        let id = TaskId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let task = Task::new(id, collection_id, target, priority, actions.into());
        self.tasks.write().insert(id, task);
        self.index.write().insert(key, id);
        self.queues.write().wait.get_mut(&priority).unwrap().push_back(id);
        Ok(id)
    }

    /// Cancels a task, wherever it sits (wait, process, or already
    /// dispatched). A no-op if the id is unknown or already finished.
    pub fn cancel(&self, id: TaskId) {
        let mut tasks = self.tasks.write();
        if let Some(task) = tasks.get_mut(&id) {
            if !task.is_finished() && task.status != TaskStatus::Completed {
                task.cancel();
            }
        }
        drop(tasks);
        self.retire(id);
    }

    /// Removes a finished/canceled/stale/failed task from the queues and
    /// conflict index, leaving only its terminal record (callers interested
    /// in the final status should read it before calling `retire`, or rely
    /// on [`TaskScheduler::status_of`] which tolerates the gap).
    fn retire(&self, id: TaskId) {
        let key = {
            let tasks = self.tasks.read();
            tasks.get(&id).map(|t| t.target.conflict_key())
        };
        if let Some(key) = key {
            let mut index = self.index.write();
            if index.get(&key) == Some(&id) {
                index.remove(&key);
            }
        }
        let mut queues = self.queues.write();
        for q in queues.wait.values_mut().chain(queues.process.values_mut()) {
            q.retain(|&queued| queued != id);
        }
    }

    pub fn status_of(&self, id: TaskId) -> Option<TaskStatus> {
        self.tasks.read().get(&id).map(|t| t.status)
    }

    pub fn node_segment_delta(&self, collection_id: CollectionId) -> HashMap<NodeId, i64> {
        let tasks = self.tasks.read();
        crate::delta::node_deltas(tasks.values().filter(|t| t.collection_id == collection_id), true)
    }

    pub fn node_channel_delta(&self, collection_id: CollectionId) -> HashMap<NodeId, i64> {
        let tasks = self.tasks.read();
        crate::delta::node_deltas(tasks.values().filter(|t| t.collection_id == collection_id), false)
    }

    /// Whether `target`'s current action no longer matches the next target
    /// snapshot — a stale task is dropped rather than executed, since its
    /// effect is no longer wanted.
    fn is_stale(&self, task: &Task, live_nodes: &HashSet<NodeId>) -> bool {
        let Some(action) = task.current_action() else { return false };
        if !live_nodes.contains(&action.node) {
            return true;
        }
        let Some(next) = self.target.next(task.collection_id) else {
            // No published target at all: nothing to be stale against yet.
            return false;
        };
        match &task.target {
            TaskTarget::Segment { segment_id, scope, .. } => {
                if action.kind == ActionKind::Reduce {
                    // Reduce is always valid: we are removing something, and an
                    // absent target only strengthens the case for removing it.
                    return false;
                }
                let wanted = match scope {
                    DataScope::Streaming => next.growing_segments.contains(segment_id),
                    DataScope::Historical => next.historical_segments.contains_key(segment_id),
                    DataScope::All => next.growing_segments.contains(segment_id) || next.historical_segments.contains_key(segment_id),
                };
                !wanted
            }
            TaskTarget::Channel { channel, .. } => {
                if action.kind == ActionKind::Reduce {
                    return false;
                }
                !next.channels.contains_key(channel)
            }
        }
    }

    /// Promotes wait → process, re-running the `AlreadyDone` and staleness
    /// checks that held at submission time but may no longer hold.
    fn promote(&self, live_nodes: &HashSet<NodeId>, report: &mut DispatchReport) {
        let mut tasks = self.tasks.write();
        let mut queues = self.queues.write();
        for p in [Priority::High, Priority::Normal, Priority::Low] {
            let wait = queues.wait.get_mut(&p).unwrap();
            while let Some(id) = wait.pop_front() {
                let Some(task) = tasks.get_mut(&id) else { continue };
                if task.status == TaskStatus::Canceled {
                    continue;
                }
                if self.target_is_satisfied(&task.target, &task.actions) {
                    task.status = TaskStatus::Completed;
                    report.completed.push(id);
                    continue;
                }
                if self.is_stale(task, live_nodes) {
                    task.status = TaskStatus::Stale;
                    report.stale.push(id);
                    continue;
                }
                task.status = TaskStatus::Processing;
                queues.process.get_mut(&p).unwrap().push_back(id);
            }
        }
    }

    /// Dispatches every `Pending` action in the process queues, merging
    /// segment-grow actions destined for the same `(node, channel)` into one
    /// batched RPC, then drives completion/timeout handling for every
    /// `Dispatched` action. `live_nodes` is the set of currently-live worker
    /// nodes as known by the caller (the task scheduler owns no membership
    /// view of its own).
    pub async fn dispatch_tick(&self, live_nodes: &HashSet<NodeId>) -> DispatchReport {
        let mut report = DispatchReport::default();
        self.promote(live_nodes, &mut report);

        let process_ids: Vec<TaskId> = {
            let queues = self.queues.read();
            [Priority::High, Priority::Normal, Priority::Low]
                .into_iter()
                .flat_map(|p| queues.process.get(&p).unwrap().iter().copied().collect::<Vec<_>>())
                .collect()
        };

        // Re-check staleness for tasks already in `process` too: the target
        // can move on while a task is mid-flight.
        {
            let mut tasks = self.tasks.write();
            for &id in &process_ids {
                if let Some(task) = tasks.get_mut(&id) {
                    if task.status == TaskStatus::Processing && self.is_stale(task, live_nodes) {
                        task.status = TaskStatus::Stale;
                        report.stale.push(id);
                    }
                }
            }
        }

        let mut segment_grow_groups: HashMap<(NodeId, ChannelName), Vec<TaskId>> = HashMap::new();
        let mut individual: Vec<TaskId> = Vec::new();
        let now = Instant::now();

        {
            let mut tasks = self.tasks.write();
            for &id in &process_ids {
                let Some(task) = tasks.get_mut(&id) else { continue };
                if task.status != TaskStatus::Processing {
                    continue;
                }
                let Some(action) = task.current_action_mut() else { continue };
                match action.state {
                    ActionState::Pending => match (&task.target, action.kind) {
                        (TaskTarget::Segment { channel, .. }, ActionKind::Grow) => {
                            segment_grow_groups.entry((action.node, channel.clone())).or_default().push(id);
                        }
                        _ => individual.push(id),
                    },
                    ActionState::Dispatched => {
                        if task.advance_if_observed(&self.distribution) {
                            if task.is_finished() {
                                report.completed.push(id);
                            }
                        } else if action.timed_out(now, self.action_timeout) {
                            action.reset_for_retry();
                        }
                    }
                }
            }
        }

        for ((node, channel), ids) in segment_grow_groups {
            let segment_ids: Vec<_> = {
                let tasks = self.tasks.read();
                ids.iter()
                    .filter_map(|id| tasks.get(id))
                    .filter_map(|t| match &t.target {
                        TaskTarget::Segment { segment_id, .. } => Some(*segment_id),
                        TaskTarget::Channel { .. } => None,
                    })
                    .collect()
            };
            let result = self.worker.grow_segments(node, &channel, &segment_ids).await;
            self.apply_rpc_result(&ids, result, now, &mut report);
        }

        for id in individual {
            let (target, kind, node) = {
                let tasks = self.tasks.read();
                let Some(task) = tasks.get(&id) else { continue };
                let Some(action) = task.current_action() else { continue };
                (task.target.clone(), action.kind, action.node)
            };
            let result = match (&target, kind) {
                (TaskTarget::Segment { segment_id, .. }, ActionKind::Reduce) => self.worker.reduce_segment(node, *segment_id).await,
                (TaskTarget::Channel { channel, .. }, ActionKind::Grow) => self.worker.grow_channel(node, channel).await,
                (TaskTarget::Channel { channel, .. }, ActionKind::Reduce) => self.worker.reduce_channel(node, channel).await,
                (TaskTarget::Segment { .. }, ActionKind::Grow) => unreachable!("segment grows are always batched"),
            };
            self.apply_rpc_result(&[id], result, now, &mut report);
        }

        for id in &report.completed {
            self.retire(*id);
        }
        for id in &report.stale {
            self.retire(*id);
        }
        for id in &report.failed {
            self.retire(*id);
        }
        report.dispatched = process_ids.len();
        report
    }

    /// Classifies one worker RPC outcome against every task in `ids`
    /// (a batched grow-segments call applies its result uniformly to the
    /// whole merge group): `NodeNotFound` fails the task outright,
    /// `SegmentNotFound`/`SegmentNotLoaded` during a reduce is treated as an
    /// immediate success per spec, anything else is logged and retried up
    /// to the attempt cap.
    fn apply_rpc_result(&self, ids: &[TaskId], result: Result<(), WorkerRpcError>, now: Instant, report: &mut DispatchReport) {
        let mut tasks = self.tasks.write();
        for &id in ids {
            let Some(task) = tasks.get_mut(&id) else { continue };
            match &result {
                Ok(()) => {
                    if let Some(action) = task.current_action_mut() {
                        action.mark_dispatched(now);
                    }
                }
                Err(WorkerRpcError::NodeNotFound(node)) => {
                    tracing::warn!(task_id = %id, node_id = %node, "task failed: node not found");
                    task.status = TaskStatus::Failed;
                    report.failed.push(id);
                }
                Err(WorkerRpcError::SegmentNotFound(_)) | Err(WorkerRpcError::SegmentNotLoaded(_))
                    if task.current_action().is_some_and(|a| a.kind == ActionKind::Reduce) =>
                {
                    task.force_advance();
                    if task.is_finished() {
                        report.completed.push(id);
                    }
                }
                Err(WorkerRpcError::InsufficientMemoryToLoad) => {
                    tracing::warn!(task_id = %id, "task failed: insufficient memory to load");
                    task.status = TaskStatus::Failed;
                    report.failed.push(id);
                    report.insufficient_memory.push((id, task.collection_id));
                }
                Err(other) => {
                    tracing::warn!(task_id = %id, error = %other, "worker rpc failed, will retry");
                    if let Some(action) = task.current_action_mut() {
                        action.attempts += 1;
                        if action.attempts >= self.max_attempts {
                            task.status = TaskStatus::Failed;
                            report.failed.push(id);
                        }
                    }
                }
            }
        }
    }
}
