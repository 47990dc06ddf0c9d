use std::collections::HashMap;

use qcoord_types::{ActionKind, NodeId};

use crate::task::Task;

/// `count(Grow actions to N) - count(Reduce actions from N)` over the
/// currently active (wait + process) tasks for one collection, used by
/// balance and merge decisions to know where load is already headed
/// before a new heartbeat confirms it.
pub fn node_deltas<'a>(tasks: impl Iterator<Item = &'a Task>, is_segment: bool) -> HashMap<NodeId, i64> {
    let mut deltas: HashMap<NodeId, i64> = HashMap::new();
    for task in tasks {
        let matches_kind = match &task.target {
            crate::target::TaskTarget::Segment { .. } => is_segment,
            crate::target::TaskTarget::Channel { .. } => !is_segment,
        };
        if !matches_kind {
            continue;
        }
        for action in &task.actions {
            let delta = deltas.entry(action.node).or_insert(0);
            match action.kind {
                ActionKind::Grow => *delta += 1,
                ActionKind::Reduce => *delta -= 1,
            }
        }
    }
    deltas
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Action;
    use crate::target::TaskTarget;
    use crate::task::{Task, TaskId};
    use qcoord_types::{ChannelName, CollectionId, DataScope, Priority, ReplicaId, SegmentId};

    #[test]
    fn grow_and_reduce_on_same_node_cancel_out() {
        let target = TaskTarget::Segment {
            replica_id: ReplicaId::new(1),
            segment_id: SegmentId::new(1),
            channel: ChannelName::new("dmc0"),
            scope: DataScope::Historical,
        };
        let node = NodeId::new(1);
        let grow = Task::new(
            TaskId::new(1),
            CollectionId::new(100),
            target.clone(),
            Priority::Normal,
            vec![Action::new(ActionKind::Grow, node)],
        );
        let reduce = Task::new(
            TaskId::new(2),
            CollectionId::new(100),
            target,
            Priority::Normal,
            vec![Action::new(ActionKind::Reduce, node)],
        );

        let deltas = node_deltas([&grow, &reduce].into_iter(), true);
        assert_eq!(deltas.get(&node).copied().unwrap_or(0), 0);
    }
}
