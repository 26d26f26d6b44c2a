//! Per-node push decisions.

use std::collections::BTreeSet;

use coursesync_model::{Task, TaskKind};

/// What a push does with one node of the course tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeAction {
    /// Node has no remote identity yet.
    Create,
    /// Node exists remotely and is updated in place.
    Update,
    /// Node is left alone.
    Skip,
}

/// Decide from a node's remote id alone.
pub fn decide(remote_id: u64) -> NodeAction {
    if remote_id == 0 {
        NodeAction::Create
    } else {
        NodeAction::Update
    }
}

/// Decide for a task, skipping excluded kinds.
pub fn decide_task(task: &Task, excluded: &BTreeSet<TaskKind>) -> NodeAction {
    if excluded.contains(&task.kind) {
        NodeAction::Skip
    } else {
        decide(task.id)
    }
}

/// Remote task ids with no local counterpart, in remote order.
///
/// `local` must hold the ids of every local task, excluded kinds included,
/// so that skipped tasks are not deleted remotely.
pub fn stale_remote_tasks(remote: &[u64], local: &BTreeSet<u64>) -> Vec<u64> {
    remote.iter().copied().filter(|id| !local.contains(id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_decide() {
        assert_eq!(decide(0), NodeAction::Create);
        assert_eq!(decide(12), NodeAction::Update);
    }

    #[test]
    fn test_decide_task_skips_excluded() {
        let excluded: BTreeSet<TaskKind> = [TaskKind::Choice].into_iter().collect();

        let quiz = Task::new("quiz", TaskKind::Choice).with_id(4);
        assert_eq!(decide_task(&quiz, &excluded), NodeAction::Skip);

        let edu = Task::new("edu", TaskKind::Edu);
        assert_eq!(decide_task(&edu, &excluded), NodeAction::Create);
    }

    #[test]
    fn test_stale_remote_tasks_keeps_order() {
        let local: BTreeSet<u64> = [2, 4].into_iter().collect();
        assert_eq!(stale_remote_tasks(&[5, 2, 3, 4], &local), vec![5, 3]);
    }

    fn task_kind() -> impl Strategy<Value = TaskKind> {
        prop_oneof![
            Just(TaskKind::Edu),
            Just(TaskKind::Output),
            Just(TaskKind::Theory),
            Just(TaskKind::Choice),
            Just(TaskKind::Code),
            Just(TaskKind::Ide),
        ]
    }

    proptest! {
        #[test]
        fn prop_stale_set_is_set_difference(
            remote in prop::collection::btree_set(1u64..200, 0..30),
            local in prop::collection::btree_set(1u64..200, 0..30),
        ) {
            let remote: Vec<u64> = remote.into_iter().collect();
            let stale = stale_remote_tasks(&remote, &local);

            for id in &stale {
                prop_assert!(!local.contains(id));
                prop_assert!(remote.contains(id));
            }
            for id in &remote {
                prop_assert_eq!(stale.contains(id), !local.contains(id));
            }
        }

        #[test]
        fn prop_decision_depends_on_id_and_kind_only(
            id in 0u64..1000,
            kind in task_kind(),
            excluded in prop::collection::btree_set(task_kind(), 0..4),
            name in "[a-z]{1,8}",
        ) {
            let task = Task::new(name, kind).with_id(id);
            let action = decide_task(&task, &excluded);

            let expected = if excluded.contains(&kind) {
                NodeAction::Skip
            } else if id == 0 {
                NodeAction::Create
            } else {
                NodeAction::Update
            };
            prop_assert_eq!(action, expected);
        }
    }
}
