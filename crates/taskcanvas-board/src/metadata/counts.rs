//! Recursive task counts per group.

use std::collections::{BTreeSet, HashMap};
use taskcanvas_core::NodeId;

use crate::containment::GroupIndex;
use crate::store::BoardReader;

/// Task count of every group, including tasks of descendant groups.
///
/// Groups without tasks are present with a count of zero. Tasks whose parent
/// is not a known group are not counted.
pub fn task_counts(board: &dyn BoardReader, max_depth: usize) -> HashMap<NodeId, usize> {
    let index = GroupIndex::from_reader(board);
    let mut counts: HashMap<NodeId, usize> =
        index.iter().map(|group| (group.id.clone(), 0)).collect();

    for task in board.tasks() {
        let Some(parent) = &task.parent_id else {
            continue;
        };
        if !index.contains(parent) {
            continue;
        }
        *counts.entry(parent.clone()).or_default() += 1;
        for ancestor in index.ancestors(parent, max_depth) {
            *counts.entry(ancestor).or_default() += 1;
        }
    }
    counts
}

/// Groups whose displayed count may change when membership moves from
/// `old_parent` to `new_parent`: both parents and all their ancestors.
pub fn affected_groups(
    index: &GroupIndex,
    old_parent: Option<&NodeId>,
    new_parent: Option<&NodeId>,
    max_depth: usize,
) -> BTreeSet<NodeId> {
    let mut affected = BTreeSet::new();
    for parent in [old_parent, new_parent].into_iter().flatten() {
        affected.insert(parent.clone());
        affected.extend(index.ancestors(parent, max_depth));
    }
    affected
}
