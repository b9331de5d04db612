//! Smart property inheritance.
//!
//! When a task lands in a chain of nested groups, each group from the root down
//! to the immediate parent may contribute metadata. Within a group the explicit
//! `assign_on_drop` rule wins over the legacy `property_value`, which wins over
//! values derived from the group's name. Across groups, deeper groups override
//! shallower ones.
//!
//! The result is a [`TaskPatch`] that never touches position or parent.

use crate::metadata::keywords::{keyword_priority, keyword_status, DateKeywordResolver};
use crate::model::{Group, PropertyValue};
use crate::store::TaskPatch;

/// Metadata contributed by a single group.
pub fn group_contribution(group: &Group, dates: &dyn DateKeywordResolver) -> TaskPatch {
    let mut patch = TaskPatch {
        due_date: dates.resolve(&group.name),
        priority: keyword_priority(&group.name),
        status: keyword_status(&group.name),
        ..Default::default()
    };

    if let Some(value) = &group.property_value {
        match value {
            PropertyValue::Priority(priority) => patch.priority = Some(*priority),
            PropertyValue::Status(status) => patch.status = Some(*status),
            PropertyValue::Project(project) => patch.project_id = Some(project.clone()),
            PropertyValue::DueDate(keyword) => {
                if let Some(date) = dates.resolve(keyword) {
                    patch.due_date = Some(date);
                }
            }
        }
    }

    if let Some(rule) = &group.assign_on_drop {
        if let Some(priority) = rule.priority {
            patch.priority = Some(priority);
        }
        if let Some(status) = rule.status {
            patch.status = Some(status);
        }
        if let Some(project) = &rule.project_id {
            patch.project_id = Some(project.clone());
        }
        if let Some(date) = rule.due_date.as_deref().and_then(|k| dates.resolve(k)) {
            patch.due_date = Some(date);
        }
    }

    patch
}

/// Merges contributions of `chain`, which must be ordered root to leaf.
pub fn inherited_patch(chain: &[&Group], dates: &dyn DateKeywordResolver) -> TaskPatch {
    let mut merged = TaskPatch::default();
    for group in chain {
        let contribution = group_contribution(group, dates);
        merged.due_date = contribution.due_date.or(merged.due_date);
        merged.priority = contribution.priority.or(merged.priority);
        merged.status = contribution.status.or(merged.status);
        merged.project_id = contribution.project_id.or(merged.project_id);
    }
    debug_assert!(!merged.touches_geometry());
    merged
}
