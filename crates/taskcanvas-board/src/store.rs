//! Persisted task/group store seam.
//!
//! The store is split into a read half ([`BoardReader`]) and a write half
//! ([`BoardWriter`]). Read-path consumers such as the sync projector only ever
//! receive a `&dyn BoardReader`, so the rule that projection never writes geometry
//! is enforced by the type system rather than by convention.
//!
//! [`MemoryBoard`] is the in-process implementation used by the session, the
//! binary and the tests. Writes tagged with an undoable source (`"drag"`) record
//! the previous node state as an undo entry; other sources do not.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use taskcanvas_core::{NodeId, StoreError, WriteSource};

use crate::containment::{would_create_cycle, GroupIndex};
use crate::geometry::Point;
use crate::model::{Group, Node, Priority, Task, TaskStatus};

const STORE_CYCLE_DEPTH: usize = 50;

/// Partial task update; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    pub canvas_position: Option<Point>,
    /// `Some(None)` clears the parent.
    pub parent_id: Option<Option<NodeId>>,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    pub due_date: Option<NaiveDate>,
    pub project_id: Option<String>,
    pub estimated_duration: Option<u32>,
}

impl TaskPatch {
    /// Position and parent only, as written by geometry writers.
    pub fn placement(position: Point, parent_id: Option<NodeId>) -> Self {
        Self {
            canvas_position: Some(position),
            parent_id: Some(parent_id),
            ..Default::default()
        }
    }

    /// True when the patch touches position or parent.
    pub fn touches_geometry(&self) -> bool {
        self.canvas_position.is_some() || self.parent_id.is_some()
    }

    /// True when the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        *self == TaskPatch::default()
    }

    fn apply(self, task: &mut Task) {
        if let Some(position) = self.canvas_position {
            task.canvas_position = Some(position);
        }
        if let Some(parent) = self.parent_id {
            task.parent_id = parent;
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(due) = self.due_date {
            task.due_date = Some(due);
        }
        if let Some(project) = self.project_id {
            task.project_id = Some(project);
        }
        if let Some(minutes) = self.estimated_duration {
            task.estimated_duration = Some(minutes);
        }
    }
}

/// Partial group update; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupPatch {
    pub position: Option<Point>,
    pub size: Option<(f64, f64)>,
    /// `Some(None)` clears the parent.
    pub parent_group_id: Option<Option<NodeId>>,
}

impl GroupPatch {
    pub fn placement(position: Point, parent_group_id: Option<NodeId>) -> Self {
        Self {
            position: Some(position),
            size: None,
            parent_group_id: Some(parent_group_id),
        }
    }
}

/// Read access to tasks and groups.
pub trait BoardReader {
    fn task(&self, id: &NodeId) -> Option<&Task>;

    fn group(&self, id: &NodeId) -> Option<&Group>;

    /// All tasks in a stable order.
    fn tasks(&self) -> Vec<&Task>;

    /// All groups in a stable order.
    fn groups(&self) -> Vec<&Group>;

    /// Looks a node up in either collection.
    fn node(&self, id: &NodeId) -> Option<Node> {
        self.task(id)
            .cloned()
            .map(Node::Task)
            .or_else(|| self.group(id).cloned().map(Node::Group))
    }
}

/// Write access; every write names its source.
pub trait BoardWriter: BoardReader {
    /// Read-only view of the same board.
    fn reader(&self) -> &dyn BoardReader;

    fn update_task(
        &mut self,
        id: &NodeId,
        patch: TaskPatch,
        source: WriteSource,
    ) -> Result<(), StoreError>;

    fn update_group(
        &mut self,
        id: &NodeId,
        patch: GroupPatch,
        source: WriteSource,
    ) -> Result<(), StoreError>;

    fn insert_task(&mut self, task: Task);

    fn insert_group(&mut self, group: Group);

    fn remove_task(&mut self, id: &NodeId) -> Option<Task>;

    fn remove_group(&mut self, id: &NodeId) -> Option<Group>;
}

/// Serializable board contents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoardSnapshot {
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub groups: Vec<Group>,
}

impl BoardSnapshot {
    /// Load a snapshot from a JSON file.
    pub fn load_from_file(path: &Path) -> taskcanvas_core::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let snapshot: Self = serde_json::from_str(&content)?;
        tracing::debug!(
            "Loaded {} tasks and {} groups from {}",
            snapshot.tasks.len(),
            snapshot.groups.len(),
            path.display()
        );
        Ok(snapshot)
    }

    /// Save the snapshot as pretty-printed JSON.
    pub fn save_to_file(&self, path: &Path) -> taskcanvas_core::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Node state captured before an undoable write.
#[derive(Debug, Clone, PartialEq)]
pub struct UndoEntry {
    pub source: WriteSource,
    pub before: Node,
}

/// In-memory board store.
#[derive(Debug, Clone, Default)]
pub struct MemoryBoard {
    tasks: BTreeMap<NodeId, Task>,
    groups: BTreeMap<NodeId, Group>,
    undo_log: Vec<UndoEntry>,
}

impl MemoryBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: BoardSnapshot) -> Self {
        let mut board = Self::new();
        for group in snapshot.groups {
            board.groups.insert(group.id.clone(), group);
        }
        for task in snapshot.tasks {
            board.tasks.insert(task.id.clone(), task);
        }
        board
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        BoardSnapshot {
            tasks: self.tasks.values().cloned().collect(),
            groups: self.groups.values().cloned().collect(),
        }
    }

    /// Number of recorded undo entries.
    pub fn undo_depth(&self) -> usize {
        self.undo_log.len()
    }

    pub fn undo_entries(&self) -> &[UndoEntry] {
        &self.undo_log
    }

    fn record(&mut self, source: WriteSource, before: Node) {
        if source.is_undoable() {
            self.undo_log.push(UndoEntry { source, before });
        }
    }
}

impl BoardReader for MemoryBoard {
    fn task(&self, id: &NodeId) -> Option<&Task> {
        self.tasks.get(id)
    }

    fn group(&self, id: &NodeId) -> Option<&Group> {
        self.groups.get(id)
    }

    fn tasks(&self) -> Vec<&Task> {
        self.tasks.values().collect()
    }

    fn groups(&self) -> Vec<&Group> {
        self.groups.values().collect()
    }
}

impl BoardWriter for MemoryBoard {
    fn reader(&self) -> &dyn BoardReader {
        self
    }

    fn update_task(
        &mut self,
        id: &NodeId,
        patch: TaskPatch,
        source: WriteSource,
    ) -> Result<(), StoreError> {
        if let Some(Some(parent)) = &patch.parent_id {
            if !self.groups.contains_key(parent) {
                return Err(StoreError::GroupNotFound { id: parent.clone() });
            }
        }
        let before = self
            .tasks
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::TaskNotFound { id: id.clone() })?;
        self.record(source, Node::Task(before));

        if let Some(task) = self.tasks.get_mut(id) {
            patch.apply(task);
        }
        tracing::trace!("task {} updated via {}", id, source);
        Ok(())
    }

    fn update_group(
        &mut self,
        id: &NodeId,
        patch: GroupPatch,
        source: WriteSource,
    ) -> Result<(), StoreError> {
        let before = self
            .groups
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::GroupNotFound { id: id.clone() })?;

        if let Some(Some(parent)) = &patch.parent_group_id {
            if !self.groups.contains_key(parent) {
                return Err(StoreError::GroupNotFound { id: parent.clone() });
            }
            let index = GroupIndex::from_groups(self.groups.values());
            if would_create_cycle(id, parent, &index, STORE_CYCLE_DEPTH) {
                return Err(StoreError::Cycle {
                    id: id.clone(),
                    parent: parent.clone(),
                });
            }
        }
        self.record(source, Node::Group(before));

        if let Some(group) = self.groups.get_mut(id) {
            if let Some(position) = patch.position {
                group.position = position;
            }
            if let Some((width, height)) = patch.size {
                group.width = width;
                group.height = height;
            }
            if let Some(parent) = patch.parent_group_id {
                group.parent_group_id = parent;
            }
        }
        tracing::trace!("group {} updated via {}", id, source);
        Ok(())
    }

    fn insert_task(&mut self, task: Task) {
        self.tasks.insert(task.id.clone(), task);
    }

    fn insert_group(&mut self, group: Group) {
        self.groups.insert(group.id.clone(), group);
    }

    fn remove_task(&mut self, id: &NodeId) -> Option<Task> {
        self.tasks.remove(id)
    }

    fn remove_group(&mut self, id: &NodeId) -> Option<Group> {
        self.groups.remove(id)
    }
}
