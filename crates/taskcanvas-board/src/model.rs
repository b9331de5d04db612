//! Board data model: tasks, groups and the node variant joining them.
//!
//! Only absolute positions are ever stored here. Parent-relative coordinates are a
//! render-layer concern and are derived on demand (see `handover` and `sync`).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use taskcanvas_core::{NodeId, NodeType};

use crate::geometry::{Bounds, Point, Spatial};

/// Task workflow status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Done,
}

/// Task priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

/// A leaf item on the board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: NodeId,
    pub title: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub project_id: Option<String>,
    /// Estimate in minutes.
    #[serde(default)]
    pub estimated_duration: Option<u32>,
    /// Absolute position; `None` while the task sits in the inbox.
    #[serde(default)]
    pub canvas_position: Option<Point>,
    #[serde(default)]
    pub parent_id: Option<NodeId>,
}

impl Task {
    /// Creates an unpositioned (inbox) task.
    pub fn new(id: impl Into<NodeId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            status: TaskStatus::default(),
            priority: Priority::default(),
            due_date: None,
            project_id: None,
            estimated_duration: None,
            canvas_position: None,
            parent_id: None,
        }
    }

    /// Builder: places the task at an absolute position.
    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.canvas_position = Some(Point::new(x, y));
        self
    }

    /// Builder: sets the parent group.
    pub fn in_group(mut self, parent: impl Into<NodeId>) -> Self {
        self.parent_id = Some(parent.into());
        self
    }

    /// True while the task has never been placed on the canvas.
    pub fn is_inbox(&self) -> bool {
        self.canvas_position.is_none()
    }
}

/// Explicit property-assignment rule applied to tasks dropped into a group.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignOnDrop {
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub project_id: Option<String>,
    /// Date keyword such as `"tomorrow"`, resolved by a `DateKeywordResolver`.
    #[serde(default)]
    pub due_date: Option<String>,
}

impl AssignOnDrop {
    pub fn is_empty(&self) -> bool {
        self.priority.is_none()
            && self.status.is_none()
            && self.project_id.is_none()
            && self.due_date.is_none()
    }
}

/// Legacy single-value assignment rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum PropertyValue {
    Priority(Priority),
    Status(TaskStatus),
    Project(String),
    DueDate(String),
}

/// A container on the board; groups may nest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: NodeId,
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub is_collapsed: bool,
    /// Absolute top-left.
    pub position: Point,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub parent_group_id: Option<NodeId>,
    #[serde(default)]
    pub assign_on_drop: Option<AssignOnDrop>,
    #[serde(default)]
    pub property_value: Option<PropertyValue>,
}

impl Group {
    pub fn new(id: impl Into<NodeId>, name: impl Into<String>, bounds: Bounds) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            color: None,
            is_collapsed: false,
            position: bounds.origin(),
            width: bounds.width(),
            height: bounds.height(),
            parent_group_id: None,
            assign_on_drop: None,
            property_value: None,
        }
    }

    /// Builder: sets the parent group.
    pub fn in_group(mut self, parent: impl Into<NodeId>) -> Self {
        self.parent_group_id = Some(parent.into());
        self
    }

    pub fn bounds_at(&self, origin: Point) -> Bounds {
        Bounds::from_origin(origin, self.width, self.height)
    }
}

impl Spatial for Group {
    fn bounds(&self) -> Bounds {
        self.bounds_at(self.position)
    }
}

/// A task or a group, with the fields common to both.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Task(Task),
    Group(Group),
}

impl Node {
    pub fn id(&self) -> &NodeId {
        match self {
            Node::Task(task) => &task.id,
            Node::Group(group) => &group.id,
        }
    }

    pub fn node_type(&self) -> NodeType {
        match self {
            Node::Task(_) => NodeType::Task,
            Node::Group(_) => NodeType::Group,
        }
    }

    pub fn parent_id(&self) -> Option<&NodeId> {
        match self {
            Node::Task(task) => task.parent_id.as_ref(),
            Node::Group(group) => group.parent_group_id.as_ref(),
        }
    }

    /// Stored absolute position; `None` for inbox tasks.
    pub fn absolute_position(&self) -> Option<Point> {
        match self {
            Node::Task(task) => task.canvas_position,
            Node::Group(group) => Some(group.position),
        }
    }

    /// Extents, using `task_size` for tasks.
    pub fn size(&self, task_size: (f64, f64)) -> (f64, f64) {
        match self {
            Node::Task(_) => task_size,
            Node::Group(group) => (group.width, group.height),
        }
    }
}
