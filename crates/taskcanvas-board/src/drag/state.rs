//! Drag gesture state.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use taskcanvas_core::{NodeId, NodeType, OperationError};
use tokio::task::JoinHandle;

use crate::geometry::Point;
use crate::render::RenderNode;
use crate::selection::SelectionSnapshot;

/// Gesture phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DragPhase {
    #[default]
    Idle,
    DragStarting,
    Dragging,
    /// Cool-down after commit; the committed nodes stay locked.
    Settling,
}

/// A node as reported by a render-layer drag event.
///
/// `position` is parent-relative when `parent_id` is set, and may be non-finite
/// if the layer misbehaves.
#[derive(Debug, Clone, PartialEq)]
pub struct DragNode {
    pub id: NodeId,
    pub node_type: NodeType,
    pub position: Point,
    pub parent_id: Option<NodeId>,
    pub width: f64,
    pub height: f64,
}

impl DragNode {
    pub fn from_render(node: &RenderNode) -> Self {
        Self {
            id: node.id.clone(),
            node_type: node.node_type,
            position: node.position,
            parent_id: node.parent_id.clone(),
            width: node.width,
            height: node.height,
        }
    }

    /// Same node reported at another display position.
    pub fn moved_to(&self, position: Point) -> Self {
        Self {
            position,
            ..self.clone()
        }
    }
}

/// A parent change made by a gesture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reparent {
    pub id: NodeId,
    pub from: Option<NodeId>,
    pub to: Option<NodeId>,
}

/// What a committed gesture did.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DragOutcome {
    /// Nodes whose new position was persisted, cascaded descendants included.
    pub moved: Vec<NodeId>,
    pub reparented: Vec<Reparent>,
    /// Refreshed task counts of every group whose membership changed.
    pub task_counts: BTreeMap<NodeId, usize>,
    /// Persist failures; the rest of the batch was still applied.
    pub errors: Vec<OperationError>,
}

impl DragOutcome {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn new_parent_of(&self, id: &NodeId) -> Option<Option<&NodeId>> {
        self.reparented
            .iter()
            .find(|r| &r.id == id)
            .map(|r| r.to.as_ref())
    }
}

/// A node in the dragged set.
#[derive(Debug, Clone)]
pub(crate) struct DraggedNode {
    pub id: NodeId,
    pub node_type: NodeType,
    pub start: Point,
    pub width: f64,
    pub height: f64,
    pub old_parent: Option<NodeId>,
    /// Descendant of another dragged group; moves rigidly with it and keeps
    /// its parent.
    pub carried: bool,
}

/// A descendant of a dragged group that is not itself in the dragged set.
#[derive(Debug, Clone)]
pub(crate) struct CascadedNode {
    pub id: NodeId,
    pub node_type: NodeType,
    pub start: Point,
    pub width: f64,
    pub height: f64,
    pub parent: Option<NodeId>,
}

/// State captured at drag start.
#[derive(Debug)]
pub(crate) struct DragSession {
    pub primary: NodeId,
    pub nodes: Vec<DraggedNode>,
    pub cascaded: Vec<CascadedNode>,
    pub locked: Vec<NodeId>,
    /// Groups raised for the gesture, with their previous stacking order.
    pub elevated: Vec<(NodeId, i32)>,
    pub selection: SelectionSnapshot,
    /// Last finite display position reported per node.
    pub last_good: HashMap<NodeId, Point>,
}

impl DragSession {
    pub fn node(&self, id: &NodeId) -> Option<&DraggedNode> {
        self.nodes.iter().find(|n| &n.id == id)
    }
}

/// Single cancellable timer handle for the settling window.
#[derive(Debug, Default)]
pub(crate) struct SettleTimer {
    handle: Option<JoinHandle<()>>,
}

impl SettleTimer {
    /// Runs `on_expiry` after `after`, replacing any pending timer.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<F>(&mut self, after: Duration, on_expiry: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.cancel();
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(after).await;
            on_expiry();
        }));
    }

    /// Cancels a pending timer; returns whether one was pending.
    pub fn cancel(&mut self) -> bool {
        match self.handle.take() {
            Some(handle) => {
                let pending = !handle.is_finished();
                handle.abort();
                pending
            }
            None => false,
        }
    }
}

impl Drop for SettleTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
