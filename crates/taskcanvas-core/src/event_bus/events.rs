//! Event type definitions for the event bus.
//!
//! Events are cloneable and serializable for logging/replay.

use serde::{Deserialize, Serialize};

use crate::error::OperationError;
use crate::types::{NodeId, WriteSource};

/// Root event enum for all canvas events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CanvasEvent {
    /// Position authority changes
    Position(PositionEvent),
    /// Drag gesture lifecycle
    Drag(DragEvent),
    /// Read-path projection events
    Sync(SyncEvent),
    /// Non-fatal operation failures
    Error(OperationError),
}

impl CanvasEvent {
    /// Get the category of this event
    pub fn category(&self) -> EventCategory {
        match self {
            CanvasEvent::Position(_) => EventCategory::Position,
            CanvasEvent::Drag(_) => EventCategory::Drag,
            CanvasEvent::Sync(_) => EventCategory::Sync,
            CanvasEvent::Error(_) => EventCategory::Error,
        }
    }

    /// Get a short description of this event for logging
    pub fn description(&self) -> String {
        match self {
            CanvasEvent::Position(e) => e.description(),
            CanvasEvent::Drag(e) => e.description(),
            CanvasEvent::Sync(e) => e.description(),
            CanvasEvent::Error(e) => e.to_string(),
        }
    }
}

/// Event category for filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventCategory {
    /// Position authority events.
    Position,
    /// Drag gesture events.
    Drag,
    /// Projection events.
    Sync,
    /// Error events.
    Error,
}

impl std::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventCategory::Position => write!(f, "Position"),
            EventCategory::Drag => write!(f, "Drag"),
            EventCategory::Sync => write!(f, "Sync"),
            EventCategory::Error => write!(f, "Error"),
        }
    }
}

/// Payload of an accepted position update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionPayload {
    /// Absolute x.
    pub x: f64,
    /// Absolute y.
    pub y: f64,
    /// Parent group, if any.
    pub parent_id: Option<NodeId>,
    /// Writer that produced the update.
    pub source: WriteSource,
}

/// Position authority events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PositionEvent {
    /// An update was accepted.
    Updated {
        /// The node that moved.
        node_id: NodeId,
        /// New absolute position and parent.
        payload: PositionPayload,
    },
    /// A writer took the exclusive lock.
    LockAcquired {
        /// The locked node.
        node_id: NodeId,
        /// The lock holder.
        source: WriteSource,
    },
    /// A lock was released.
    LockReleased {
        /// The unlocked node.
        node_id: NodeId,
    },
    /// The record was dropped because the node was deleted.
    Removed {
        /// The deleted node.
        node_id: NodeId,
    },
}

impl PositionEvent {
    /// Returns the node this event concerns.
    pub fn node_id(&self) -> &NodeId {
        match self {
            PositionEvent::Updated { node_id, .. }
            | PositionEvent::LockAcquired { node_id, .. }
            | PositionEvent::LockReleased { node_id }
            | PositionEvent::Removed { node_id } => node_id,
        }
    }

    /// Get a short description of this event for logging
    pub fn description(&self) -> String {
        match self {
            PositionEvent::Updated { node_id, payload } => format!(
                "{} -> ({:.1}, {:.1}) via {}",
                node_id, payload.x, payload.y, payload.source
            ),
            PositionEvent::LockAcquired { node_id, source } => {
                format!("{} locked by {}", node_id, source)
            }
            PositionEvent::LockReleased { node_id } => format!("{} unlocked", node_id),
            PositionEvent::Removed { node_id } => format!("{} removed", node_id),
        }
    }
}

/// Drag gesture events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DragEvent {
    /// A gesture began.
    Started {
        /// Nodes in the dragged set.
        node_ids: Vec<NodeId>,
    },
    /// A gesture was committed to the stores.
    Committed {
        /// Nodes whose position was persisted (including cascaded descendants).
        moved: usize,
        /// Nodes whose parent changed.
        reparented: usize,
        /// Persist failures in the batch.
        failed: usize,
    },
    /// The settling window elapsed.
    Settled,
}

impl DragEvent {
    /// Get a short description of this event for logging
    pub fn description(&self) -> String {
        match self {
            DragEvent::Started { node_ids } => format!("Drag started ({} nodes)", node_ids.len()),
            DragEvent::Committed {
                moved,
                reparented,
                failed,
            } => format!(
                "Drag committed: {} moved, {} reparented, {} failed",
                moved, reparented, failed
            ),
            DragEvent::Settled => "Drag settled".to_string(),
        }
    }
}

/// Projection events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SyncEvent {
    /// The render layer node set was replaced.
    Projected {
        /// Nodes emitted.
        emitted: usize,
        /// Children deferred because their parent was unresolved.
        deferred: usize,
    },
    /// Nothing changed; the replace was skipped.
    Unchanged,
    /// A recently deleted node was kept out of the projection.
    ZombieBlocked {
        /// The blocked id.
        node_id: NodeId,
    },
}

impl SyncEvent {
    /// Get a short description of this event for logging
    pub fn description(&self) -> String {
        match self {
            SyncEvent::Projected { emitted, deferred } => {
                format!("Projected {} nodes ({} deferred)", emitted, deferred)
            }
            SyncEvent::Unchanged => "Projection unchanged".to_string(),
            SyncEvent::ZombieBlocked { node_id } => format!("Blocked zombie {}", node_id),
        }
    }
}
