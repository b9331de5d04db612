//! Position records and batch results.

use serde::{Deserialize, Serialize};
use taskcanvas_core::{NodeId, WriteSource};

use crate::geometry::Point;

/// The position authority's unit of state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionRecord {
    pub id: NodeId,
    pub absolute_position: Point,
    pub parent_id: Option<NodeId>,
    /// Active lock holder, if any.
    pub locked_by: Option<WriteSource>,
    /// Incremented on every accepted update.
    pub version: u64,
}

/// One entry of a batch update.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionUpdate {
    pub id: NodeId,
    pub position: Point,
    pub parent_id: Option<NodeId>,
}

impl PositionUpdate {
    pub fn new(id: impl Into<NodeId>, position: Point, parent_id: Option<NodeId>) -> Self {
        Self {
            id: id.into(),
            position,
            parent_id,
        }
    }
}

/// Outcome of [`PositionManager::batch_update`](super::PositionManager::batch_update).
///
/// Rejections are expected arbitration outcomes, not errors; callers retry on
/// their next natural cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub success_count: usize,
    pub rejected_ids: Vec<NodeId>,
}

impl BatchResult {
    pub fn all_accepted(&self) -> bool {
        self.rejected_ids.is_empty()
    }
}
