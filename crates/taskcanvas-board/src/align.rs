//! Alignment and distribution.
//!
//! A programmatic writer: every move runs under a `Programmatic` lock on the
//! position authority, is applied with one `batch_update`, and is persisted with
//! the `"align"` tag. An active user drag outranks it, so nodes being dragged are
//! reported as failures and left alone.
//!
//! Coordinates are screen coordinates: `Top` is the smallest y.
//!
//! Parent links are never changed here. Aligning a group moves its undragged
//! descendants by the same delta.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use taskcanvas_core::{Error, NodeId, NodeType, OperationError, WriteSource};
use taskcanvas_settings::CanvasConfig;

use crate::containment::GroupIndex;
use crate::geometry::{Bounds, Point};
use crate::position::{PositionManager, PositionUpdate};
use crate::remote::RemoteWriter;
use crate::store::{BoardReader, BoardWriter, GroupPatch, TaskPatch};

const ALIGN: WriteSource = WriteSource::Programmatic;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Alignment {
    Left,
    CenterHorizontal,
    Right,
    Top,
    CenterVertical,
    Bottom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Axis {
    Horizontal,
    Vertical,
}

/// What an alignment or distribution did.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlignOutcome {
    /// Nodes whose new position was persisted, moved descendants included.
    pub moved: Vec<NodeId>,
    pub errors: Vec<OperationError>,
}

impl AlignOutcome {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Calculates the delta required to align each box according to `alignment`.
///
/// Returns an entry for every box that needs to move.
pub fn alignment_deltas(items: &[(NodeId, Bounds)], alignment: Alignment) -> Vec<(NodeId, Point)> {
    if items.is_empty() {
        return Vec::new();
    }

    let min_x = items.iter().map(|(_, b)| b.min_x).fold(f64::INFINITY, f64::min);
    let max_x = items.iter().map(|(_, b)| b.max_x).fold(f64::NEG_INFINITY, f64::max);
    let min_y = items.iter().map(|(_, b)| b.min_y).fold(f64::INFINITY, f64::min);
    let max_y = items.iter().map(|(_, b)| b.max_y).fold(f64::NEG_INFINITY, f64::max);

    let target = match alignment {
        Alignment::Left => min_x,
        Alignment::Right => max_x,
        Alignment::CenterHorizontal => (min_x + max_x) / 2.0,
        Alignment::Top => min_y,
        Alignment::Bottom => max_y,
        Alignment::CenterVertical => (min_y + max_y) / 2.0,
    };
    if !target.is_finite() {
        return Vec::new();
    }

    let mut deltas = Vec::new();
    for (id, bounds) in items {
        let (dx, dy) = match alignment {
            Alignment::Left => (target - bounds.min_x, 0.0),
            Alignment::Right => (target - bounds.max_x, 0.0),
            Alignment::CenterHorizontal => (target - bounds.center().x, 0.0),
            Alignment::Top => (0.0, target - bounds.min_y),
            Alignment::Bottom => (0.0, target - bounds.max_y),
            Alignment::CenterVertical => (0.0, target - bounds.center().y),
        };

        if dx.abs() > f64::EPSILON || dy.abs() > f64::EPSILON {
            deltas.push((id.clone(), Point::new(dx, dy)));
        }
    }
    deltas
}

/// Calculates deltas that space boxes evenly along `axis`.
///
/// The outermost boxes stay put and the gaps between neighbours become equal.
/// Fewer than three boxes are left alone.
pub fn distribution_deltas(items: &[(NodeId, Bounds)], axis: Axis) -> Vec<(NodeId, Point)> {
    if items.len() < 3 {
        return Vec::new();
    }

    let (start, extent): (fn(&Bounds) -> f64, fn(&Bounds) -> f64) = match axis {
        Axis::Horizontal => (|b| b.min_x, |b| b.width()),
        Axis::Vertical => (|b| b.min_y, |b| b.height()),
    };

    let mut sorted: Vec<&(NodeId, Bounds)> = items.iter().collect();
    sorted.sort_by(|a, b| start(&a.1).total_cmp(&start(&b.1)));

    let first = start(&sorted[0].1);
    let last = sorted[sorted.len() - 1];
    let span = start(&last.1) + extent(&last.1) - first;
    let occupied: f64 = sorted.iter().map(|(_, b)| extent(b)).sum();
    let gap = (span - occupied) / (sorted.len() - 1) as f64;

    let mut deltas = Vec::new();
    let mut cursor = first;
    for (id, bounds) in sorted {
        let shift = cursor - start(bounds);
        if shift.abs() > f64::EPSILON {
            let delta = match axis {
                Axis::Horizontal => Point::new(shift, 0.0),
                Axis::Vertical => Point::new(0.0, shift),
            };
            deltas.push((id.clone(), delta));
        }
        cursor += extent(bounds) + gap;
    }
    deltas
}

/// Applies alignment and distribution to persisted nodes.
pub struct AlignTool {
    positions: Arc<PositionManager>,
    remote: Option<Arc<RemoteWriter>>,
    task_size: (f64, f64),
}

/// A node moved by the tool.
struct Move {
    id: NodeId,
    node_type: NodeType,
    position: Point,
    size: (f64, f64),
    parent: Option<NodeId>,
}

impl AlignTool {
    pub fn new(positions: Arc<PositionManager>, config: &CanvasConfig) -> Self {
        Self {
            positions,
            remote: None,
            task_size: (config.geometry.task_width, config.geometry.task_height),
        }
    }

    pub fn with_remote(mut self, remote: Arc<RemoteWriter>) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Aligns the given nodes.
    ///
    /// # Arguments
    ///
    /// * `board` - Store the nodes are read from and persisted to
    /// * `ids` - Nodes to align; unknown ids are reported in the outcome
    /// * `alignment` - Edge or center to align on
    pub async fn align(
        &self,
        board: &mut dyn BoardWriter,
        ids: &[NodeId],
        alignment: Alignment,
    ) -> AlignOutcome {
        let mut outcome = AlignOutcome::default();
        let items = self.collect_bounds(board.reader(), ids, &mut outcome);
        let deltas = alignment_deltas(&items, alignment);
        tracing::info!("Aligning {} nodes ({:?}): {} move", items.len(), alignment, deltas.len());
        self.apply(board, deltas, outcome).await
    }

    /// Distributes the given nodes evenly along `axis`.
    pub async fn distribute(
        &self,
        board: &mut dyn BoardWriter,
        ids: &[NodeId],
        axis: Axis,
    ) -> AlignOutcome {
        let mut outcome = AlignOutcome::default();
        let items = self.collect_bounds(board.reader(), ids, &mut outcome);
        let deltas = distribution_deltas(&items, axis);
        tracing::info!("Distributing {} nodes ({:?}): {} move", items.len(), axis, deltas.len());
        self.apply(board, deltas, outcome).await
    }

    fn collect_bounds(
        &self,
        board: &dyn BoardReader,
        ids: &[NodeId],
        outcome: &mut AlignOutcome,
    ) -> Vec<(NodeId, Bounds)> {
        let mut items = Vec::with_capacity(ids.len());
        for id in ids {
            let bounds = if let Some(group) = board.group(id) {
                Some(Bounds::from_origin(group.position, group.width, group.height))
            } else {
                board
                    .task(id)
                    .and_then(|task| task.canvas_position)
                    .map(|pos| Bounds::from_origin(pos, self.task_size.0, self.task_size.1))
            };
            match bounds {
                Some(bounds) if bounds.origin().is_finite() => items.push((id.clone(), bounds)),
                _ => {
                    let err = Error::other(format!("No usable position for {}", id));
                    outcome.errors.push(err.into_operation_error("align"));
                }
            }
        }
        items
    }

    /// Expands group deltas to descendants and builds the final placements.
    fn plan(&self, board: &dyn BoardReader, deltas: &[(NodeId, Point)]) -> Vec<Move> {
        let index = GroupIndex::from_reader(board);
        let mut shifts: BTreeMap<NodeId, Point> = deltas.iter().cloned().collect();

        for (id, delta) in deltas {
            if board.group(id).is_none() {
                continue;
            }
            let mut family: HashSet<NodeId> = index.descendants(id).into_iter().collect();
            for descendant in &family {
                shifts.entry(descendant.clone()).or_insert(*delta);
            }
            family.insert(id.clone());
            for task in board.tasks() {
                if task.parent_id.as_ref().is_some_and(|p| family.contains(p)) {
                    shifts.entry(task.id.clone()).or_insert(*delta);
                }
            }
        }

        shifts
            .into_iter()
            .filter_map(|(id, delta)| {
                if let Some(group) = board.group(&id) {
                    Some(Move {
                        position: group.position + delta,
                        size: (group.width, group.height),
                        parent: group.parent_group_id.clone(),
                        node_type: NodeType::Group,
                        id,
                    })
                } else {
                    let task = board.task(&id)?;
                    Some(Move {
                        position: task.canvas_position? + delta,
                        size: self.task_size,
                        parent: task.parent_id.clone(),
                        node_type: NodeType::Task,
                        id,
                    })
                }
            })
            .collect()
    }

    async fn apply(
        &self,
        board: &mut dyn BoardWriter,
        deltas: Vec<(NodeId, Point)>,
        mut outcome: AlignOutcome,
    ) -> AlignOutcome {
        if deltas.is_empty() {
            return outcome;
        }

        let mut moves = self.plan(board.reader(), &deltas);
        moves.retain(|mv| {
            if self.positions.acquire_lock(&mv.id, ALIGN) {
                true
            } else {
                let err = Error::other(format!("{} is locked by another writer", mv.id));
                outcome.errors.push(err.into_operation_error("align"));
                false
            }
        });

        let updates: Vec<PositionUpdate> = moves
            .iter()
            .map(|mv| PositionUpdate::new(mv.id.clone(), mv.position, mv.parent.clone()))
            .collect();
        let batch = self.positions.batch_update(&updates, ALIGN);
        if !batch.all_accepted() {
            tracing::warn!("{} alignment updates rejected", batch.rejected_ids.len());
        }

        for mv in &moves {
            if batch.rejected_ids.contains(&mv.id) {
                let err = Error::other(format!("position authority rejected {}", mv.id));
                outcome.errors.push(err.into_operation_error("align"));
                continue;
            }
            match self.persist(board, mv).await {
                Ok(()) => outcome.moved.push(mv.id.clone()),
                Err(err) => {
                    tracing::warn!("Failed to persist aligned position of {}: {}", mv.id, err);
                    outcome.errors.push(err.into_operation_error("persist-position"));
                }
            }
        }

        for mv in &moves {
            self.positions.release_lock_held_by(&mv.id, ALIGN);
        }
        outcome
    }

    async fn persist(&self, board: &mut dyn BoardWriter, mv: &Move) -> taskcanvas_core::Result<()> {
        match mv.node_type {
            NodeType::Task => board.update_task(
                &mv.id,
                TaskPatch::placement(mv.position, mv.parent.clone()),
                ALIGN,
            )?,
            NodeType::Group => board.update_group(
                &mv.id,
                GroupPatch::placement(mv.position, mv.parent.clone()),
                ALIGN,
            )?,
        }

        if let Some(remote) = &self.remote {
            let bounds = Bounds::from_origin(mv.position, mv.size.0, mv.size.1);
            match mv.node_type {
                NodeType::Task => remote.write_task(&mv.id, mv.position, mv.parent.clone()).await?,
                NodeType::Group => remote.write_group(&mv.id, bounds, mv.parent.clone()).await?,
            };
        }
        Ok(())
    }
}

impl std::fmt::Debug for AlignTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlignTool")
            .field("remote", &self.remote.is_some())
            .field("task_size", &self.task_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Group, Task};
    use crate::store::MemoryBoard;
    use taskcanvas_core::EventBus;

    fn item(id: &str, x: f64, y: f64, w: f64, h: f64) -> (NodeId, Bounds) {
        (NodeId::new(id), Bounds::from_origin(Point::new(x, y), w, h))
    }

    #[test]
    fn test_align_left_deltas() {
        let items = vec![
            item("a", 10.0, 0.0, 20.0, 20.0),
            item("b", 40.0, 50.0, 20.0, 20.0),
        ];
        let deltas = alignment_deltas(&items, Alignment::Left);
        assert_eq!(deltas, vec![(NodeId::new("b"), Point::new(-30.0, 0.0))]);
    }

    #[test]
    fn test_align_top_uses_smallest_y() {
        let items = vec![
            item("a", 0.0, 10.0, 20.0, 20.0),
            item("b", 0.0, 100.0, 20.0, 20.0),
        ];
        let deltas = alignment_deltas(&items, Alignment::Top);
        assert_eq!(deltas, vec![(NodeId::new("b"), Point::new(0.0, -90.0))]);
    }

    #[test]
    fn test_align_center_vertical() {
        let items = vec![
            item("a", 0.0, 0.0, 10.0, 10.0),
            item("b", 0.0, 90.0, 10.0, 10.0),
        ];
        let deltas = alignment_deltas(&items, Alignment::CenterVertical);
        assert_eq!(
            deltas,
            vec![
                (NodeId::new("a"), Point::new(0.0, 45.0)),
                (NodeId::new("b"), Point::new(0.0, -45.0)),
            ]
        );
    }

    #[test]
    fn test_distribute_evens_gaps() {
        let items = vec![
            item("a", 0.0, 0.0, 10.0, 10.0),
            item("c", 90.0, 0.0, 10.0, 10.0),
            item("b", 20.0, 0.0, 10.0, 10.0),
        ];
        let deltas = distribution_deltas(&items, Axis::Horizontal);
        assert_eq!(deltas, vec![(NodeId::new("b"), Point::new(25.0, 0.0))]);
    }

    #[test]
    fn test_distribute_needs_three() {
        let items = vec![item("a", 0.0, 0.0, 10.0, 10.0), item("b", 50.0, 0.0, 10.0, 10.0)];
        assert!(distribution_deltas(&items, Axis::Horizontal).is_empty());
    }

    #[tokio::test]
    async fn test_align_moves_group_with_children() {
        let bus = Arc::new(EventBus::new());
        let positions = Arc::new(PositionManager::new(bus, &CanvasConfig::default()));
        let tool = AlignTool::new(Arc::clone(&positions), &CanvasConfig::default());

        let mut board = MemoryBoard::new();
        board.insert_group(Group::new("g1", "Left", Bounds::new(0.0, 0.0, 300.0, 300.0)));
        board.insert_group(Group::new("g2", "Right", Bounds::new(500.0, 40.0, 800.0, 340.0)));
        board.insert_task(Task::new("t1", "Inside").at(550.0, 100.0).in_group("g2"));

        let ids = [NodeId::new("g1"), NodeId::new("g2")];
        let outcome = tool.align(&mut board, &ids, Alignment::Top).await;
        assert!(outcome.is_clean());

        let g2 = board.group(&NodeId::new("g2")).unwrap();
        assert_eq!(g2.position, Point::new(500.0, 0.0));
        let t1 = board.task(&NodeId::new("t1")).unwrap();
        assert_eq!(t1.canvas_position, Some(Point::new(550.0, 60.0)));
        assert_eq!(t1.parent_id, Some(NodeId::new("g2")));

        // Programmatic writes are not undoable.
        assert_eq!(board.undo_depth(), 0);
        assert!(!positions.is_locked(&NodeId::new("g2")));
    }

    #[tokio::test]
    async fn test_align_skips_dragged_nodes() {
        let bus = Arc::new(EventBus::new());
        let positions = Arc::new(PositionManager::new(bus, &CanvasConfig::default()));
        let tool = AlignTool::new(Arc::clone(&positions), &CanvasConfig::default());

        let mut board = MemoryBoard::new();
        board.insert_task(Task::new("a", "A").at(0.0, 0.0));
        board.insert_task(Task::new("b", "B").at(100.0, 50.0));
        assert!(positions.acquire_lock(&NodeId::new("b"), WriteSource::UserDrag));

        let ids = [NodeId::new("a"), NodeId::new("b")];
        let outcome = tool.align(&mut board, &ids, Alignment::Left).await;
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].operation_name, "align");
        assert_eq!(
            board.task(&NodeId::new("b")).unwrap().canvas_position,
            Some(Point::new(100.0, 50.0))
        );
        assert_eq!(positions.lock_holder(&NodeId::new("b")), Some(WriteSource::UserDrag));
    }
}
