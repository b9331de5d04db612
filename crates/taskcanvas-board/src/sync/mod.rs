//! # Sync Projector
//!
//! Read path from the stores to the render layer. [`SyncProjector::project`]
//! rebuilds the full render node list from the board and the position authority,
//! and replaces the layer's node set only when something material changed.
//!
//! ## Rules
//!
//! - Groups are emitted parent-first (by ancestor depth) so the layer can
//!   resolve parent references.
//! - A node's absolute position comes from the position authority when it holds
//!   an unlocked record. While another writer holds the node's lock, the layer's
//!   current position is kept, so a just-committed drag is not overwritten by a
//!   stale read.
//! - A child whose parent is visible but not yet resolved in this pass is
//!   deferred, not rooted. A child of a hidden or missing parent renders at its
//!   absolute position as a root node.
//! - Recently deleted ids are never re-created.
//!
//! The projector only receives a [`BoardReader`]; it has no way to write to the
//! task or group stores.

mod zombie;

pub use zombie::RecentlyDeleted;

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use taskcanvas_core::{CanvasEvent, EventBus, NodeId, NodeType, SyncEvent};
use taskcanvas_settings::CanvasConfig;

use crate::containment::GroupIndex;
use crate::geometry::{to_relative, Point};
use crate::metadata::task_counts;
use crate::model::{Group, Task, TaskStatus};
use crate::position::PositionManager;
use crate::render::{NodeData, RenderLayer, RenderNode};
use crate::store::BoardReader;

/// Which tasks and groups are shown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectionFilter {
    pub hide_done: bool,
    /// Only tasks of this project are shown.
    pub project_id: Option<String>,
    /// Groups hidden from the canvas; their children render as root nodes.
    pub hidden_groups: BTreeSet<NodeId>,
}

impl ProjectionFilter {
    pub fn shows_task(&self, task: &Task) -> bool {
        if self.hide_done && task.status == TaskStatus::Done {
            return false;
        }
        match &self.project_id {
            Some(project) => task.project_id.as_ref() == Some(project),
            None => true,
        }
    }

    pub fn shows_group(&self, group: &Group) -> bool {
        !self.hidden_groups.contains(&group.id)
    }
}

/// Outcome of one projection pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectionReport {
    pub emitted: usize,
    pub deferred: Vec<NodeId>,
    pub blocked: Vec<NodeId>,
    /// Whether the layer's node set was replaced.
    pub replaced: bool,
}

/// Rebuilds render nodes from the board.
#[derive(Debug)]
pub struct SyncProjector {
    positions: Arc<PositionManager>,
    bus: Arc<EventBus>,
    filter: ProjectionFilter,
    zombies: RecentlyDeleted,
    tolerance: f64,
    border_inset: f64,
    task_size: (f64, f64),
    max_depth: usize,
}

impl SyncProjector {
    pub fn new(positions: Arc<PositionManager>, bus: Arc<EventBus>, config: &CanvasConfig) -> Self {
        Self {
            positions,
            bus,
            filter: ProjectionFilter::default(),
            zombies: RecentlyDeleted::new(config.sync.zombie_ttl()),
            tolerance: config.sync.position_tolerance,
            border_inset: config.geometry.border_inset,
            task_size: (config.geometry.task_width, config.geometry.task_height),
            max_depth: config.containment.max_ancestor_depth,
        }
    }

    pub fn filter(&self) -> &ProjectionFilter {
        &self.filter
    }

    /// Replaces the filter; returns whether it changed.
    pub fn set_filter(&mut self, filter: ProjectionFilter) -> bool {
        if self.filter == filter {
            return false;
        }
        self.filter = filter;
        true
    }

    /// Puts `id` on the deleted deny-list.
    pub fn mark_deleted(&mut self, id: NodeId) {
        self.zombies.mark(id);
    }

    pub fn is_recently_deleted(&self, id: &NodeId) -> bool {
        self.zombies.contains(id)
    }

    /// Runs one projection pass.
    pub fn project(
        &mut self,
        board: &dyn BoardReader,
        layer: &mut dyn RenderLayer,
    ) -> ProjectionReport {
        self.zombies.purge_expired();
        let (nodes, mut report) = self.build_nodes(board, &*layer);
        report.emitted = nodes.len();

        for id in &report.blocked {
            self.publish(SyncEvent::ZombieBlocked {
                node_id: id.clone(),
            });
        }

        if self.unchanged(&nodes, &*layer) {
            tracing::trace!("Projection unchanged ({} nodes)", nodes.len());
            self.publish(SyncEvent::Unchanged);
            return report;
        }

        report.replaced = true;
        tracing::debug!(
            "Projecting {} nodes ({} deferred)",
            nodes.len(),
            report.deferred.len()
        );
        layer.replace_nodes(nodes);
        self.publish(SyncEvent::Projected {
            emitted: report.emitted,
            deferred: report.deferred.len(),
        });
        report
    }

    /// Computes the node list without touching the layer.
    pub fn build_nodes(
        &self,
        board: &dyn BoardReader,
        layer: &dyn RenderLayer,
    ) -> (Vec<RenderNode>, ProjectionReport) {
        let mut report = ProjectionReport::default();
        let index = GroupIndex::from_reader(board);
        let counts = task_counts(board, self.max_depth);

        let mut groups: Vec<&Group> = Vec::new();
        for group in board.groups() {
            if self.zombies.contains(&group.id) {
                report.blocked.push(group.id.clone());
            } else if self.filter.shows_group(group) {
                groups.push(group);
            }
        }
        let visible: HashSet<&NodeId> = groups.iter().copied().map(|g| &g.id).collect();
        groups.sort_by_key(|group| index.depth(&group.id, self.max_depth));

        let mut resolved: HashMap<NodeId, Point> = HashMap::new();
        let mut nodes = Vec::new();

        for group in groups {
            let absolute = self.authoritative(&group.id, Some(group.position), layer);
            let Some(absolute) = absolute else {
                continue;
            };
            let Some((position, parent_id)) =
                self.display(absolute, group.parent_group_id.as_ref(), &visible, &resolved)
            else {
                tracing::debug!("Deferring group {}: parent not resolved", group.id);
                report.deferred.push(group.id.clone());
                continue;
            };
            resolved.insert(group.id.clone(), absolute);
            nodes.push(RenderNode {
                id: group.id.clone(),
                node_type: NodeType::Group,
                position,
                parent_id,
                width: group.width,
                height: group.height,
                z_index: 0,
                absolute: Some(absolute),
                data: NodeData::Group {
                    label: group.name.clone(),
                    color: group.color.clone(),
                    collapsed: group.is_collapsed,
                    task_count: counts.get(&group.id).copied().unwrap_or(0),
                },
            });
        }

        for task in board.tasks() {
            if self.zombies.contains(&task.id) {
                report.blocked.push(task.id.clone());
                continue;
            }
            if !self.filter.shows_task(task) {
                continue;
            }
            // Inbox tasks have no place on the canvas yet.
            let Some(absolute) = self.authoritative(&task.id, task.canvas_position, layer) else {
                continue;
            };
            let Some((position, parent_id)) =
                self.display(absolute, task.parent_id.as_ref(), &visible, &resolved)
            else {
                tracing::debug!("Deferring task {}: parent not resolved", task.id);
                report.deferred.push(task.id.clone());
                continue;
            };
            nodes.push(RenderNode {
                id: task.id.clone(),
                node_type: NodeType::Task,
                position,
                parent_id,
                width: self.task_size.0,
                height: self.task_size.1,
                z_index: 0,
                absolute: Some(absolute),
                data: NodeData::Task {
                    title: task.title.clone(),
                    status: task.status,
                    priority: task.priority,
                },
            });
        }

        (nodes, report)
    }

    /// Absolute position to project for `id`.
    fn authoritative(
        &self,
        id: &NodeId,
        stored: Option<Point>,
        layer: &dyn RenderLayer,
    ) -> Option<Point> {
        let record = self.positions.get_position(id);
        let from_record = record.as_ref().map(|r| r.absolute_position);

        let locked = record.as_ref().is_some_and(|r| r.locked_by.is_some());
        let chosen = if locked {
            layer
                .node(id)
                .and_then(|node| node.absolute)
                .or(from_record)
                .or(stored)
        } else {
            from_record.or(stored)
        };

        match chosen {
            Some(point) if point.is_finite() => Some(point),
            Some(point) => {
                tracing::warn!(
                    "Ignoring non-finite position for {}: ({}, {})",
                    id,
                    point.x,
                    point.y
                );
                stored.and_then(Point::finite)
            }
            None => None,
        }
    }

    /// Display position and effective parent, or `None` to defer.
    fn display(
        &self,
        absolute: Point,
        parent: Option<&NodeId>,
        visible: &HashSet<&NodeId>,
        resolved: &HashMap<NodeId, Point>,
    ) -> Option<(Point, Option<NodeId>)> {
        match parent {
            Some(parent) if visible.contains(parent) => resolved.get(parent).map(|parent_abs| {
                (
                    to_relative(absolute, *parent_abs, self.border_inset),
                    Some(parent.clone()),
                )
            }),
            _ => Some((absolute, None)),
        }
    }

    fn unchanged(&self, nodes: &[RenderNode], layer: &dyn RenderLayer) -> bool {
        nodes.len() == layer.nodes().len()
            && nodes.iter().all(|node| {
                layer
                    .node(&node.id)
                    .is_some_and(|current| node.same_render(current, self.tolerance))
            })
    }

    fn publish(&self, event: SyncEvent) {
        let _ = self.bus.publish(CanvasEvent::Sync(event));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Bounds;
    use crate::model::Group;
    use crate::render::RenderGraph;
    use crate::store::{BoardWriter, MemoryBoard};
    use taskcanvas_core::WriteSource;

    fn projector() -> (SyncProjector, Arc<PositionManager>) {
        let config = CanvasConfig::default();
        let bus = Arc::new(EventBus::new());
        let positions = Arc::new(PositionManager::new(bus.clone(), &config));
        (SyncProjector::new(positions.clone(), bus, &config), positions)
    }

    fn board() -> MemoryBoard {
        let mut board = MemoryBoard::new();
        board.insert_group(Group::new("g", "G", Bounds::new(100.0, 100.0, 400.0, 300.0)));
        board.insert_task(Task::new("t", "T").at(150.0, 150.0).in_group("g"));
        board.insert_task(Task::new("inbox", "Inbox"));
        board
    }

    #[test]
    fn test_children_render_relative() {
        let (mut projector, _) = projector();
        let mut layer = RenderGraph::new(0.0);
        let report = projector.project(&board(), &mut layer);
        assert_eq!(report.emitted, 2);

        let task = layer.node(&NodeId::new("t")).unwrap();
        assert_eq!(task.position, Point::new(50.0, 50.0));
        assert_eq!(task.parent_id, Some(NodeId::new("g")));
    }

    #[test]
    fn test_hidden_parent_roots_child() {
        let (mut projector, _) = projector();
        let mut filter = ProjectionFilter::default();
        filter.hidden_groups.insert(NodeId::new("g"));
        assert!(projector.set_filter(filter));

        let mut layer = RenderGraph::new(0.0);
        projector.project(&board(), &mut layer);
        let task = layer.node(&NodeId::new("t")).unwrap();
        assert_eq!(task.parent_id, None);
        assert_eq!(task.position, Point::new(150.0, 150.0));
    }

    #[test]
    fn test_locked_node_keeps_layer_position() {
        let (mut projector, positions) = projector();
        let mut layer = RenderGraph::new(0.0);
        let board = board();
        projector.project(&board, &mut layer);

        let t = NodeId::new("t");
        let g = Some(NodeId::new("g"));
        positions.update(&t, Point::new(150.0, 150.0), g, WriteSource::RemoteSync);
        positions.acquire_lock(&t, WriteSource::UserDrag);
        layer.node_mut(&t).unwrap().absolute = Some(Point::new(160.0, 170.0));

        let (nodes, _) = projector.build_nodes(&board, &layer);
        let task = nodes.iter().find(|n| n.id == t).unwrap();
        assert_eq!(task.position, Point::new(60.0, 70.0));
    }

    #[test]
    fn test_filter_hides_done_tasks() {
        let (mut projector, _) = projector();
        let mut board = board();
        board.insert_task(Task {
            status: TaskStatus::Done,
            ..Task::new("done", "Done").at(0.0, 0.0)
        });
        projector.set_filter(ProjectionFilter {
            hide_done: true,
            ..Default::default()
        });
        let mut layer = RenderGraph::new(0.0);
        projector.project(&board, &mut layer);
        assert!(layer.node(&NodeId::new("done")).is_none());
    }
}
