//! # Drag Orchestrator
//!
//! Drives one gesture at a time through `Idle → DragStarting → Dragging →
//! Settling → Idle` for single and multi-select drags of tasks and groups, and
//! for group resizes.
//!
//! ## Drag stop
//!
//! Within one drag stop the order is fixed:
//!
//! 1. capture old bounds and compute the rigid-body delta of the gesture
//! 2. decide new parents (tasks first, then groups, against final bounds)
//! 3. coordinate handover in the render layer
//! 4. persist through the position authority, the store and the remote writer
//! 5. refresh derived task counts and inherited task properties
//! 6. restore the pre-drag selection
//!
//! Every node in the dragged set moves by the same delta. Nodes carried by a
//! dragged ancestor group keep their parent, as do all undragged descendants of
//! a dragged group, which are persisted at their new absolute positions.
//!
//! Persisting is best effort: a failure for one node is reported in
//! [`DragOutcome::errors`] and the rest of the batch is still applied.
//!
//! ## Settling
//!
//! Locks taken at drag start are held through the settling window so the sync
//! projector cannot overwrite the just-committed positions with a stale read. A
//! drag start during settling cancels the timer and starts the new gesture.

mod state;

pub use state::{DragNode, DragOutcome, DragPhase, Reparent};

use state::{CascadedNode, DragSession, DraggedNode, SettleTimer};

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use taskcanvas_core::{
    CanvasEvent, DragEvent, Error, EventBus, GeometryError, NodeId, NodeType, StoreError,
    WriteSource,
};
use taskcanvas_settings::{CanvasConfig, DragSettings};
use tokio::sync::watch;

use crate::containment::{ContainmentResolver, ContainmentRule, GroupIndex};
use crate::geometry::{to_absolute, Bounds, Point};
use crate::handover::CoordinateHandover;
use crate::metadata::{
    affected_groups, inherited_patch, task_counts, DateKeywordResolver, KeywordDates,
};
use crate::model::Group;
use crate::position::PositionManager;
use crate::remote::RemoteWriter;
use crate::render::{NodeData, RenderLayer};
use crate::selection::SelectionManager;
use crate::store::{BoardReader, BoardWriter, GroupPatch, TaskPatch};

const DRAG: WriteSource = WriteSource::UserDrag;

/// The collaborators a gesture reads and writes.
pub struct DragContext<'a> {
    pub board: &'a mut dyn BoardWriter,
    pub layer: &'a mut dyn RenderLayer,
    pub selection: &'a mut SelectionManager,
}

impl<'a> DragContext<'a> {
    pub fn new(
        board: &'a mut dyn BoardWriter,
        layer: &'a mut dyn RenderLayer,
        selection: &'a mut SelectionManager,
    ) -> Self {
        Self {
            board,
            layer,
            selection,
        }
    }
}

/// Final placement of one node in a commit.
#[derive(Debug, Clone)]
struct Placement {
    id: NodeId,
    node_type: NodeType,
    position: Point,
    size: (f64, f64),
    old_parent: Option<NodeId>,
    parent: Option<NodeId>,
    /// Whether parentage was decided in this commit (handover required).
    evaluated: bool,
}

impl Placement {
    fn bounds(&self) -> Bounds {
        Bounds::from_origin(self.position, self.size.0, self.size.1)
    }

    fn dragged(node: &DraggedNode, delta: Point) -> Self {
        Self {
            id: node.id.clone(),
            node_type: node.node_type,
            position: node.start + delta,
            size: (node.width, node.height),
            old_parent: node.old_parent.clone(),
            parent: node.old_parent.clone(),
            evaluated: !node.carried,
        }
    }

    fn cascaded(node: &CascadedNode, delta: Point) -> Self {
        Self {
            id: node.id.clone(),
            node_type: node.node_type,
            position: node.start + delta,
            size: (node.width, node.height),
            old_parent: node.parent.clone(),
            parent: node.parent.clone(),
            evaluated: false,
        }
    }
}

/// Drag and resize state machine for one canvas session.
pub struct DragOrchestrator {
    positions: Arc<PositionManager>,
    bus: Arc<EventBus>,
    remote: Option<Arc<RemoteWriter>>,
    resolver: ContainmentResolver,
    handover: CoordinateHandover,
    dates: Box<dyn DateKeywordResolver>,
    settings: DragSettings,
    task_size: (f64, f64),
    max_depth: usize,
    phase: Arc<watch::Sender<DragPhase>>,
    session: Option<DragSession>,
    settling: Vec<NodeId>,
    timer: SettleTimer,
}

impl DragOrchestrator {
    pub fn new(positions: Arc<PositionManager>, bus: Arc<EventBus>, config: &CanvasConfig) -> Self {
        let (phase, _) = watch::channel(DragPhase::Idle);
        Self {
            positions,
            bus,
            remote: None,
            resolver: ContainmentResolver::new(config.containment.clone()),
            handover: CoordinateHandover::from_config(config),
            dates: Box::new(KeywordDates::new(chrono::Local::now().date_naive())),
            settings: config.drag.clone(),
            task_size: (config.geometry.task_width, config.geometry.task_height),
            max_depth: config.containment.max_ancestor_depth,
            phase: Arc::new(phase),
            session: None,
            settling: Vec::new(),
            timer: SettleTimer::default(),
        }
    }

    /// Persists committed positions remotely as well.
    pub fn with_remote(mut self, remote: Arc<RemoteWriter>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn with_date_resolver(mut self, dates: Box<dyn DateKeywordResolver>) -> Self {
        self.dates = dates;
        self
    }

    pub fn phase(&self) -> DragPhase {
        *self.phase.borrow()
    }

    pub fn phase_receiver(&self) -> watch::Receiver<DragPhase> {
        self.phase.subscribe()
    }

    pub fn is_dragging(&self) -> bool {
        self.session.is_some()
    }

    /// Resolves once the orchestrator is idle.
    pub async fn wait_settled(&self) {
        let mut receiver = self.phase.subscribe();
        let _ = receiver.wait_for(|phase| *phase == DragPhase::Idle).await;
    }

    /// Handles a drag-start event.
    ///
    /// # Arguments
    ///
    /// * `primary` - The node under the pointer
    /// * `dragged` - Every node in the dragged set; `primary` is added if missing
    pub fn on_drag_start(
        &mut self,
        ctx: &mut DragContext<'_>,
        primary: &DragNode,
        dragged: &[DragNode],
    ) {
        self.interrupt_settling();
        if let Some(previous) = self.session.take() {
            tracing::warn!(
                "Drag start while {} was still dragging; abandoning that gesture",
                previous.primary
            );
            self.abandon(&mut *ctx.layer, previous);
        }
        self.set_phase(DragPhase::DragStarting);

        let mut reported: Vec<&DragNode> = Vec::with_capacity(dragged.len() + 1);
        if !dragged.iter().any(|node| node.id == primary.id) {
            reported.push(primary);
        }
        reported.extend(dragged.iter());

        let board = ctx.board.reader();
        let index = GroupIndex::from_reader(board);
        let dragged_groups: HashSet<&NodeId> = reported
            .iter()
            .filter(|node| node.node_type == NodeType::Group)
            .map(|node| &node.id)
            .collect();

        let mut nodes = Vec::with_capacity(reported.len());
        let mut last_good = HashMap::new();
        for node in &reported {
            let start = match self.reported_absolute(board, &*ctx.layer, node) {
                Some(start) => start,
                None => {
                    tracing::warn!(
                        "Non-finite start position for {}; recovering from store",
                        node.id
                    );
                    self.recover_absolute(board, &node.id)
                }
            };
            let old_parent = board
                .node(&node.id)
                .map(|stored| stored.parent_id().cloned())
                .unwrap_or_else(|| node.parent_id.clone());
            let carried = old_parent.as_ref().is_some_and(|parent| {
                dragged_groups.contains(parent)
                    || index
                        .ancestors(parent, self.max_depth)
                        .iter()
                        .any(|ancestor| dragged_groups.contains(ancestor))
            });
            let (width, height) = match node.node_type {
                NodeType::Task => self.task_size,
                NodeType::Group => board
                    .group(&node.id)
                    .map(|group| (group.width, group.height))
                    .unwrap_or((node.width, node.height)),
            };

            let display = node
                .position
                .finite()
                .or_else(|| ctx.layer.node(&node.id).map(|n| n.position).and_then(Point::finite))
                .unwrap_or(start);
            last_good.insert(node.id.clone(), display);

            nodes.push(DraggedNode {
                id: node.id.clone(),
                node_type: node.node_type,
                start,
                width,
                height,
                old_parent,
                carried,
            });
        }

        let cascaded = self.collect_cascade(board, &index, &nodes);

        let mut locked = Vec::with_capacity(nodes.len() + cascaded.len());
        let ids = nodes.iter().map(|n| &n.id).chain(cascaded.iter().map(|n| &n.id));
        for id in ids {
            if self.positions.acquire_lock(id, DRAG) {
                locked.push(id.clone());
            } else {
                tracing::warn!("Could not lock {} for drag", id);
            }
        }

        let mut elevated = Vec::new();
        for node in nodes.iter().filter(|n| n.node_type == NodeType::Group) {
            if let Some(render) = ctx.layer.node_mut(&node.id) {
                elevated.push((node.id.clone(), render.z_index));
                render.z_index = self.settings.elevated_z_index;
            }
        }

        tracing::info!(
            "Drag started on {}: {} nodes, {} cascaded",
            primary.id,
            nodes.len(),
            cascaded.len()
        );
        let node_ids = nodes.iter().map(|n| n.id.clone()).collect();
        self.session = Some(DragSession {
            primary: primary.id.clone(),
            nodes,
            cascaded,
            locked,
            elevated,
            selection: ctx.selection.snapshot(),
            last_good,
        });
        self.publish(DragEvent::Started { node_ids });
        self.set_phase(DragPhase::Dragging);
    }

    /// Handles a drag-move event.
    ///
    /// Only guards against non-finite positions: the node is reverted to its last
    /// good display position, which is returned.
    pub fn on_drag(&mut self, layer: &mut dyn RenderLayer, node: &DragNode) -> Option<Point> {
        let session = self.session.as_mut()?;
        if let Some(position) = node.position.finite() {
            session.last_good.insert(node.id.clone(), position);
            return Some(position);
        }

        let fallback = session.last_good.get(&node.id).copied()?;
        tracing::warn!(
            "Non-finite drag position for {}; reverting to ({:.1}, {:.1})",
            node.id,
            fallback.x,
            fallback.y
        );
        if let Some(render) = layer.node_mut(&node.id) {
            render.position = fallback;
        }
        Some(fallback)
    }

    /// Handles a drag-stop event and commits the gesture.
    pub async fn on_drag_stop(
        &mut self,
        ctx: &mut DragContext<'_>,
        primary: &DragNode,
        dragged: &[DragNode],
    ) -> DragOutcome {
        let Some(session) = self.session.take() else {
            tracing::warn!("Drag stop for {} without a drag start; ignoring", primary.id);
            return DragOutcome::default();
        };

        let delta = self.gesture_delta(ctx, &session, primary, dragged);
        let moved = delta.x.abs() > f64::EPSILON || delta.y.abs() > f64::EPSILON;

        let old_index = GroupIndex::from_reader(ctx.board.reader());
        let mut index = old_index.clone();

        let mut placements: Vec<Placement> = session
            .nodes
            .iter()
            .filter(|n| n.node_type == NodeType::Task)
            .chain(session.nodes.iter().filter(|n| n.node_type == NodeType::Group))
            .map(|n| Placement::dragged(n, delta))
            .chain(session.cascaded.iter().map(|n| Placement::cascaded(n, delta)))
            .collect();

        // Moving groups take their final bounds before any parent decision.
        for placement in placements.iter().filter(|p| p.node_type == NodeType::Group) {
            index.set_bounds(&placement.id, placement.bounds());
        }

        for placement in placements
            .iter_mut()
            .filter(|p| p.evaluated && p.node_type == NodeType::Task)
        {
            placement.parent = self.resolver.task_parent(&placement.bounds(), &index);
        }

        for placement in placements
            .iter_mut()
            .filter(|p| p.evaluated && p.node_type == NodeType::Group)
        {
            if !moved {
                continue;
            }
            let new_bounds = placement.bounds();
            let parent = self
                .resolver
                .select_group_parent(&placement.id, &new_bounds, &index);
            if parent != placement.old_parent {
                tracing::debug!(
                    "Group {} parent {:?} -> {:?}",
                    placement.id,
                    placement.old_parent,
                    parent
                );
            }
            index.set_parent(&placement.id, parent.clone());
            placement.parent = parent;
        }

        let mut outcome = self.commit(ctx, placements, &old_index).await;

        for (id, z_index) in &session.elevated {
            if let Some(render) = ctx.layer.node_mut(id) {
                render.z_index = *z_index;
            }
        }
        ctx.selection.restore(session.selection);

        self.enter_settling(session.locked);
        tracing::info!(
            "Drag committed: {} moved, {} reparented, {} failed",
            outcome.moved.len(),
            outcome.reparented.len(),
            outcome.errors.len()
        );
        self.publish(DragEvent::Committed {
            moved: outcome.moved.len(),
            reparented: outcome.reparented.len(),
            failed: outcome.errors.len(),
        });
        outcome
    }

    /// Resizes a group and repairs containment around it.
    ///
    /// The group's own parent is re-evaluated, and children it no longer
    /// contains are moved to root level at their current absolute positions.
    pub async fn resize_group(
        &mut self,
        ctx: &mut DragContext<'_>,
        id: &NodeId,
        bounds: Bounds,
    ) -> DragOutcome {
        let mut outcome = DragOutcome::default();
        let (width, height) = (bounds.width(), bounds.height());
        let valid = bounds.origin().is_finite()
            && width.is_finite()
            && height.is_finite()
            && width > 0.0
            && height > 0.0;
        if !valid {
            let err: Error = GeometryError::DegenerateSize {
                id: id.clone(),
                width,
                height,
            }
            .into();
            tracing::warn!("Rejected resize: {}", err);
            outcome.errors.push(err.into_operation_error("resize-group"));
            return outcome;
        }
        let Some(group) = ctx.board.group(id).cloned() else {
            let err: Error = StoreError::GroupNotFound { id: id.clone() }.into();
            outcome.errors.push(err.into_operation_error("resize-group"));
            return outcome;
        };

        self.interrupt_settling();
        let old_index = GroupIndex::from_reader(ctx.board.reader());
        let mut index = old_index.clone();
        index.set_bounds(id, bounds);
        let parent = self.resolver.select_group_parent(id, &bounds, &index);
        index.set_parent(id, parent.clone());

        if let Some(render) = ctx.layer.node_mut(id) {
            render.width = width;
            render.height = height;
        }

        let mut placements = vec![Placement {
            id: id.clone(),
            node_type: NodeType::Group,
            position: bounds.origin(),
            size: (width, height),
            old_parent: group.parent_group_id.clone(),
            parent,
            evaluated: true,
        }];

        // Children that stay keep their absolute position; a moved origin
        // changes their offset inside the group.
        let origin_moved = !bounds.origin().approx_eq(&group.position, 1e-9);
        let mut kept: Vec<(NodeId, Point)> = Vec::new();

        let rule = self.resolver.group_rule();
        for child in index.children_of(id) {
            if rule.matches(&child.bounds, &bounds) {
                kept.push((child.id.clone(), child.bounds.origin()));
            } else {
                tracing::warn!("Group {} no longer inside {}; clearing parent", child.id, id);
                placements.push(Placement {
                    id: child.id.clone(),
                    node_type: NodeType::Group,
                    position: child.bounds.origin(),
                    size: (child.bounds.width(), child.bounds.height()),
                    old_parent: Some(id.clone()),
                    parent: None,
                    evaluated: true,
                });
            }
        }
        for task in ctx.board.tasks() {
            if task.parent_id.as_ref() != Some(id) {
                continue;
            }
            let Some(position) = task.canvas_position.and_then(Point::finite) else {
                continue;
            };
            let task_bounds = Bounds::from_origin(position, self.task_size.0, self.task_size.1);
            if ContainmentRule::Center.matches(&task_bounds, &bounds) {
                kept.push((task.id.clone(), position));
            } else {
                tracing::warn!("Task {} no longer inside {}; clearing parent", task.id, id);
                placements.push(Placement {
                    id: task.id.clone(),
                    node_type: NodeType::Task,
                    position,
                    size: self.task_size,
                    old_parent: Some(id.clone()),
                    parent: None,
                    evaluated: true,
                });
            }
        }

        let mut locked = Vec::with_capacity(placements.len());
        for placement in &placements {
            if self.positions.acquire_lock(&placement.id, DRAG) {
                locked.push(placement.id.clone());
            }
        }

        let outcome = self.commit(ctx, placements, &old_index).await;
        if origin_moved && !kept.is_empty() {
            for (child, absolute) in &kept {
                self.handover.attach(
                    &mut *ctx.layer,
                    Some(ctx.board.reader()),
                    child,
                    id,
                    Some(*absolute),
                );
            }
            let children: Vec<NodeId> = kept.into_iter().map(|(child, _)| child).collect();
            ctx.layer.refresh_parent_links(&children);
        }
        self.enter_settling(locked);
        tracing::info!(
            "Resized {} to {:.0}x{:.0}: {} reparented",
            id,
            width,
            height,
            outcome.reparented.len()
        );
        self.publish(DragEvent::Committed {
            moved: outcome.moved.len(),
            reparented: outcome.reparented.len(),
            failed: outcome.errors.len(),
        });
        outcome
    }

    /// Cancels any pending timer and releases every lock this orchestrator holds.
    pub fn shutdown(&mut self, layer: &mut dyn RenderLayer) {
        self.interrupt_settling();
        if let Some(session) = self.session.take() {
            self.abandon(layer, session);
        }
        self.set_phase(DragPhase::Idle);
    }

    /// Handover, persistence and derived metadata for a set of placements.
    async fn commit(
        &mut self,
        ctx: &mut DragContext<'_>,
        placements: Vec<Placement>,
        old_index: &GroupIndex,
    ) -> DragOutcome {
        let mut outcome = DragOutcome::default();

        for placement in &placements {
            if let Some(render) = ctx.layer.node_mut(&placement.id) {
                render.absolute = Some(placement.position);
            }
        }

        let mut relinked = Vec::new();
        for placement in placements.iter().filter(|p| p.evaluated) {
            let result = match &placement.parent {
                Some(parent) => self.handover.attach(
                    &mut *ctx.layer,
                    Some(ctx.board.reader()),
                    &placement.id,
                    parent,
                    Some(placement.position),
                ),
                None => self.handover.detach(
                    &mut *ctx.layer,
                    Some(ctx.board.reader()),
                    &placement.id,
                    Some(placement.position),
                ),
            };
            if !result.success {
                tracing::debug!("{} is not rendered; skipping handover", placement.id);
            }
            if placement.parent != placement.old_parent {
                tracing::info!(
                    "{} reparented: {:?} -> {:?}",
                    placement.id,
                    placement.old_parent,
                    placement.parent
                );
                outcome.reparented.push(Reparent {
                    id: placement.id.clone(),
                    from: placement.old_parent.clone(),
                    to: placement.parent.clone(),
                });
                relinked.push(placement.id.clone());
            }
        }
        ctx.layer.refresh_parent_links(&relinked);

        for placement in &placements {
            match self.persist(&mut *ctx.board, placement).await {
                Ok(()) => outcome.moved.push(placement.id.clone()),
                Err(err) => {
                    tracing::warn!("Failed to persist position of {}: {}", placement.id, err);
                    outcome.errors.push(err.into_operation_error("persist-position"));
                }
            }
        }

        let new_index = GroupIndex::from_reader(ctx.board.reader());
        let mut affected = BTreeSet::new();
        for change in &outcome.reparented {
            affected.extend(affected_groups(old_index, change.from.as_ref(), None, self.max_depth));
            affected.extend(affected_groups(&new_index, None, change.to.as_ref(), self.max_depth));
        }

        let landed: Vec<(NodeId, NodeId)> = outcome
            .reparented
            .iter()
            .filter(|change| ctx.board.task(&change.id).is_some())
            .filter_map(|change| change.to.clone().map(|to| (change.id.clone(), to)))
            .collect();
        for (task_id, parent) in landed {
            if let Err(err) = self.inherit(&mut *ctx.board, &new_index, &task_id, &parent) {
                tracing::warn!("Failed to apply inherited properties to {}: {}", task_id, err);
                outcome.errors.push(err.into_operation_error("inherit-properties"));
            }
        }

        if !affected.is_empty() {
            let counts = task_counts(ctx.board.reader(), self.max_depth);
            for id in affected {
                let count = counts.get(&id).copied().unwrap_or(0);
                if let Some(render) = ctx.layer.node_mut(&id) {
                    if let NodeData::Group { task_count, .. } = &mut render.data {
                        *task_count = count;
                    }
                }
                outcome.task_counts.insert(id, count);
            }
        }

        outcome
    }

    async fn persist(
        &self,
        board: &mut dyn BoardWriter,
        placement: &Placement,
    ) -> taskcanvas_core::Result<()> {
        let id = &placement.id;
        if !self
            .positions
            .update(id, placement.position, placement.parent.clone(), DRAG)
        {
            return Err(Error::other(format!(
                "position authority rejected the update for {}",
                id
            )));
        }

        match placement.node_type {
            NodeType::Task => board.update_task(
                id,
                TaskPatch::placement(placement.position, placement.parent.clone()),
                DRAG,
            )?,
            NodeType::Group => board.update_group(
                id,
                GroupPatch {
                    position: Some(placement.position),
                    size: Some(placement.size),
                    parent_group_id: Some(placement.parent.clone()),
                },
                DRAG,
            )?,
        }

        if let Some(remote) = &self.remote {
            match placement.node_type {
                NodeType::Task => {
                    remote
                        .write_task(id, placement.position, placement.parent.clone())
                        .await?
                }
                NodeType::Group => {
                    remote
                        .write_group(id, placement.bounds(), placement.parent.clone())
                        .await?
                }
            };
        }
        Ok(())
    }

    /// Applies properties inherited from `parent`'s chain to a dropped task.
    fn inherit(
        &self,
        board: &mut dyn BoardWriter,
        index: &GroupIndex,
        task_id: &NodeId,
        parent: &NodeId,
    ) -> taskcanvas_core::Result<()> {
        let mut chain: Vec<NodeId> = index.ancestors(parent, self.max_depth).into_iter().collect();
        chain.reverse();
        chain.push(parent.clone());

        let groups: Vec<Group> = chain
            .iter()
            .filter_map(|id| board.group(id).cloned())
            .collect();
        let refs: Vec<&Group> = groups.iter().collect();
        let patch = inherited_patch(&refs, self.dates.as_ref());
        if patch.is_empty() {
            return Ok(());
        }
        tracing::debug!("Inheriting properties for {} from {} groups", task_id, refs.len());
        board.update_task(task_id, patch, DRAG)?;
        Ok(())
    }

    /// Delta shared by the whole dragged set.
    fn gesture_delta(
        &self,
        ctx: &DragContext<'_>,
        session: &DragSession,
        primary: &DragNode,
        dragged: &[DragNode],
    ) -> Point {
        let anchor = session
            .node(&primary.id)
            .filter(|node| !node.carried)
            .or_else(|| session.nodes.iter().find(|node| !node.carried));
        let Some(anchor) = anchor else {
            return Point::zero();
        };

        let reported = if anchor.id == primary.id {
            Some(primary)
        } else {
            dragged.iter().find(|node| node.id == anchor.id)
        };
        let Some(reported) = reported else {
            tracing::warn!("Drop position of {} not reported; keeping start", anchor.id);
            return Point::zero();
        };

        let reported = match (reported.position.finite(), session.last_good.get(&anchor.id)) {
            (None, Some(good)) => {
                tracing::warn!("Non-finite drop position for {}; using last good", anchor.id);
                reported.moved_to(*good)
            }
            _ => reported.clone(),
        };

        match self.reported_absolute(ctx.board.reader(), &*ctx.layer, &reported) {
            Some(end) => (end - anchor.start).finite().unwrap_or_default(),
            None => Point::zero(),
        }
    }

    /// Absolute position implied by a render-layer report.
    fn reported_absolute(
        &self,
        board: &dyn BoardReader,
        layer: &dyn RenderLayer,
        node: &DragNode,
    ) -> Option<Point> {
        let position = node.position.finite()?;
        match &node.parent_id {
            None => Some(position),
            Some(parent) => self
                .handover
                .resolve_absolute(parent, None, layer, Some(board))
                .map(|parent_abs| to_absolute(position, parent_abs, self.handover.border_inset())),
        }
    }

    /// Store value, then the position authority, then the origin.
    fn recover_absolute(&self, board: &dyn BoardReader, id: &NodeId) -> Point {
        board
            .node(id)
            .and_then(|node| node.absolute_position())
            .and_then(Point::finite)
            .or_else(|| self.positions.get_position(id).map(|r| r.absolute_position))
            .unwrap_or_default()
    }

    /// Undragged descendants of dragged groups.
    fn collect_cascade(
        &self,
        board: &dyn BoardReader,
        index: &GroupIndex,
        nodes: &[DraggedNode],
    ) -> Vec<CascadedNode> {
        let in_set: HashSet<&NodeId> = nodes.iter().map(|n| &n.id).collect();
        let mut seen: HashSet<NodeId> = HashSet::new();
        let mut cascaded = Vec::new();

        for group in nodes
            .iter()
            .filter(|n| n.node_type == NodeType::Group && !n.carried)
        {
            let mut family: HashSet<NodeId> = HashSet::new();
            family.insert(group.id.clone());
            for descendant in index.descendants(&group.id) {
                family.insert(descendant.clone());
                if in_set.contains(&descendant) || !seen.insert(descendant.clone()) {
                    continue;
                }
                if let Some(rect) = index.get(&descendant) {
                    cascaded.push(CascadedNode {
                        id: descendant.clone(),
                        node_type: NodeType::Group,
                        start: rect.bounds.origin(),
                        width: rect.bounds.width(),
                        height: rect.bounds.height(),
                        parent: rect.parent_id.clone(),
                    });
                }
            }

            for task in board.tasks() {
                let Some(parent) = &task.parent_id else {
                    continue;
                };
                if !family.contains(parent) || in_set.contains(&task.id) {
                    continue;
                }
                let Some(start) = task.canvas_position.and_then(Point::finite) else {
                    continue;
                };
                if seen.insert(task.id.clone()) {
                    cascaded.push(CascadedNode {
                        id: task.id.clone(),
                        node_type: NodeType::Task,
                        start,
                        width: self.task_size.0,
                        height: self.task_size.1,
                        parent: Some(parent.clone()),
                    });
                }
            }
        }
        cascaded
    }

    fn interrupt_settling(&mut self) {
        let cancelled = self.timer.cancel();
        if cancelled {
            tracing::debug!("Settling interrupted by a new gesture");
        }
        for id in self.settling.drain(..) {
            self.positions.release_lock_held_by(&id, DRAG);
        }
    }

    fn enter_settling(&mut self, locked: Vec<NodeId>) {
        self.settling = locked.clone();
        self.set_phase(DragPhase::Settling);

        let phase = Arc::clone(&self.phase);
        let positions = Arc::clone(&self.positions);
        let bus = Arc::clone(&self.bus);
        self.timer.start(self.settings.settle_duration(), move || {
            let expired = phase.send_if_modified(|current| {
                if *current == DragPhase::Settling {
                    *current = DragPhase::Idle;
                    true
                } else {
                    false
                }
            });
            if !expired {
                return;
            }
            for id in &locked {
                positions.release_lock_held_by(id, DRAG);
            }
            tracing::debug!("Settled; released {} locks", locked.len());
            let _ = bus.publish(CanvasEvent::Drag(DragEvent::Settled));
        });
    }

    fn abandon(&mut self, layer: &mut dyn RenderLayer, session: DragSession) {
        for (id, z_index) in &session.elevated {
            if let Some(render) = layer.node_mut(id) {
                render.z_index = *z_index;
            }
        }
        for id in &session.locked {
            self.positions.release_lock_held_by(id, DRAG);
        }
    }

    fn set_phase(&self, phase: DragPhase) {
        let previous = self.phase.send_replace(phase);
        if previous != phase {
            tracing::trace!("Drag phase {:?} -> {:?}", previous, phase);
        }
    }

    fn publish(&self, event: DragEvent) {
        let _ = self.bus.publish(CanvasEvent::Drag(event));
    }
}

impl std::fmt::Debug for DragOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DragOrchestrator")
            .field("phase", &self.phase())
            .field("dragging", &self.session.is_some())
            .field("settling_locks", &self.settling.len())
            .finish()
    }
}
