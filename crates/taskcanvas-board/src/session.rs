//! Canvas session.
//!
//! Owns one board, one render layer and the services that arbitrate between
//! them. The position authority and event bus are created per session and
//! cleared on [`teardown`](CanvasSession::teardown).

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use taskcanvas_core::{
    thread_safe, Error, EventBus, NodeId, NodeType, OperationError, PositionPayload, StoreError,
    SubscriptionId, ThreadSafe, WriteSource,
};
use taskcanvas_settings::CanvasConfig;
use tokio::sync::watch;

use crate::align::{AlignOutcome, AlignTool, Alignment, Axis};
use crate::containment::{ContainmentResolver, GroupIndex};
use crate::drag::{DragContext, DragNode, DragOrchestrator, DragOutcome, DragPhase};
use crate::geometry::{to_relative, Bounds, Point};
use crate::handover::CoordinateHandover;
use crate::metadata::DateKeywordResolver;
use crate::position::PositionManager;
use crate::remote::RemoteWriter;
use crate::render::{RenderGraph, RenderLayer};
use crate::selection::SelectionManager;
use crate::store::{BoardSnapshot, BoardWriter, GroupPatch, MemoryBoard, TaskPatch};
use crate::sync::{ProjectionFilter, ProjectionReport, SyncProjector};

type PendingPositions = ThreadSafe<Vec<(NodeId, PositionPayload)>>;

/// Result of [`CanvasSession::delete_group`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOutcome {
    /// Former children now at root level.
    pub rerooted: Vec<NodeId>,
    pub errors: Vec<OperationError>,
}

/// One open canvas.
pub struct CanvasSession<B = MemoryBoard, L = RenderGraph> {
    config: CanvasConfig,
    bus: Arc<EventBus>,
    positions: Arc<PositionManager>,
    board: B,
    layer: L,
    selection: SelectionManager,
    drag: DragOrchestrator,
    projector: SyncProjector,
    align: AlignTool,
    resolver: ContainmentResolver,
    handover: CoordinateHandover,
    remote: Option<Arc<RemoteWriter>>,
    pending: PendingPositions,
    subscription: Option<SubscriptionId>,
}

impl CanvasSession<MemoryBoard, RenderGraph> {
    /// Session over an in-memory board and render graph.
    pub fn in_memory(config: CanvasConfig, snapshot: BoardSnapshot) -> Self {
        let layer = RenderGraph::new(config.geometry.border_inset);
        Self::new(config, MemoryBoard::from_snapshot(snapshot), layer)
    }
}

impl<B: BoardWriter, L: RenderLayer> CanvasSession<B, L> {
    pub fn new(config: CanvasConfig, board: B, layer: L) -> Self {
        let bus = Arc::new(EventBus::new());
        let positions = Arc::new(PositionManager::new(Arc::clone(&bus), &config));

        // Programmatic and reconcile writes reach the layer through the
        // authority; drags and syncs update it themselves.
        let pending: PendingPositions = thread_safe(Vec::new());
        let queue = Arc::clone(&pending);
        let subscription = positions.subscribe(move |id, payload| {
            if matches!(
                payload.source,
                WriteSource::Programmatic | WriteSource::Reconcile
            ) {
                queue.lock().push((id.clone(), payload.clone()));
            }
        });

        tracing::info!("Canvas session opened");
        Self {
            drag: DragOrchestrator::new(Arc::clone(&positions), Arc::clone(&bus), &config),
            projector: SyncProjector::new(Arc::clone(&positions), Arc::clone(&bus), &config),
            align: AlignTool::new(Arc::clone(&positions), &config),
            resolver: ContainmentResolver::new(config.containment.clone()),
            handover: CoordinateHandover::from_config(&config),
            selection: SelectionManager::new(),
            remote: None,
            pending,
            subscription: Some(subscription),
            config,
            bus,
            positions,
            board,
            layer,
        }
    }

    /// Persists every committed position through `remote` as well.
    pub fn with_remote(mut self, remote: Arc<RemoteWriter>) -> Self {
        self.drag = self.drag.with_remote(Arc::clone(&remote));
        self.align = self.align.with_remote(Arc::clone(&remote));
        self.remote = Some(remote);
        self
    }

    pub fn with_date_resolver(mut self, dates: Box<dyn DateKeywordResolver>) -> Self {
        self.drag = self.drag.with_date_resolver(dates);
        self
    }

    pub fn config(&self) -> &CanvasConfig {
        &self.config
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn positions(&self) -> &Arc<PositionManager> {
        &self.positions
    }

    pub fn board(&self) -> &B {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut B {
        &mut self.board
    }

    pub fn layer(&self) -> &L {
        &self.layer
    }

    pub fn layer_mut(&mut self) -> &mut L {
        &mut self.layer
    }

    pub fn selection(&self) -> &SelectionManager {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut SelectionManager {
        &mut self.selection
    }

    pub fn drag_phase(&self) -> DragPhase {
        self.drag.phase()
    }

    pub fn phase_receiver(&self) -> watch::Receiver<DragPhase> {
        self.drag.phase_receiver()
    }

    /// Resolves once no gesture is active or settling.
    pub async fn wait_settled(&self) {
        self.drag.wait_settled().await;
    }

    /// Runs one projection pass of the board into the layer.
    pub fn sync(&mut self) -> ProjectionReport {
        self.projector.project(self.board.reader(), &mut self.layer)
    }

    /// Replaces the projection filter, re-projecting when it changed.
    pub fn set_filter(&mut self, filter: ProjectionFilter) -> Option<ProjectionReport> {
        if self.projector.set_filter(filter) {
            Some(self.sync())
        } else {
            None
        }
    }

    pub fn drag_start(&mut self, primary: &DragNode, dragged: &[DragNode]) {
        let mut ctx = DragContext::new(&mut self.board, &mut self.layer, &mut self.selection);
        self.drag.on_drag_start(&mut ctx, primary, dragged);
    }

    pub fn drag_move(&mut self, node: &DragNode) -> Option<Point> {
        self.drag.on_drag(&mut self.layer, node)
    }

    pub async fn drag_stop(&mut self, primary: &DragNode, dragged: &[DragNode]) -> DragOutcome {
        let mut ctx = DragContext::new(&mut self.board, &mut self.layer, &mut self.selection);
        self.drag.on_drag_stop(&mut ctx, primary, dragged).await
    }

    pub async fn resize_group(&mut self, id: &NodeId, bounds: Bounds) -> DragOutcome {
        let mut ctx = DragContext::new(&mut self.board, &mut self.layer, &mut self.selection);
        self.drag.resize_group(&mut ctx, id, bounds).await
    }

    pub async fn align(&mut self, ids: &[NodeId], alignment: Alignment) -> AlignOutcome {
        let outcome = self.align.align(&mut self.board, ids, alignment).await;
        self.flush_position_updates();
        outcome
    }

    pub async fn distribute(&mut self, ids: &[NodeId], axis: Axis) -> AlignOutcome {
        let outcome = self.align.distribute(&mut self.board, ids, axis).await;
        self.flush_position_updates();
        outcome
    }

    /// Applies a position read from the remote store.
    ///
    /// The store is only written when the position authority accepts the
    /// update; a locked node keeps its committed position.
    ///
    /// # Returns
    ///
    /// `Ok(true)` if accepted, `Ok(false)` if rejected by arbitration.
    pub fn apply_remote_position(
        &mut self,
        id: &NodeId,
        position: Point,
        parent_id: Option<NodeId>,
    ) -> Result<bool, OperationError> {
        if self.projector.is_recently_deleted(id) {
            tracing::debug!("Ignoring remote position for deleted {}", id);
            return Ok(false);
        }
        let node_type = if self.board.group(id).is_some() {
            NodeType::Group
        } else if self.board.task(id).is_some() {
            NodeType::Task
        } else {
            let err: Error = StoreError::TaskNotFound { id: id.clone() }.into();
            return Err(err.into_operation_error("apply-remote-position"));
        };

        if !self
            .positions
            .update(id, position, parent_id.clone(), WriteSource::RemoteSync)
        {
            return Ok(false);
        }

        let result = match node_type {
            NodeType::Task => self.board.update_task(
                id,
                TaskPatch::placement(position, parent_id),
                WriteSource::RemoteSync,
            ),
            NodeType::Group => self.board.update_group(
                id,
                GroupPatch::placement(position, parent_id),
                WriteSource::RemoteSync,
            ),
        };
        result
            .map(|()| true)
            .map_err(|err| Error::from(err).into_operation_error("apply-remote-position"))
    }

    /// Deletes a group and moves its children to root level.
    ///
    /// Children keep their absolute positions. The id is put on the deleted
    /// deny-list so a delayed sync cannot bring the group back.
    pub async fn delete_group(&mut self, id: &NodeId) -> DeleteOutcome {
        let mut outcome = DeleteOutcome::default();
        if self.board.group(id).is_none() {
            let err: Error = StoreError::GroupNotFound { id: id.clone() }.into();
            outcome.errors.push(err.into_operation_error("delete-group"));
            return outcome;
        }

        let children: Vec<(NodeId, NodeType, Option<Point>, (f64, f64))> = self
            .board
            .groups()
            .into_iter()
            .filter(|g| g.parent_group_id.as_ref() == Some(id))
            .map(|g| (g.id.clone(), NodeType::Group, Some(g.position), (g.width, g.height)))
            .chain(
                self.board
                    .tasks()
                    .into_iter()
                    .filter(|t| t.parent_id.as_ref() == Some(id))
                    .map(|t| (t.id.clone(), NodeType::Task, t.canvas_position, (0.0, 0.0))),
            )
            .collect();

        for (child, node_type, position, size) in children {
            match self.reroot(&child, node_type, position, size).await {
                Ok(()) => outcome.rerooted.push(child),
                Err(err) => {
                    tracing::warn!("Failed to re-root {}: {}", child, err);
                    outcome.errors.push(err.into_operation_error("delete-group"));
                }
            }
        }

        self.board.remove_group(id);
        self.positions.remove(id);
        self.projector.mark_deleted(id.clone());
        self.selection.remove(id);
        if let Some(remote) = &self.remote {
            remote.forget(id);
        }
        tracing::info!(
            "Deleted group {}; {} children moved to root",
            id,
            outcome.rerooted.len()
        );

        self.flush_position_updates();
        self.sync();
        outcome
    }

    /// Clears parent links of groups their parent no longer contains.
    ///
    /// # Returns
    ///
    /// The ids that were moved to root level.
    pub async fn repair_stale_containment(&mut self) -> (Vec<NodeId>, Vec<OperationError>) {
        let index = GroupIndex::from_reader(self.board.reader());
        let stale = self.resolver.find_stale_groups(&index);
        let mut repaired = Vec::new();
        let mut errors = Vec::new();

        for id in stale {
            let Some(rect) = index.get(&id) else {
                continue;
            };
            tracing::warn!("Group {} is outside its parent {:?}; clearing", id, rect.parent_id);
            let size = (rect.bounds.width(), rect.bounds.height());
            match self
                .reroot(&id, NodeType::Group, Some(rect.bounds.origin()), size)
                .await
            {
                Ok(()) => repaired.push(id),
                Err(err) => errors.push(err.into_operation_error("repair-containment")),
            }
        }
        self.flush_position_updates();
        (repaired, errors)
    }

    /// Pushes queued programmatic and reconcile positions into the layer.
    ///
    /// Absolute caches are updated first so children of moved groups get their
    /// display offsets from the new parent position.
    pub fn flush_position_updates(&mut self) -> usize {
        let pending: Vec<(NodeId, PositionPayload)> = std::mem::take(&mut *self.pending.lock());
        if pending.is_empty() {
            return 0;
        }

        for (id, payload) in &pending {
            if let Some(node) = self.layer.node_mut(id) {
                node.absolute = Some(Point::new(payload.x, payload.y));
            }
        }

        let inset = self.handover.border_inset();
        let mut relinked = Vec::new();
        for (id, payload) in &pending {
            let absolute = Point::new(payload.x, payload.y);
            let display = match &payload.parent_id {
                Some(parent) => {
                    match self
                        .handover
                        .resolve_absolute(parent, None, &self.layer, Some(self.board.reader()))
                    {
                        Some(parent_abs) => to_relative(absolute, parent_abs, inset),
                        None => absolute,
                    }
                }
                None => absolute,
            };
            if let Some(node) = self.layer.node_mut(id) {
                if node.parent_id != payload.parent_id {
                    relinked.push(id.clone());
                }
                node.position = display;
                node.parent_id = payload.parent_id.clone();
            }
        }
        if !relinked.is_empty() {
            self.layer.refresh_parent_links(&relinked);
        }
        tracing::debug!("Pushed {} position updates to the layer", pending.len());
        pending.len()
    }

    /// Ends the session: cancels timers, drops locks, records and subscriptions.
    pub fn teardown(&mut self) {
        self.drag.shutdown(&mut self.layer);
        if let Some(subscription) = self.subscription.take() {
            self.positions.unsubscribe(subscription);
        }
        self.pending.lock().clear();
        self.positions.clear();
        self.bus.clear();
        tracing::info!("Canvas session closed");
    }

    async fn reroot(
        &mut self,
        id: &NodeId,
        node_type: NodeType,
        position: Option<Point>,
        size: (f64, f64),
    ) -> taskcanvas_core::Result<()> {
        let absolute = position
            .and_then(Point::finite)
            .or_else(|| self.positions.get_position(id).map(|r| r.absolute_position));

        if let Some(absolute) = absolute {
            if !self
                .positions
                .update(id, absolute, None, WriteSource::Reconcile)
            {
                tracing::debug!("{} is locked; re-rooting in the store only", id);
            }
        }

        match node_type {
            NodeType::Task => self.board.update_task(
                id,
                TaskPatch {
                    parent_id: Some(None),
                    ..Default::default()
                },
                WriteSource::Reconcile,
            )?,
            NodeType::Group => self.board.update_group(
                id,
                GroupPatch {
                    parent_group_id: Some(None),
                    ..Default::default()
                },
                WriteSource::Reconcile,
            )?,
        }

        if let (Some(remote), Some(absolute)) = (&self.remote, absolute) {
            match node_type {
                NodeType::Task => remote.write_task(id, absolute, None).await?,
                NodeType::Group => {
                    let bounds = Bounds::from_origin(absolute, size.0, size.1);
                    remote.write_group(id, bounds, None).await?
                }
            };
        }
        Ok(())
    }
}

impl<B, L> std::fmt::Debug for CanvasSession<B, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CanvasSession")
            .field("positions", &self.positions)
            .field("drag", &self.drag)
            .field("selection", &self.selection)
            .field("remote", &self.remote.is_some())
            .finish()
    }
}
