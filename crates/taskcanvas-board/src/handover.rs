//! Coordinate handover.
//!
//! Changing a node's parent changes how the render layer interprets its
//! `position`. [`CoordinateHandover::attach`] and [`CoordinateHandover::detach`]
//! recompute the display position in the same step as the parent link, so the node
//! does not visually jump.
//!
//! Every absolute lookup goes through [`CoordinateHandover::resolve_absolute`],
//! which applies one fallback chain:
//!
//! 1. explicit override (e.g. the in-flight drag position)
//! 2. the render layer's cached absolute position
//! 3. a walk over parent offsets in the render layer (bounded)
//! 4. the store's persisted value
//!
//! Callers that need a value regardless take the origin as the last resort.

use serde::Serialize;
use taskcanvas_core::{HandoverError, NodeId};
use taskcanvas_settings::CanvasConfig;

use crate::geometry::{to_absolute, to_relative, Point};
use crate::render::RenderLayer;
use crate::store::BoardReader;

/// Outcome of an attach or detach.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandoverResult {
    /// New display position; parent-relative after an attach.
    pub position: Point,
    pub success: bool,
    #[serde(skip)]
    pub reason: Option<HandoverError>,
}

impl HandoverResult {
    fn ok(position: Point) -> Self {
        Self {
            position,
            success: true,
            reason: None,
        }
    }

    fn failed(reason: HandoverError) -> Self {
        tracing::warn!("Handover failed: {}", reason);
        Self {
            position: Point::zero(),
            success: false,
            reason: Some(reason),
        }
    }
}

/// Absolute/relative handover against a render layer.
#[derive(Debug, Clone)]
pub struct CoordinateHandover {
    border_inset: f64,
    max_resolve_depth: usize,
}

impl CoordinateHandover {
    pub fn new(border_inset: f64, max_resolve_depth: usize) -> Self {
        Self {
            border_inset,
            max_resolve_depth,
        }
    }

    pub fn from_config(config: &CanvasConfig) -> Self {
        Self::new(
            config.geometry.border_inset,
            config.containment.max_resolve_depth,
        )
    }

    pub fn border_inset(&self) -> f64 {
        self.border_inset
    }

    /// Resolves the absolute position of `id` through the fallback chain.
    ///
    /// Non-finite values at any step are skipped. `None` means nothing usable is
    /// known about the node.
    pub fn resolve_absolute(
        &self,
        id: &NodeId,
        explicit: Option<Point>,
        layer: &dyn RenderLayer,
        store: Option<&dyn BoardReader>,
    ) -> Option<Point> {
        if let Some(point) = explicit.and_then(Point::finite) {
            return Some(point);
        }
        if let Some(point) = layer
            .node(id)
            .and_then(|node| node.absolute)
            .and_then(Point::finite)
        {
            return Some(point);
        }
        if let Some(point) = self.walk_parents(id, layer).and_then(Point::finite) {
            return Some(point);
        }
        store
            .and_then(|store| store.node(id))
            .and_then(|node| node.absolute_position())
            .and_then(Point::finite)
    }

    /// Accumulates display offsets up the parent chain.
    ///
    /// Stops early at an ancestor with a cached absolute position. Past the hop
    /// limit the partial sum is returned as a best estimate.
    fn walk_parents(&self, id: &NodeId, layer: &dyn RenderLayer) -> Option<Point> {
        let node = layer.node(id)?;
        let mut sum = node.position;
        let mut parent_id = node.parent_id.clone();
        let mut hops = 0;

        while let Some(pid) = parent_id {
            if hops >= self.max_resolve_depth {
                tracing::warn!(
                    "Absolute position of {} unresolved after {} hops; using best estimate",
                    id,
                    hops
                );
                return Some(sum);
            }
            hops += 1;

            let Some(parent) = layer.node(&pid) else {
                // Parent not rendered: the offset chain ends here.
                return Some(sum);
            };
            if let Some(parent_abs) = parent.absolute.and_then(Point::finite) {
                return Some(to_absolute(sum, parent_abs, self.border_inset));
            }
            sum = to_absolute(sum, parent.position, self.border_inset);
            parent_id = parent.parent_id.clone();
        }
        Some(sum)
    }

    /// Makes `new_parent_id` the parent of `node_id` without moving it on screen.
    pub fn attach(
        &self,
        layer: &mut dyn RenderLayer,
        store: Option<&dyn BoardReader>,
        node_id: &NodeId,
        new_parent_id: &NodeId,
        explicit_absolute: Option<Point>,
    ) -> HandoverResult {
        if node_id == new_parent_id {
            return HandoverResult::failed(HandoverError::SelfAttach {
                id: node_id.clone(),
            });
        }
        if layer.node(node_id).is_none() {
            return HandoverResult::failed(HandoverError::NodeNotFound {
                id: node_id.clone(),
            });
        }
        if layer.node(new_parent_id).is_none() {
            return HandoverResult::failed(HandoverError::ParentNotFound {
                id: new_parent_id.clone(),
            });
        }

        let child_abs = self
            .resolve_absolute(node_id, explicit_absolute, &*layer, store)
            .unwrap_or_default();
        let parent_abs = self
            .resolve_absolute(new_parent_id, None, &*layer, store)
            .unwrap_or_default();
        let relative = to_relative(child_abs, parent_abs, self.border_inset);

        if let Some(node) = layer.node_mut(node_id) {
            node.position = relative;
            node.parent_id = Some(new_parent_id.clone());
            node.absolute = Some(child_abs);
        }
        tracing::debug!(
            "Attached {} to {} at ({:.1}, {:.1})",
            node_id,
            new_parent_id,
            relative.x,
            relative.y
        );
        HandoverResult::ok(relative)
    }

    /// Clears the parent of `node_id`, keeping its absolute position.
    pub fn detach(
        &self,
        layer: &mut dyn RenderLayer,
        store: Option<&dyn BoardReader>,
        node_id: &NodeId,
        explicit_absolute: Option<Point>,
    ) -> HandoverResult {
        if layer.node(node_id).is_none() {
            return HandoverResult::failed(HandoverError::NodeNotFound {
                id: node_id.clone(),
            });
        }

        let absolute = self
            .resolve_absolute(node_id, explicit_absolute, &*layer, store)
            .unwrap_or_default();

        if let Some(node) = layer.node_mut(node_id) {
            node.position = absolute;
            node.parent_id = None;
            node.absolute = Some(absolute);
        }
        tracing::debug!(
            "Detached {} at ({:.1}, {:.1})",
            node_id,
            absolute.x,
            absolute.y
        );
        HandoverResult::ok(absolute)
    }
}
