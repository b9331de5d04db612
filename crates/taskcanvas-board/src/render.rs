//! Render-layer seam.
//!
//! The render layer owns on-screen placement. Nodes carry a display `position`
//! that is parent-relative whenever `parent_id` is set, plus the layer's own
//! cached absolute position (`absolute`), which goes stale whenever a parent moves
//! until the layer re-resolves its parent links.
//!
//! [`RenderGraph`] is the in-memory layer used by the session and the tests. It
//! behaves like a graph library that caches parent discovery at node creation:
//! after changing a node's parent, callers must ask it to
//! [`refresh_parent_links`](RenderLayer::refresh_parent_links).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use taskcanvas_core::{NodeId, NodeType};

use crate::geometry::{to_absolute, Point};
use crate::model::{Priority, TaskStatus};

/// Display fields carried with a render node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum NodeData {
    #[serde(rename_all = "camelCase")]
    Task {
        title: String,
        status: TaskStatus,
        priority: Priority,
    },
    #[serde(rename_all = "camelCase")]
    Group {
        label: String,
        color: Option<String>,
        collapsed: bool,
        task_count: usize,
    },
}

impl NodeData {
    /// Compares only the fields whose change requires a re-render.
    ///
    /// Group task counts are excluded; they follow membership, which is already
    /// covered by the parent comparison.
    pub fn same_display(&self, other: &NodeData) -> bool {
        match (self, other) {
            (
                NodeData::Task {
                    title,
                    status,
                    priority,
                },
                NodeData::Task {
                    title: other_title,
                    status: other_status,
                    priority: other_priority,
                },
            ) => title == other_title && status == other_status && priority == other_priority,
            (
                NodeData::Group {
                    label,
                    color,
                    collapsed,
                    ..
                },
                NodeData::Group {
                    label: other_label,
                    color: other_color,
                    collapsed: other_collapsed,
                    ..
                },
            ) => label == other_label && color == other_color && collapsed == other_collapsed,
            _ => false,
        }
    }
}

/// One node as the render layer sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderNode {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    /// Parent-relative when `parent_id` is set, absolute otherwise.
    pub position: Point,
    pub parent_id: Option<NodeId>,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub z_index: i32,
    /// The layer's cached absolute position; may be stale.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub absolute: Option<Point>,
    pub data: NodeData,
}

impl RenderNode {
    /// True when the two nodes would render identically.
    pub fn same_render(&self, other: &RenderNode, tolerance: f64) -> bool {
        self.id == other.id
            && self.node_type == other.node_type
            && self.parent_id == other.parent_id
            && self.position.approx_eq(&other.position, tolerance)
            && (self.width - other.width).abs() <= tolerance
            && (self.height - other.height).abs() <= tolerance
            && self.data.same_display(&other.data)
    }
}

/// Operations the board core needs from a render layer.
pub trait RenderLayer {
    fn nodes(&self) -> &[RenderNode];

    fn node(&self, id: &NodeId) -> Option<&RenderNode>;

    fn node_mut(&mut self, id: &NodeId) -> Option<&mut RenderNode>;

    /// Replaces the whole node set.
    fn replace_nodes(&mut self, nodes: Vec<RenderNode>);

    /// Asks the layer to re-resolve parent/child relationships for `ids`.
    fn refresh_parent_links(&mut self, ids: &[NodeId]);

    /// Number of full replacements performed so far.
    fn replace_count(&self) -> usize;
}

/// In-memory render layer.
#[derive(Debug, Clone, Default)]
pub struct RenderGraph {
    nodes: Vec<RenderNode>,
    index: HashMap<NodeId, usize>,
    border_inset: f64,
    replace_count: usize,
    refresh_count: usize,
}

impl RenderGraph {
    pub fn new(border_inset: f64) -> Self {
        Self {
            border_inset,
            ..Default::default()
        }
    }

    /// Number of parent-link refresh requests received.
    pub fn refresh_count(&self) -> usize {
        self.refresh_count
    }

    fn reindex(&mut self) {
        self.index = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (node.id.clone(), i))
            .collect();
    }

    /// Recomputes every cached absolute position from display positions.
    ///
    /// Nodes are expected parent-first; a child listed before its parent keeps
    /// its previous cache.
    fn recompute_absolutes(&mut self) {
        let mut resolved: HashMap<NodeId, Point> = HashMap::with_capacity(self.nodes.len());
        for node in &mut self.nodes {
            let absolute = match &node.parent_id {
                None => Some(node.position),
                Some(parent) => resolved
                    .get(parent)
                    .map(|parent_abs| to_absolute(node.position, *parent_abs, self.border_inset)),
            };
            if let Some(absolute) = absolute {
                node.absolute = Some(absolute);
                resolved.insert(node.id.clone(), absolute);
            } else if let Some(stale) = node.absolute {
                resolved.insert(node.id.clone(), stale);
            }
        }
    }

    /// Inserts or replaces a single node without counting a full replace.
    pub fn upsert(&mut self, node: RenderNode) {
        match self.index.get(&node.id) {
            Some(&i) => self.nodes[i] = node,
            None => {
                self.index.insert(node.id.clone(), self.nodes.len());
                self.nodes.push(node);
            }
        }
    }
}

impl RenderLayer for RenderGraph {
    fn nodes(&self) -> &[RenderNode] {
        &self.nodes
    }

    fn node(&self, id: &NodeId) -> Option<&RenderNode> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    fn node_mut(&mut self, id: &NodeId) -> Option<&mut RenderNode> {
        match self.index.get(id) {
            Some(&i) => self.nodes.get_mut(i),
            None => None,
        }
    }

    fn replace_nodes(&mut self, nodes: Vec<RenderNode>) {
        self.nodes = nodes;
        self.reindex();
        self.recompute_absolutes();
        self.replace_count += 1;
    }

    fn refresh_parent_links(&mut self, ids: &[NodeId]) {
        if ids.is_empty() {
            return;
        }
        tracing::debug!("Refreshing parent links for {} nodes", ids.len());
        self.recompute_absolutes();
        self.refresh_count += 1;
    }

    fn replace_count(&self) -> usize {
        self.replace_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(id: &str, x: f64, y: f64, parent: Option<&str>) -> RenderNode {
        RenderNode {
            id: NodeId::new(id),
            node_type: NodeType::Group,
            position: Point::new(x, y),
            parent_id: parent.map(NodeId::new),
            width: 100.0,
            height: 100.0,
            z_index: 0,
            absolute: None,
            data: NodeData::Group {
                label: id.to_string(),
                color: None,
                collapsed: false,
                task_count: 0,
            },
        }
    }

    #[test]
    fn test_replace_computes_absolutes() {
        let mut graph = RenderGraph::new(0.0);
        graph.replace_nodes(vec![
            group("outer", 100.0, 100.0, None),
            group("inner", 20.0, 30.0, Some("outer")),
        ]);
        assert_eq!(graph.replace_count(), 1);
        assert_eq!(
            graph.node(&NodeId::new("inner")).unwrap().absolute,
            Some(Point::new(120.0, 130.0))
        );
    }

    #[test]
    fn test_parent_cache_stale_until_refresh() {
        let mut graph = RenderGraph::new(0.0);
        graph.replace_nodes(vec![
            group("outer", 100.0, 100.0, None),
            group("inner", 20.0, 30.0, Some("outer")),
        ]);
        graph.node_mut(&NodeId::new("outer")).unwrap().position = Point::new(0.0, 0.0);
        assert_eq!(
            graph.node(&NodeId::new("inner")).unwrap().absolute,
            Some(Point::new(120.0, 130.0))
        );

        graph.refresh_parent_links(&[NodeId::new("inner")]);
        assert_eq!(
            graph.node(&NodeId::new("inner")).unwrap().absolute,
            Some(Point::new(20.0, 30.0))
        );
        assert_eq!(graph.refresh_count(), 1);
    }

    #[test]
    fn test_group_count_ignored_by_display_diff() {
        let a = group("g", 0.0, 0.0, None);
        let mut b = a.clone();
        if let NodeData::Group { task_count, .. } = &mut b.data {
            *task_count = 3;
        }
        assert!(a.same_render(&b, 0.1));
    }

    #[test]
    fn test_size_change_is_a_display_change() {
        let a = group("g", 0.0, 0.0, None);
        let mut b = a.clone();
        b.width += 0.05;
        assert!(a.same_render(&b, 0.1));
        b.height += 50.0;
        assert!(!a.same_render(&b, 0.1));
    }
}
