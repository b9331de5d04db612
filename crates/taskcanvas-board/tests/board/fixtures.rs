use taskcanvas_board::{
    BoardSnapshot, Bounds, CanvasSession, DragNode, Group, Point, RenderLayer, Task,
};
use taskcanvas_core::NodeId;
use taskcanvas_settings::CanvasConfig;

pub fn id(s: &str) -> NodeId {
    NodeId::new(s)
}

pub fn group(id: &str, x: f64, y: f64, w: f64, h: f64) -> Group {
    Group::new(id, id, Bounds::from_origin(Point::new(x, y), w, h))
}

/// Session over the given nodes, projected once.
pub fn session(tasks: Vec<Task>, groups: Vec<Group>) -> CanvasSession {
    let snapshot = BoardSnapshot { tasks, groups };
    let mut session = CanvasSession::in_memory(CanvasConfig::default(), snapshot);
    session.sync();
    session
}

/// The node as the render layer would report it at drag start.
pub fn rendered(session: &CanvasSession, node: &str) -> DragNode {
    DragNode::from_render(session.layer().node(&id(node)).expect("node is rendered"))
}

/// The node reported at a new display position.
pub fn dropped(session: &CanvasSession, node: &str, x: f64, y: f64) -> DragNode {
    rendered(session, node).moved_to(Point::new(x, y))
}

pub fn assert_near(actual: Point, expected: Point) {
    assert!(
        actual.approx_eq(&expected, 1e-6),
        "expected ({}, {}), got ({}, {})",
        expected.x,
        expected.y,
        actual.x,
        actual.y
    );
}
