use std::sync::Arc;
use taskcanvas_board::{
    Alignment, Axis, BoardReader, BoardWriter, MemoryRemote, Point, RemoteWriter, RenderLayer,
    Task,
};
use taskcanvas_core::{CanvasEvent, DragEvent};
use taskcanvas_settings::RemoteSettings;

use crate::fixtures::*;

#[tokio::test]
async fn test_deleted_group_children_keep_absolute_positions() {
    let mut session = session(
        vec![Task::new("t", "Task").at(150.0, 150.0).in_group("g1")],
        vec![
            group("g1", 100.0, 100.0, 600.0, 600.0),
            group("g2", 300.0, 300.0, 200.0, 200.0).in_group("g1"),
        ],
    );

    let outcome = session.delete_group(&id("g1")).await;
    assert!(outcome.errors.is_empty());
    assert_eq!(outcome.rerooted, vec![id("g2"), id("t")]);

    let board = session.board();
    assert!(board.group(&id("g1")).is_none());
    let g2 = board.group(&id("g2")).unwrap();
    assert_eq!(g2.parent_group_id, None);
    assert_eq!(g2.position, Point::new(300.0, 300.0));
    assert_eq!(board.task(&id("t")).unwrap().parent_id, None);

    let layer = session.layer();
    assert!(layer.node(&id("g1")).is_none());
    let node = layer.node(&id("g2")).unwrap();
    assert_eq!(node.parent_id, None);
    assert_near(node.position, Point::new(300.0, 300.0));
    assert_near(layer.node(&id("t")).unwrap().position, Point::new(150.0, 150.0));
}

#[tokio::test]
async fn test_deleted_group_does_not_reappear() {
    let mut session = session(vec![], vec![group("g", 0.0, 0.0, 200.0, 200.0)]);
    session.delete_group(&id("g")).await;

    // A delayed sync delivers the group again.
    session.board_mut().insert_group(group("g", 0.0, 0.0, 200.0, 200.0));
    let report = session.sync();

    assert_eq!(report.blocked, vec![id("g")]);
    assert!(session.layer().node(&id("g")).is_none());
}

#[tokio::test]
async fn test_delete_missing_group_reports_error() {
    let mut session = session(vec![], vec![]);
    let outcome = session.delete_group(&id("nope")).await;
    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(outcome.errors[0].operation_name, "delete-group");
}

#[tokio::test]
async fn test_stale_parent_link_cleared() {
    let mut session = session(
        vec![],
        vec![
            group("g1", 0.0, 0.0, 400.0, 400.0),
            group("g2", 1000.0, 1000.0, 100.0, 100.0).in_group("g1"),
        ],
    );

    let (repaired, errors) = session.repair_stale_containment().await;
    assert!(errors.is_empty());
    assert_eq!(repaired, vec![id("g2")]);
    assert_eq!(session.board().group(&id("g2")).unwrap().parent_group_id, None);

    let node = session.layer().node(&id("g2")).unwrap();
    assert_eq!(node.parent_id, None);
    assert_near(node.position, Point::new(1000.0, 1000.0));
}

#[tokio::test]
async fn test_align_pushes_positions_to_layer() {
    let mut session = session(
        vec![Task::new("a", "A").at(0.0, 0.0), Task::new("b", "B").at(100.0, 50.0)],
        vec![],
    );

    let outcome = session.align(&[id("a"), id("b")], Alignment::Left).await;
    assert!(outcome.is_clean());
    assert_eq!(outcome.moved, vec![id("b")]);
    assert_near(session.layer().node(&id("b")).unwrap().position, Point::new(0.0, 50.0));
    assert_eq!(
        session.board().task(&id("b")).unwrap().canvas_position,
        Some(Point::new(0.0, 50.0))
    );

    // The pushed positions match what a projection computes.
    assert!(!session.sync().replaced);
}

#[tokio::test]
async fn test_distribute_children_relative_to_parent() {
    let mut session = session(
        vec![
            Task::new("a", "A").at(100.0, 100.0).in_group("g"),
            Task::new("b", "B").at(350.0, 100.0).in_group("g"),
            Task::new("c", "C").at(900.0, 100.0).in_group("g"),
        ],
        vec![group("g", 50.0, 50.0, 1200.0, 400.0)],
    );

    let outcome = session.distribute(&[id("a"), id("b"), id("c")], Axis::Horizontal).await;
    assert!(outcome.is_clean());
    assert_eq!(
        session.board().task(&id("b")).unwrap().canvas_position,
        Some(Point::new(500.0, 100.0))
    );
    let node = session.layer().node(&id("b")).unwrap();
    assert_eq!(node.parent_id, Some(id("g")));
    assert_near(node.position, Point::new(450.0, 50.0));
}

#[tokio::test]
async fn test_drag_persists_remotely() {
    let remote = Arc::new(MemoryRemote::new());
    remote.insert("t", 1);
    let writer = Arc::new(RemoteWriter::new(remote.clone(), &RemoteSettings::default()));
    let mut session = session(vec![Task::new("t", "Task").at(0.0, 0.0)], vec![])
        .with_remote(writer);

    let start = rendered(&session, "t");
    session.drag_start(&start, &[start.clone()]);
    let drop = start.moved_to(Point::new(25.0, 30.0));
    let outcome = session.drag_stop(&drop, &[drop.clone()]).await;

    assert!(outcome.is_clean());
    assert_eq!(remote.version(&id("t")), Some(2));
    let row = remote.row(&id("t")).unwrap();
    let json = serde_json::to_value(&row).unwrap();
    assert_eq!(json["position"]["x"], 25.0);
    assert_eq!(json["position"]["format"], "absolute");
}

#[tokio::test]
async fn test_remote_outage_reported_per_node() {
    let remote = Arc::new(MemoryRemote::new());
    remote.insert("a", 1);
    remote.insert("b", 1);
    remote.fail_next_writes(1);
    let writer = Arc::new(RemoteWriter::new(remote.clone(), &RemoteSettings::default()));
    let mut session = session(
        vec![Task::new("a", "A").at(0.0, 0.0), Task::new("b", "B").at(300.0, 0.0)],
        vec![],
    )
    .with_remote(writer);

    let a = rendered(&session, "a");
    let b = rendered(&session, "b");
    session.drag_start(&a, &[a.clone(), b.clone()]);
    let a_drop = a.moved_to(Point::new(0.0, 50.0));
    let b_drop = b.moved_to(Point::new(300.0, 50.0));
    let outcome = session.drag_stop(&a_drop, &[a_drop.clone(), b_drop]).await;

    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(outcome.errors[0].operation_name, "persist-position");
    assert!(outcome.errors[0].retryable);
    assert_eq!(outcome.moved, vec![id("b")]);
    assert_eq!(remote.version(&id("b")), Some(2));
}

#[tokio::test]
async fn test_teardown_clears_authority() {
    let mut session = session(vec![Task::new("t", "Task").at(0.0, 0.0)], vec![]);
    let mut events = session.bus().receiver();

    let start = rendered(&session, "t");
    session.drag_start(&start, &[start.clone()]);
    let drop = start.moved_to(Point::new(10.0, 10.0));
    session.drag_stop(&drop, &[drop.clone()]).await;
    assert!(!session.positions().is_empty());

    let mut committed = false;
    while let Ok(event) = events.try_recv() {
        if let CanvasEvent::Drag(DragEvent::Committed { moved, .. }) = event {
            committed = moved == 1;
        }
    }
    assert!(committed);

    session.teardown();
    assert!(session.positions().is_empty());
    assert!(!session.positions().is_locked(&id("t")));
}
