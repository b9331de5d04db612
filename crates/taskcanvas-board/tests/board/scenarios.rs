use std::sync::Arc;
use taskcanvas_board::{
    BoardReader, MemoryRemote, NodeData, Point, RemoteWriter, RenderLayer, Task,
};
use taskcanvas_settings::RemoteSettings;

use crate::fixtures::*;

#[tokio::test]
async fn test_task_dropped_into_group() {
    let mut session = session(
        vec![Task::new("t", "Write report").at(150.0, 150.0)],
        vec![group("g", 100.0, 100.0, 300.0, 200.0)],
    );
    let counted = |session: &taskcanvas_board::CanvasSession| {
        match &session.layer().node(&id("g")).unwrap().data {
            NodeData::Group { task_count, .. } => *task_count,
            _ => unreachable!(),
        }
    };
    assert_eq!(counted(&session), 0);

    let start = rendered(&session, "t");
    session.drag_start(&start, &[start.clone()]);
    let drop = dropped(&session, "t", 150.0, 150.0);
    let outcome = session.drag_stop(&drop, &[drop.clone()]).await;

    assert!(outcome.is_clean());
    assert_eq!(outcome.new_parent_of(&id("t")), Some(Some(&id("g"))));
    assert_eq!(outcome.task_counts.get(&id("g")), Some(&1));
    assert_eq!(counted(&session), 1);

    let node = session.layer().node(&id("t")).unwrap();
    assert_eq!(node.parent_id, Some(id("g")));
    assert_near(node.position, Point::new(50.0, 50.0));

    let task = session.board().task(&id("t")).unwrap();
    assert_eq!(task.parent_id, Some(id("g")));
    assert_eq!(task.canvas_position, Some(Point::new(150.0, 150.0)));
}

#[tokio::test]
async fn test_nested_group_moves_with_parent() {
    let mut session = session(
        vec![],
        vec![
            group("g1", 0.0, 0.0, 400.0, 400.0),
            group("g2", 50.0, 50.0, 100.0, 100.0).in_group("g1"),
        ],
    );

    let start = rendered(&session, "g1");
    session.drag_start(&start, &[start.clone()]);
    let drop = dropped(&session, "g1", 200.0, 200.0);
    let outcome = session.drag_stop(&drop, &[drop.clone()]).await;

    assert!(outcome.is_clean());
    assert!(outcome.reparented.is_empty());
    assert!(outcome.moved.contains(&id("g2")));

    let inner = session.layer().node(&id("g2")).unwrap();
    assert_near(inner.position, Point::new(50.0, 50.0));
    assert_eq!(inner.parent_id, Some(id("g1")));
    assert_near(inner.absolute.unwrap(), Point::new(250.0, 250.0));

    let stored = session.board().group(&id("g2")).unwrap();
    assert_eq!(stored.position, Point::new(250.0, 250.0));
    assert_eq!(stored.parent_group_id, Some(id("g1")));
    assert_near(
        session.positions().get_relative_position(&id("g2")).unwrap(),
        Point::new(50.0, 50.0),
    );
}

#[tokio::test]
async fn test_group_dragged_out_of_parent() {
    let mut session = session(
        vec![],
        vec![
            group("g1", 0.0, 0.0, 400.0, 400.0),
            group("g2", 50.0, 50.0, 100.0, 100.0).in_group("g1"),
        ],
    );

    // 25% of the moved box still overlaps g1.
    let start = rendered(&session, "g2");
    session.drag_start(&start, &[start.clone()]);
    let drop = dropped(&session, "g2", 350.0, 350.0);
    let outcome = session.drag_stop(&drop, &[drop.clone()]).await;

    assert_eq!(outcome.new_parent_of(&id("g2")), Some(None));
    let stored = session.board().group(&id("g2")).unwrap();
    assert_eq!(stored.parent_group_id, None);
    assert_eq!(stored.position, Point::new(350.0, 350.0));

    let node = session.layer().node(&id("g2")).unwrap();
    assert_eq!(node.parent_id, None);
    assert_near(node.position, Point::new(350.0, 350.0));
}

#[tokio::test]
async fn test_conflict_retry_writes_next_version() {
    let remote = Arc::new(MemoryRemote::new());
    remote.insert("x", 4);
    let writer = RemoteWriter::new(remote.clone(), &RemoteSettings::default());
    writer.seed_version(&id("x"), 3);

    let version = writer
        .write_task(&id("x"), Point::new(10.0, 20.0), None)
        .await
        .unwrap();

    assert_eq!(version, 5);
    assert_eq!(remote.version(&id("x")), Some(5));
    assert_eq!(writer.known_version(&id("x")), Some(5));
    let row = remote.row(&id("x")).unwrap();
    assert_eq!(row.version(), 5);
    assert_eq!(remote.write_count(), 1);
}

#[tokio::test]
async fn test_second_conflict_is_reported_not_retried() {
    let remote = Arc::new(MemoryRemote::new());
    remote.insert("x", 1);
    remote.interfere("x", 2);
    let writer = RemoteWriter::new(remote.clone(), &RemoteSettings::default());

    let err = writer
        .write_task(&id("x"), Point::new(0.0, 0.0), None)
        .await
        .unwrap_err();

    assert!(matches!(err, taskcanvas_core::RemoteError::VersionConflict { .. }));
    assert_eq!(remote.write_count(), 0);
}
