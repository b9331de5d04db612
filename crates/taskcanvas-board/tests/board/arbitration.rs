use std::sync::Arc;
use std::time::Duration;
use taskcanvas_board::{
    BoardReader, BoardWriter, Bounds, ContainmentResolver, ContainmentRule, DragPhase,
    GroupIndex, GroupPatch, Point, PositionManager, PositionUpdate, RenderLayer, Task, TaskPatch,
};
use taskcanvas_core::{EventBus, WriteSource};
use taskcanvas_settings::{CanvasConfig, ContainmentSettings};

use crate::fixtures::*;

#[test]
fn test_drag_lock_rejects_remote_sync_until_released() {
    let positions = PositionManager::new(Arc::new(EventBus::new()), &CanvasConfig::default());
    let x = id("x");
    assert!(positions.acquire_lock(&x, WriteSource::UserDrag));

    let updates = [PositionUpdate::new("x", Point::new(5.0, 5.0), None)];
    let result = positions.batch_update(&updates, WriteSource::RemoteSync);
    assert_eq!(result.rejected_ids, vec![x.clone()]);
    assert_eq!(result.success_count, 0);

    positions.release_lock(&x);
    let result = positions.batch_update(&updates, WriteSource::RemoteSync);
    assert!(result.all_accepted());
    assert_eq!(
        positions.get_position(&x).unwrap().absolute_position,
        Point::new(5.0, 5.0)
    );
}

#[test]
fn test_second_sync_replaces_nothing() {
    let mut session = session(
        vec![Task::new("t", "Task").at(120.0, 130.0).in_group("g")],
        vec![group("g", 100.0, 100.0, 300.0, 200.0)],
    );
    assert_eq!(session.layer().replace_count(), 1);

    let report = session.sync();
    assert!(!report.replaced);
    assert_eq!(session.layer().replace_count(), 1);
}

#[test]
fn test_group_size_change_is_projected() {
    let mut session = session(vec![], vec![group("g", 100.0, 100.0, 200.0, 200.0)]);

    session
        .board_mut()
        .update_group(
            &id("g"),
            GroupPatch {
                size: Some((300.0, 300.0)),
                ..Default::default()
            },
            WriteSource::RemoteSync,
        )
        .unwrap();

    let report = session.sync();
    assert!(report.replaced);
    let g = session.layer().node(&id("g")).unwrap();
    assert_eq!((g.width, g.height), (300.0, 300.0));
}

#[test]
fn test_smallest_nested_group_wins() {
    let outer = group("outer", 0.0, 0.0, 1000.0, 1000.0);
    let inner = group("inner", 100.0, 100.0, 200.0, 200.0).in_group("outer");
    let index = GroupIndex::from_groups([&outer, &inner]);
    let resolver = ContainmentResolver::new(ContainmentSettings::default());

    let item = Bounds::from_origin(Point::new(150.0, 150.0), 20.0, 20.0);
    let found = resolver
        .find_smallest_containing(&item, &index, ContainmentRule::Center)
        .unwrap();
    assert_eq!(found.id, id("inner"));

    let chain = resolver.find_all_containing(&item, &index, ContainmentRule::Center);
    let ids: Vec<_> = chain.iter().map(|g| g.id.clone()).collect();
    assert_eq!(ids, vec![id("outer"), id("inner")]);
}

#[tokio::test(start_paused = true)]
async fn test_remote_position_waits_for_settle() {
    let mut session = session(vec![Task::new("t", "Task").at(0.0, 0.0)], vec![]);

    let start = rendered(&session, "t");
    session.drag_start(&start, &[start.clone()]);
    assert_eq!(
        session.apply_remote_position(&id("t"), Point::new(999.0, 999.0), None),
        Ok(false)
    );

    let drop = start.moved_to(Point::new(40.0, 0.0));
    session.drag_stop(&drop, &[drop.clone()]).await;
    assert_eq!(
        session.apply_remote_position(&id("t"), Point::new(999.0, 999.0), None),
        Ok(false)
    );
    assert_eq!(
        session.board().task(&id("t")).unwrap().canvas_position,
        Some(Point::new(40.0, 0.0))
    );

    session.wait_settled().await;
    assert_eq!(
        session.apply_remote_position(&id("t"), Point::new(60.0, 0.0), None),
        Ok(true)
    );
    assert_eq!(
        session.board().task(&id("t")).unwrap().canvas_position,
        Some(Point::new(60.0, 0.0))
    );
}

#[tokio::test(start_paused = true)]
async fn test_long_drag_keeps_remote_sync_out() {
    let mut session = session(vec![Task::new("t", "Task").at(0.0, 0.0)], vec![]);

    let start = rendered(&session, "t");
    session.drag_start(&start, &[start.clone()]);
    for step in 1..=11 {
        tokio::time::sleep(Duration::from_secs(1)).await;
        session.drag_move(&start.moved_to(Point::new(step as f64, 0.0)));
    }

    assert_eq!(session.drag_phase(), DragPhase::Dragging);
    assert_eq!(
        session.apply_remote_position(&id("t"), Point::new(999.0, 999.0), None),
        Ok(false)
    );
    assert_eq!(
        session.board().task(&id("t")).unwrap().canvas_position,
        Some(Point::new(0.0, 0.0))
    );
}

#[tokio::test(start_paused = true)]
async fn test_settling_keeps_committed_position_on_stale_read() {
    let mut session = session(vec![Task::new("t", "Task").at(0.0, 0.0)], vec![]);

    let start = rendered(&session, "t");
    session.drag_start(&start, &[start.clone()]);
    let drop = start.moved_to(Point::new(100.0, 0.0));
    session.drag_stop(&drop, &[drop.clone()]).await;

    // A slow data path writes the pre-drag position back into the store.
    session
        .board_mut()
        .update_task(
            &id("t"),
            TaskPatch::placement(Point::new(0.0, 0.0), None),
            WriteSource::RemoteSync,
        )
        .unwrap();
    session.sync();
    assert_near(
        session.layer().node(&id("t")).unwrap().position,
        Point::new(100.0, 0.0),
    );
}

#[test]
fn test_unknown_node_remote_position_is_an_error() {
    let mut session = session(vec![], vec![]);
    let err = session
        .apply_remote_position(&id("missing"), Point::new(0.0, 0.0), None)
        .unwrap_err();
    assert_eq!(err.operation_name, "apply-remote-position");
}
