use chrono::NaiveDate;
use std::time::Duration;
use taskcanvas_board::{
    AssignOnDrop, BoardReader, Bounds, DragPhase, KeywordDates, Point, Priority, RenderLayer,
    Task,
};

use crate::fixtures::*;

#[tokio::test]
async fn test_multi_select_moves_rigidly() {
    let mut session = session(
        vec![
            Task::new("t1", "Inside").at(50.0, 50.0).in_group("g"),
            Task::new("t2", "Outside").at(600.0, 100.0),
        ],
        vec![group("g", 0.0, 0.0, 400.0, 400.0)],
    );

    let g = rendered(&session, "g");
    let t2 = rendered(&session, "t2");
    session.drag_start(&g, &[g.clone(), t2.clone()]);

    // The layer reports t2 one unit off; the gesture delta comes from g.
    let g_drop = g.moved_to(Point::new(100.0, 0.0));
    let t2_drop = t2.moved_to(Point::new(701.0, 100.0));
    let outcome = session.drag_stop(&g_drop, &[g_drop.clone(), t2_drop]).await;

    assert!(outcome.is_clean());
    let board = session.board();
    assert_eq!(board.group(&id("g")).unwrap().position, Point::new(100.0, 0.0));
    assert_eq!(board.task(&id("t2")).unwrap().canvas_position, Some(Point::new(700.0, 100.0)));

    let t1 = board.task(&id("t1")).unwrap();
    assert_eq!(t1.canvas_position, Some(Point::new(150.0, 50.0)));
    assert_eq!(t1.parent_id, Some(id("g")));
    assert_near(session.layer().node(&id("t1")).unwrap().position, Point::new(50.0, 50.0));
}

#[tokio::test]
async fn test_selected_child_stays_with_dragged_group() {
    let mut session = session(
        vec![Task::new("t1", "Inside").at(50.0, 50.0).in_group("g")],
        vec![group("g", 0.0, 0.0, 400.0, 400.0)],
    );

    let g = rendered(&session, "g");
    let t1 = rendered(&session, "t1");
    session.drag_start(&t1, &[g.clone(), t1.clone()]);

    let g_drop = g.moved_to(Point::new(100.0, 0.0));
    let t1_drop = t1.moved_to(Point::new(50.0, 50.0));
    let outcome = session.drag_stop(&t1_drop, &[g_drop, t1_drop.clone()]).await;

    assert!(outcome.reparented.is_empty());
    let t1 = session.board().task(&id("t1")).unwrap();
    assert_eq!(t1.parent_id, Some(id("g")));
    assert_eq!(t1.canvas_position, Some(Point::new(150.0, 50.0)));
}

#[tokio::test]
async fn test_drop_into_nested_groups_inherits_properties() {
    let mut outer = group("outer", 0.0, 0.0, 1000.0, 1000.0);
    outer.name = "Project".to_string();
    outer.assign_on_drop = Some(AssignOnDrop {
        project_id: Some("apollo".to_string()),
        ..Default::default()
    });
    let mut inner = group("inner", 100.0, 100.0, 400.0, 300.0).in_group("outer");
    inner.name = "Urgent tomorrow".to_string();

    let today = NaiveDate::from_ymd_opt(2024, 5, 15).unwrap();
    let mut session = session(vec![Task::new("t", "Call").at(1200.0, 800.0)], vec![outer, inner])
        .with_date_resolver(Box::new(KeywordDates::new(today)));

    let start = rendered(&session, "t");
    session.drag_start(&start, &[start.clone()]);
    let drop = start.moved_to(Point::new(150.0, 150.0));
    let outcome = session.drag_stop(&drop, &[drop.clone()]).await;

    assert!(outcome.is_clean());
    assert_eq!(outcome.new_parent_of(&id("t")), Some(Some(&id("inner"))));
    assert_eq!(outcome.task_counts.get(&id("inner")), Some(&1));
    assert_eq!(outcome.task_counts.get(&id("outer")), Some(&1));

    let task = session.board().task(&id("t")).unwrap();
    assert_eq!(task.priority, Priority::High);
    assert_eq!(task.project_id.as_deref(), Some("apollo"));
    assert_eq!(task.due_date, NaiveDate::from_ymd_opt(2024, 5, 16));
    assert_eq!(task.canvas_position, Some(Point::new(150.0, 150.0)));

    let node = session.layer().node(&id("t")).unwrap();
    assert_near(node.position, Point::new(50.0, 50.0));
}

#[tokio::test]
async fn test_non_finite_drag_position_reverts() {
    let mut session = session(vec![Task::new("t", "Task").at(0.0, 0.0)], vec![]);
    let start = rendered(&session, "t");
    session.drag_start(&start, &[start.clone()]);

    let moved = session.drag_move(&start.moved_to(Point::new(30.0, 40.0)));
    assert_eq!(moved, Some(Point::new(30.0, 40.0)));

    let reverted = session.drag_move(&start.moved_to(Point::new(f64::NAN, 40.0)));
    assert_eq!(reverted, Some(Point::new(30.0, 40.0)));
    assert_eq!(
        session.layer().node(&id("t")).unwrap().position,
        Point::new(30.0, 40.0)
    );

    let drop = start.moved_to(Point::new(f64::INFINITY, 0.0));
    let outcome = session.drag_stop(&drop, &[drop.clone()]).await;
    assert!(outcome.is_clean());
    assert_eq!(
        session.board().task(&id("t")).unwrap().canvas_position,
        Some(Point::new(30.0, 40.0))
    );
}

#[tokio::test(start_paused = true)]
async fn test_drag_start_during_settling_restarts() {
    let mut session = session(
        vec![Task::new("a", "A").at(0.0, 0.0), Task::new("b", "B").at(500.0, 0.0)],
        vec![],
    );

    let a = rendered(&session, "a");
    session.drag_start(&a, &[a.clone()]);
    let drop = a.moved_to(Point::new(10.0, 0.0));
    session.drag_stop(&drop, &[drop.clone()]).await;
    assert_eq!(session.drag_phase(), DragPhase::Settling);
    assert!(session.positions().is_locked(&id("a")));

    tokio::time::sleep(Duration::from_millis(100)).await;
    let b = rendered(&session, "b");
    session.drag_start(&b, &[b.clone()]);
    assert_eq!(session.drag_phase(), DragPhase::Dragging);
    assert!(!session.positions().is_locked(&id("a")));

    // The cancelled timer must not end the new gesture.
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(session.drag_phase(), DragPhase::Dragging);
    assert!(session.positions().is_locked(&id("b")));

    let drop = b.moved_to(Point::new(520.0, 0.0));
    session.drag_stop(&drop, &[drop.clone()]).await;
    session.wait_settled().await;
    assert_eq!(session.drag_phase(), DragPhase::Idle);
    assert!(!session.positions().is_locked(&id("b")));
}

#[tokio::test]
async fn test_selection_restored_after_drag() {
    let mut session = session(
        vec![Task::new("a", "A").at(0.0, 0.0), Task::new("b", "B").at(300.0, 0.0)],
        vec![],
    );
    session.selection_mut().select_many(vec![id("a"), id("b")]);

    let a = rendered(&session, "a");
    let b = rendered(&session, "b");
    session.drag_start(&a, &[a.clone(), b.clone()]);
    session.selection_mut().deselect_all();

    let a_drop = a.moved_to(Point::new(0.0, 100.0));
    let b_drop = b.moved_to(Point::new(300.0, 100.0));
    session.drag_stop(&a_drop, &[a_drop.clone(), b_drop]).await;

    assert_eq!(session.selection().selected(), &[id("a"), id("b")]);
    assert_eq!(session.selection().primary(), Some(&id("b")));
}

#[tokio::test]
async fn test_resize_detaches_children_left_outside() {
    let mut session = session(
        vec![Task::new("t", "Task").at(150.0, 250.0).in_group("g1")],
        vec![
            group("g1", 0.0, 0.0, 400.0, 400.0),
            group("g2", 300.0, 300.0, 80.0, 80.0).in_group("g1"),
        ],
    );

    let outcome = session
        .resize_group(&id("g1"), Bounds::new(0.0, 0.0, 200.0, 200.0))
        .await;

    assert!(outcome.is_clean());
    assert_eq!(outcome.new_parent_of(&id("g2")), Some(None));
    assert_eq!(outcome.new_parent_of(&id("t")), Some(None));
    assert_eq!(outcome.task_counts.get(&id("g1")), Some(&0));

    let board = session.board();
    let g1 = board.group(&id("g1")).unwrap();
    assert_eq!((g1.width, g1.height), (200.0, 200.0));
    assert_eq!(board.group(&id("g2")).unwrap().parent_group_id, None);
    assert_eq!(board.task(&id("t")).unwrap().parent_id, None);

    let g2 = session.layer().node(&id("g2")).unwrap();
    assert_eq!(g2.parent_id, None);
    assert_near(g2.position, Point::new(300.0, 300.0));
}

#[tokio::test]
async fn test_resize_from_top_left_keeps_children_in_place() {
    let mut session = session(
        vec![Task::new("t", "Task").at(150.0, 150.0).in_group("g")],
        vec![group("g", 100.0, 100.0, 400.0, 400.0)],
    );
    assert_near(session.layer().node(&id("t")).unwrap().position, Point::new(50.0, 50.0));

    let outcome = session
        .resize_group(&id("g"), Bounds::from_origin(Point::new(50.0, 50.0), 450.0, 450.0))
        .await;

    assert!(outcome.is_clean());
    assert!(outcome.reparented.is_empty());
    let board = session.board();
    assert_eq!(board.group(&id("g")).unwrap().position, Point::new(50.0, 50.0));
    assert_eq!(board.task(&id("t")).unwrap().canvas_position, Some(Point::new(150.0, 150.0)));
    assert_eq!(board.task(&id("t")).unwrap().parent_id, Some(id("g")));

    let t = session.layer().node(&id("t")).unwrap();
    assert_eq!(t.parent_id, Some(id("g")));
    assert_near(t.position, Point::new(100.0, 100.0));
    assert_near(t.absolute.unwrap(), Point::new(150.0, 150.0));
}

#[tokio::test]
async fn test_degenerate_resize_rejected() {
    let mut session = session(vec![], vec![group("g", 0.0, 0.0, 100.0, 100.0)]);
    let outcome = session
        .resize_group(&id("g"), Bounds::new(0.0, 0.0, 0.0, 100.0))
        .await;

    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(outcome.errors[0].operation_name, "resize-group");
    assert!(!outcome.errors[0].retryable);
    assert_eq!(session.board().group(&id("g")).unwrap().width, 100.0);
    assert_eq!(session.drag_phase(), DragPhase::Idle);
}
