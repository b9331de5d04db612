use taskcanvas_board::{BoardSnapshot, CanvasSession, Point, RenderLayer, Task};
use taskcanvas_settings::CanvasConfig;

use crate::fixtures::*;

#[tokio::test]
async fn test_committed_drag_survives_reload() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("board.json");

    let mut session = session(
        vec![Task::new("t", "Task").at(600.0, 600.0)],
        vec![group("g", 100.0, 100.0, 300.0, 300.0)],
    );
    let start = rendered(&session, "t");
    session.drag_start(&start, &[start.clone()]);
    let drop = start.moved_to(Point::new(150.0, 150.0));
    session.drag_stop(&drop, &[drop.clone()]).await;
    session.board().snapshot().save_to_file(&path)?;
    session.teardown();

    let snapshot = BoardSnapshot::load_from_file(&path)?;
    let task = snapshot.tasks.iter().find(|t| t.id == id("t")).expect("task saved");
    // Stored positions stay absolute.
    assert_eq!(task.canvas_position, Some(Point::new(150.0, 150.0)));
    assert_eq!(task.parent_id, Some(id("g")));

    let mut reloaded = CanvasSession::in_memory(CanvasConfig::default(), snapshot);
    reloaded.sync();
    let node = reloaded.layer().node(&id("t")).expect("task rendered");
    assert_eq!(node.parent_id, Some(id("g")));
    assert_near(node.position, Point::new(50.0, 50.0));
    Ok(())
}
