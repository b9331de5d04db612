use anyhow::{bail, Context};
use std::path::PathBuf;
use taskcanvas::{init_json_logging, init_logging, BoardSnapshot, CanvasConfig, CanvasSession};
use taskcanvas::board::task_counts;
use taskcanvas::{RenderLayer, BUILD_DATE, VERSION};

const USAGE: &str = "usage: taskcanvas [--json-logs] <board.json> [config.toml|config.json]";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut json_logs = false;
    let mut paths: Vec<PathBuf> = Vec::new();
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--json-logs" => json_logs = true,
            "-h" | "--help" => {
                println!("{}", USAGE);
                return Ok(());
            }
            _ => paths.push(PathBuf::from(arg)),
        }
    }

    if json_logs {
        init_json_logging()?;
    } else {
        init_logging()?;
    }
    tracing::info!("taskcanvas {} (built {})", VERSION, BUILD_DATE);

    let (board_path, config_path) = match paths.as_slice() {
        [board] => (board.clone(), None),
        [board, config] => (board.clone(), Some(config.clone())),
        _ => bail!(USAGE),
    };

    let config = match config_path {
        Some(path) => CanvasConfig::load_from_file(&path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => CanvasConfig::default(),
    };

    let snapshot = BoardSnapshot::load_from_file(&board_path)
        .with_context(|| format!("loading board {}", board_path.display()))?;
    tracing::info!(
        "Loaded {} tasks and {} groups from {}",
        snapshot.tasks.len(),
        snapshot.groups.len(),
        board_path.display()
    );

    let mut session = CanvasSession::in_memory(config, snapshot);
    let (repaired, errors) = session.repair_stale_containment().await;
    for err in &errors {
        tracing::warn!("{}", err);
    }
    if !repaired.is_empty() {
        tracing::info!("Cleared {} stale group parents", repaired.len());
    }

    let report = session.sync();
    tracing::info!(
        "Projected {} nodes ({} deferred, {} blocked)",
        report.emitted,
        report.deferred.len(),
        report.blocked.len()
    );

    let max_depth = session.config().containment.max_ancestor_depth;
    let counts = task_counts(session.board(), max_depth);
    let mut groups: Vec<_> = counts.into_iter().collect();
    groups.sort();
    for (group, count) in groups {
        tracing::info!("Group {}: {} tasks", group, count);
    }

    println!("{}", serde_json::to_string_pretty(session.layer().nodes())?);
    session.teardown();
    Ok(())
}
