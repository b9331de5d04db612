//! # TaskCanvas
//!
//! Coordinate reconciliation and containment engine for a spatial task board
//! where tasks and groups live on an infinite canvas.
//!
//! ## Architecture
//!
//! TaskCanvas is organized as a workspace with multiple crates:
//!
//! 1. **taskcanvas-core** - Ids, write sources, errors, canvas events
//! 2. **taskcanvas-settings** - Tunable constants with JSON/TOML persistence
//! 3. **taskcanvas-board** - Position authority, containment, drag lifecycle,
//!    render projection and remote persistence
//! 4. **taskcanvas** - Binary that loads a board and prints its projection
//!
//! ## Features
//!
//! - **Single position authority**: priority-ordered write arbitration with locks
//! - **Containment inference**: smallest containing group, cycle-safe nesting
//! - **Drag lifecycle**: rigid multi-select, settling window, property inheritance
//! - **Projection**: idempotent store-to-layer sync with zombie suppression

pub use taskcanvas_board as board;

pub use taskcanvas_core::{
    CanvasEvent, DragEvent, Error, EventBus, NodeId, NodeType, OperationError, Result,
    WriteSource,
};

pub use taskcanvas_settings::{CanvasConfig, SettingsError};

pub use taskcanvas_board::{
    BoardSnapshot, Bounds, CanvasSession, DragNode, DragOutcome, DragPhase, Group, MemoryBoard,
    Point, ProjectionReport, RenderGraph, RenderLayer, RenderNode, Task,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging with the default configuration
///
/// Sets up structured logging with console output and `RUST_LOG` support,
/// defaulting to `INFO`.
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

/// Initialize logging with one JSON object per line on stderr.
pub fn init_json_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());
    let fmt_layer = fmt::layer().json().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}
