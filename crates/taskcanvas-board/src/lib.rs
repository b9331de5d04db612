//! # TaskCanvas Board
//!
//! Coordinate reconciliation and containment inference for a spatial task
//! board: tasks and nestable groups placed on an infinite canvas, with
//! drag-and-drop reparenting driven by geometry.
//!
//! ## Core Components
//!
//! ### Positions
//! - **Geometry**: Points, bounds and the relative/absolute transforms
//! - **Position Authority**: Arbitrates every write by source priority and locks
//! - **Coordinate Handover**: Reparents a rendered node without a visual jump
//!
//! ### Containment
//! - **Containment Resolver**: Smallest enclosing group, cycle-safe group nesting
//! - **Drag Orchestrator**: Gesture state machine, commit and settling
//! - **Alignment**: Align and distribute as a programmatic writer
//!
//! ### Read and write paths
//! - **Sync Projector**: Store to render layer, parent-first, zombie guarded
//! - **Remote Write Path**: Optimistic-lock persistence with one retry
//! - **Metadata**: Recursive task counts and inherited task properties
//!
//! ## Architecture
//!
//! ```text
//! CanvasSession
//!   ├── PositionManager (authority, locks, events)
//!   ├── DragOrchestrator
//!   │     ├── ContainmentResolver
//!   │     ├── CoordinateHandover
//!   │     └── RemoteWriter
//!   ├── AlignTool
//!   └── SyncProjector (read-only board access)
//!
//! BoardWriter / BoardReader  (task and group store)
//! RenderLayer                (display positions, parent links)
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use taskcanvas_board::{BoardSnapshot, CanvasSession};
//! use taskcanvas_settings::CanvasConfig;
//!
//! let mut session = CanvasSession::in_memory(CanvasConfig::default(), snapshot);
//! session.sync();
//!
//! session.drag_start(&primary, &dragged);
//! let outcome = session.drag_stop(&dropped, &dragged_at_drop).await;
//! ```

pub mod align;
pub mod containment;
pub mod drag;
pub mod geometry;
pub mod handover;
pub mod metadata;
pub mod model;
pub mod position;
pub mod remote;
pub mod render;
pub mod selection;
pub mod session;
pub mod store;
pub mod sync;

pub use align::{alignment_deltas, distribution_deltas, AlignOutcome, AlignTool, Alignment, Axis};
pub use containment::{
    would_create_cycle, AncestorChain, ContainmentResolver, ContainmentRule, GroupIndex, GroupRect,
};
pub use drag::{DragContext, DragNode, DragOrchestrator, DragOutcome, DragPhase, Reparent};
pub use geometry::{
    center, is_more_than_half_inside, overlap_fraction, rect_contains, smallest_containing,
    to_absolute, to_relative, Bounds, Point, Spatial,
};
pub use handover::{CoordinateHandover, HandoverResult};
pub use metadata::{task_counts, DateKeywordResolver, KeywordDates};
pub use model::{AssignOnDrop, Group, Node, Priority, PropertyValue, Task, TaskStatus};
pub use position::{BatchResult, PositionManager, PositionRecord, PositionUpdate};
pub use remote::{MemoryRemote, RemotePositionStore, RemoteRow, RemoteWriter};
pub use render::{NodeData, RenderGraph, RenderLayer, RenderNode};
pub use selection::{SelectionManager, SelectionSnapshot};
pub use session::{CanvasSession, DeleteOutcome};
pub use store::{
    BoardReader, BoardSnapshot, BoardWriter, GroupPatch, MemoryBoard, TaskPatch, UndoEntry,
};
pub use sync::{ProjectionFilter, ProjectionReport, SyncProjector};
