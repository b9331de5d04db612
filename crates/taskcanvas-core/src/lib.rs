//! # TaskCanvas Core
//!
//! Core types shared by every TaskCanvas crate: node identities, write sources,
//! the error taxonomy with its structured [`OperationError`] signal, and the
//! per-session event bus.

pub mod error;
pub mod event_bus;
pub mod types;

pub use error::{
    Error, GeometryError, HandoverError, OperationError, RemoteError, Result, StoreError,
};

pub use event_bus::{
    CanvasEvent, DragEvent, EventBus, EventBusConfig, EventCategory, EventFilter, PositionEvent,
    PositionPayload, SubscriptionId, SyncEvent,
};

pub use types::{
    thread_safe, thread_safe_rw, NodeId, NodeType, ThreadSafe, ThreadSafeRw, ThreadSafeRwMap,
    WriteSource,
};
