//! Type aliases for the shared-state types used across the board services.
//!
//! The canvas session hands the same position authority and remote writer to the
//! drag orchestrator, the alignment tool and the sync projector, so these
//! wrappers show up in several crates.
//!
//! ```rust,ignore
//! use taskcanvas_core::types::*;
//!
//! // Instead of: Arc<RwLock<HashMap<NodeId, u64>>>
//! let versions: ThreadSafeRwMap<NodeId, u64> = thread_safe_rw(HashMap::new());
//! ```

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

/// A thread-safe, mutex-protected wrapper.
pub type ThreadSafe<T> = Arc<Mutex<T>>;

/// A read-write locked wrapper for read-heavy state.
pub type ThreadSafeRw<T> = Arc<RwLock<T>>;

/// A read-write locked hash map; the position table uses this shape.
pub type ThreadSafeRwMap<K, V> = Arc<RwLock<HashMap<K, V>>>;

/// Wraps a value in `Arc<Mutex<_>>`.
pub fn thread_safe<T>(value: T) -> ThreadSafe<T> {
    Arc::new(Mutex::new(value))
}

/// Wraps a value in `Arc<RwLock<_>>`.
pub fn thread_safe_rw<T>(value: T) -> ThreadSafeRw<T> {
    Arc::new(RwLock::new(value))
}
