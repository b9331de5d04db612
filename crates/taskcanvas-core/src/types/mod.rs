//! Shared identity types and aliases.
//!
//! ## Modules
//!
//! - [`ids`]: `NodeId` and the task/group node tag.
//! - [`source`]: `WriteSource`, the tag carried by every position write.
//! - [`aliases`]: Type aliases for `Arc<Mutex<T>>` and `Arc<RwLock<T>>`.

pub mod aliases;
pub mod ids;
pub mod source;

pub use aliases::*;
pub use ids::{NodeId, NodeType};
pub use source::WriteSource;
