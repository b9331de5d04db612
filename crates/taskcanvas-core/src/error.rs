//! Error handling for TaskCanvas
//!
//! Provides error types for every layer of the board core:
//! - Geometry errors (non-finite or degenerate input)
//! - Store errors (missing or deleted tasks and groups)
//! - Remote errors (optimistic-lock conflicts, transport failures)
//! - Handover errors (attach/detach preconditions)
//!
//! All error types use `thiserror`. Public operations that must not throw across
//! the UI boundary report failures as [`OperationError`] values instead.

use crate::types::NodeId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Geometry error type
///
/// Raised when a coordinate or extent cannot be used for containment math.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    /// A coordinate was NaN or infinite
    #[error("Non-finite position for {id}: ({x}, {y})")]
    NonFinite {
        /// The node carrying the bad coordinate.
        id: NodeId,
        /// The offending x value.
        x: f64,
        /// The offending y value.
        y: f64,
    },

    /// A width or height was zero, negative or non-finite
    #[error("Degenerate size for {id}: {width}x{height}")]
    DegenerateSize {
        /// The node carrying the bad extent.
        id: NodeId,
        /// The offending width.
        width: f64,
        /// The offending height.
        height: f64,
    },
}

/// Store error type
///
/// Represents failures of the persisted task/group store.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// Task does not exist
    #[error("Task not found: {id}")]
    TaskNotFound {
        /// The missing task id.
        id: NodeId,
    },

    /// Group does not exist
    #[error("Group not found: {id}")]
    GroupNotFound {
        /// The missing group id.
        id: NodeId,
    },

    /// The requested parent would close a cycle
    #[error("Assigning parent {parent} to {id} would create a cycle")]
    Cycle {
        /// The node being reparented.
        id: NodeId,
        /// The rejected parent.
        parent: NodeId,
    },

    /// Generic store error
    #[error("Store error: {message}")]
    Other {
        /// The error message.
        message: String,
    },
}

/// Remote persistence error type
///
/// Represents failures of the optimistic-lock remote write path.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RemoteError {
    /// The row was written by someone else since we last read it
    #[error("Version conflict on {id}: expected {expected}, server has {actual}")]
    VersionConflict {
        /// The row id.
        id: NodeId,
        /// The version the write targeted.
        expected: u64,
        /// The version currently stored.
        actual: u64,
    },

    /// The row does not exist remotely
    #[error("Remote row not found: {id}")]
    RowNotFound {
        /// The missing row id.
        id: NodeId,
    },

    /// Transport or backend failure
    #[error("Remote transport error: {reason}")]
    Transport {
        /// The reason for the failure.
        reason: String,
    },
}

/// Coordinate handover error type
///
/// Raised when an attach or detach cannot locate its participants.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HandoverError {
    /// The node being moved is not in the render layer
    #[error("Node not found: {id}")]
    NodeNotFound {
        /// The missing node id.
        id: NodeId,
    },

    /// The requested parent is not in the render layer
    #[error("Parent not found: {id}")]
    ParentNotFound {
        /// The missing parent id.
        id: NodeId,
    },

    /// A node cannot be its own parent
    #[error("Cannot attach {id} to itself")]
    SelfAttach {
        /// The node id.
        id: NodeId,
    },
}

/// Main error type for TaskCanvas
///
/// A unified error type that can represent any error from all layers.
#[derive(Error, Debug)]
pub enum Error {
    /// Geometry error
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    /// Store error
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Remote error
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Handover error
    #[error(transparent)]
    Handover(#[from] HandoverError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Board file (de)serialization error
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is an optimistic-lock conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Remote(RemoteError::VersionConflict { .. }))
    }

    /// Whether retrying the same operation later may succeed.
    ///
    /// Persistence failures are retryable; geometry and handover failures are not,
    /// since repeating them with the same input fails the same way.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Remote(RemoteError::VersionConflict { .. })
                | Error::Remote(RemoteError::Transport { .. })
                | Error::Io(_)
        )
    }

    /// Converts this error into the structured signal surfaced at the UI boundary.
    pub fn into_operation_error(self, operation_name: impl Into<String>) -> OperationError {
        OperationError {
            operation_name: operation_name.into(),
            retryable: self.is_retryable(),
            message: self.to_string(),
        }
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;

/// Structured, non-fatal failure signal emitted by public board operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationError {
    /// Name of the failed operation, e.g. `"persist-position"`.
    pub operation_name: String,
    /// Human readable description.
    pub message: String,
    /// Whether the UI may offer a retry.
    pub retryable: bool,
}

impl OperationError {
    /// Creates a new signal.
    pub fn new(
        operation_name: impl Into<String>,
        message: impl Into<String>,
        retryable: bool,
    ) -> Self {
        Self {
            operation_name: operation_name.into(),
            message: message.into(),
            retryable,
        }
    }
}

impl std::fmt::Display for OperationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} failed: {}", self.operation_name, self.message)?;
        if self.retryable {
            write!(f, " (retryable)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_is_retryable() {
        let err: Error = RemoteError::VersionConflict {
            id: NodeId::new("t1"),
            expected: 3,
            actual: 4,
        }
        .into();
        assert!(err.is_conflict());
        assert!(err.is_retryable());
    }

    #[test]
    fn test_handover_error_not_retryable() {
        let err: Error = HandoverError::SelfAttach {
            id: NodeId::new("g1"),
        }
        .into();
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_operation_error_serializes_camel_case() {
        let err: Error = RemoteError::Transport {
            reason: "offline".to_string(),
        }
        .into();
        let signal = err.into_operation_error("persist-position");
        let json = serde_json::to_value(&signal).unwrap();
        assert_eq!(json["operationName"], "persist-position");
        assert_eq!(json["retryable"], true);
        assert!(json["message"].as_str().unwrap().contains("offline"));
    }
}
