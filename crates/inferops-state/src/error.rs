//! Error types for the InferOps state store.

use inferops_core::NodeId;
use thiserror::Error;

/// Result type alias for state store operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur during state store operations.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),
}
