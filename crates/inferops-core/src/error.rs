//! Configuration error types.

use thiserror::Error;

use crate::types::NodeId;

/// Result type alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading or validating `inferops.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("no nodes configured")]
    NoNodes,

    #[error("duplicate node id: {0}")]
    DuplicateNode(NodeId),

    #[error("node {id}: {reason}")]
    InvalidNode { id: NodeId, reason: String },

    #[error("invalid duration for {field}: {value:?}")]
    InvalidDuration { field: &'static str, value: String },

    #[error("health probe timeout ({timeout:?}) must be shorter than the poll interval ({interval:?})")]
    ProbeTimeoutTooLong {
        timeout: std::time::Duration,
        interval: std::time::Duration,
    },

    #[error("alert rule {id}: {reason}")]
    InvalidRule { id: String, reason: String },

    #[error("{0}")]
    Invalid(String),
}
