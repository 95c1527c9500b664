//! Agent client error types.

use thiserror::Error;

pub type AgentResult<T> = Result<T, AgentError>;

/// Failures talking to a node agent.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("invalid agent url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("request to {url} failed: {reason}")]
    Transport { url: String, reason: String },

    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("{url} returned {status}")]
    Status { url: String, status: http::StatusCode },

    #[error("malformed telemetry from {url}: {reason}")]
    Telemetry { url: String, reason: String },
}
