//! Router error types.

use thiserror::Error;

/// Why a chat session could not start.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("no compute node available")]
    NoNodeAvailable,

    #[error("session task ended before assignment completed")]
    Aborted,
}

/// Failures talking to an inference upstream.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("invalid upstream url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("failed to encode upstream request: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("upstream request failed: {0}")]
    Transport(String),

    #[error("upstream timed out")]
    Timeout,

    #[error("upstream returned {0}")]
    Status(http::StatusCode),

    #[error("upstream body error: {0}")]
    Body(String),
}
