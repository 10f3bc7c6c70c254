//! Error types for parley-wire

use thiserror::Error;

/// Result type alias using parley-wire Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to the orchestrator or an agent
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed (connect, read, timeout)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Server answered with a non-success status
    #[error("Request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    /// Stream framing error
    #[error("SSE error: {0}")]
    Sse(String),

    /// Stream was aborted
    #[error("Request aborted")]
    Aborted,

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unexpected response format
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl Error {
    /// Create a status error from a status code and body
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::Status {
            status,
            body: body.into(),
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(e) => e.is_connect() || e.is_timeout(),
            Error::Status { status, .. } => *status == 429 || (500..600).contains(status),
            Error::Sse(_) => true,
            _ => false,
        }
    }
}
