//! AI backend error types.

use thiserror::Error;

/// Errors that can occur when talking to the AI backend.
#[derive(Debug, Error)]
pub enum ChatError {
    /// The stored conversation or client handle is no longer valid on the
    /// remote side. The only recoverable-by-recreation error.
    #[error("chat session closed by backend")]
    SessionClosed,

    /// HTTP request failed.
    #[error("http request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("api error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// The per-call deadline elapsed.
    #[error("backend call timed out")]
    Timeout,

    /// Response decoded but is missing required content.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl ChatError {
    /// Whether this error invalidates the stored session handle.
    pub fn is_session_closed(&self) -> bool {
        matches!(self, ChatError::SessionClosed)
    }
}
