use thiserror::Error;

use super::QueryError;
use crate::backend::BackendError;
use crate::coordination::CoordinationError;

/// Errors resolving a playback request.
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("Coordination store unavailable: {0}")]
    CoordinationUnavailable(#[from] CoordinationError),

    #[error("Timed out waiting for an in-flight resolution")]
    Timeout,

    #[error("Content not found for this request")]
    NoMatch,

    #[error("Upstream backend error: {0}")]
    Upstream(BackendError),

    #[error("Backend not configured: {0}")]
    BackendNotConfigured(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(#[from] QueryError),
}

impl PlaybackError {
    /// Whether the client should retry later.
    pub fn is_retryable(&self) -> bool {
        match self {
            PlaybackError::CoordinationUnavailable(_) | PlaybackError::Timeout => true,
            PlaybackError::Upstream(e) => e.is_retryable(),
            PlaybackError::NoMatch
            | PlaybackError::BackendNotConfigured(_)
            | PlaybackError::InvalidQuery(_) => false,
        }
    }
}

impl From<BackendError> for PlaybackError {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::NotFound(_) => PlaybackError::NoMatch,
            other => PlaybackError::Upstream(other),
        }
    }
}
