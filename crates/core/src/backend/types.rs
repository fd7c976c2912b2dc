//! Types for cached-content backends.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::availability::{AvailabilityReport, BackendKind};
use crate::release::MediaType;

/// Errors that can occur while talking to a backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Content not found: {0}")]
    NotFound(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BackendError {
    /// Whether retrying the same call later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BackendError::ConnectionFailed(_) | BackendError::RateLimited | BackendError::Timeout
        )
    }
}

/// Content to add to a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentIdentifier {
    /// Add via magnet URI.
    Magnet { uri: String },
    /// Add via a release file URL.
    WebLocator { url: String },
}

impl ContentIdentifier {
    pub fn magnet(uri: impl Into<String>) -> Self {
        ContentIdentifier::Magnet { uri: uri.into() }
    }

    pub fn web_locator(url: impl Into<String>) -> Self {
        ContentIdentifier::WebLocator { url: url.into() }
    }
}

/// Result of adding content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    /// Backend-side identifier of the caching job.
    pub id: String,
    /// True when the backend already holds the content.
    pub cached: bool,
}

/// What to resolve into a playable link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkTarget {
    /// Lowercase hex info hash.
    pub info_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub magnet: Option<String>,
    /// Release file URL for web-locator releases.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode: Option<u32>,
    pub media_type: MediaType,
}

impl LinkTarget {
    /// How to hand this target to `add_content`.
    pub fn content(&self) -> Option<ContentIdentifier> {
        match (&self.magnet, &self.link) {
            (Some(uri), _) => Some(ContentIdentifier::magnet(uri.clone())),
            (None, Some(url)) => Some(ContentIdentifier::web_locator(url.clone())),
            (None, None) => None,
        }
    }
}

/// Outcome of asking a backend for a direct link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Final, cacheable URL.
    Ready(String),
    /// Content is still being cached; nothing to play yet.
    NotReady,
    /// A short-lived URL while caching continues.
    Provisional(String),
}

/// Trait for cached-content backends.
#[async_trait]
pub trait DebridBackend: Send + Sync {
    /// Which provider this is.
    fn kind(&self) -> BackendKind;

    /// Start caching content.
    async fn add_content(&self, content: &ContentIdentifier) -> Result<JobHandle, BackendError>;

    /// Check which of `hashes` are cached. The payload shape is backend specific.
    async fn check_availability(
        &self,
        hashes: &[String],
    ) -> Result<AvailabilityReport, BackendError>;

    /// Resolve a target into a playable URL.
    async fn resolve_direct_link(&self, target: &LinkTarget) -> Result<Resolution, BackendError>;
}
