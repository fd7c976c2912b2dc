//! Indexer search abstraction.
//!
//! Indexers return raw hits for a requested media; the release store turns
//! them into descriptors.

use async_trait::async_trait;
use thiserror::Error;

use crate::media::RequestedMedia;
use crate::release::RawRelease;

/// Errors that can occur while querying an indexer.
#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("Indexer connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Indexer API error: {0}")]
    ApiError(String),

    #[error("Rate limited for indexer {indexer}, retry in {retry_after_ms}ms")]
    RateLimited {
        indexer: String,
        retry_after_ms: u64,
    },

    #[error("Request timeout")]
    Timeout,
}

/// Trait for indexer search clients.
#[async_trait]
pub trait Indexer: Send + Sync {
    /// Indexer name, recorded on every hit.
    fn name(&self) -> &str;

    /// Lower values win when two indexers return the same release.
    fn priority(&self) -> u32;

    async fn search(&self, media: &RequestedMedia) -> Result<Vec<RawRelease>, IndexerError>;
}
