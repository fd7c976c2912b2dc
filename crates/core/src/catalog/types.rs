//! Types for the public release catalog.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::release::{MediaType, ReleaseDescriptor};

/// A persisted public release.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedRelease {
    pub descriptor: ReleaseDescriptor,
    /// When first stored.
    pub first_seen_at: DateTime<Utc>,
    /// When last overwritten.
    pub updated_at: DateTime<Utc>,
}

/// Query for looking up catalog entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogQuery {
    /// Matched against the raw title (case-insensitive substring).
    pub title: String,
    /// Restrict to one indexer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<MediaType>,
    /// Maximum results.
    #[serde(default = "default_limit")]
    pub limit: u32,
}

impl CatalogQuery {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            indexer: None,
            media_type: None,
            limit: default_limit(),
        }
    }

    pub fn with_indexer(mut self, indexer: impl Into<String>) -> Self {
        self.indexer = Some(indexer.into());
        self
    }

    pub fn with_media_type(mut self, media_type: MediaType) -> Self {
        self.media_type = Some(media_type);
        self
    }
}

fn default_limit() -> u32 {
    100
}

/// Catalog statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogStats {
    pub total_releases: u64,
    pub movies: u64,
    pub series: u64,
    /// Sum of release sizes in bytes.
    pub total_size_bytes: u64,
    pub unique_indexers: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest_entry: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newest_entry: Option<DateTime<Utc>>,
}

/// Errors for catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
