//! Stream search API handler.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use cachelink_core::{RequestedMedia, SearchResult, UserConfig};

use super::error::ApiError;
use super::middleware::AuthUser;
use crate::state::AppState;

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    /// Encoded user config to embed in the playback URLs.
    #[serde(default)]
    pub config: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub media: RequestedMedia,
    pub results: Vec<SearchResult>,
    pub total: usize,
    pub duration_ms: u64,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/v1/search
///
/// Find playable releases for a movie or episode.
pub async fn search(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Query(params): Query<SearchParams>,
    Json(media): Json<RequestedMedia>,
) -> Result<Json<SearchResponse>, ApiError> {
    let user = match params.config.as_deref() {
        Some(blob) => UserConfig::decode(blob)?,
        None => UserConfig::default(),
    };

    let start = Instant::now();
    let results = state.search().search(&media, &user).await?;
    let duration_ms = start.elapsed().as_millis() as u64;

    info!(
        user = %user_id,
        media_id = %media.id,
        results = results.len(),
        duration_ms,
        "Search completed"
    );

    Ok(Json(SearchResponse {
        total: results.len(),
        media,
        results,
        duration_ms,
    }))
}
