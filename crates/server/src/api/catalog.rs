//! Catalog API handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use tracing::info;

use cachelink_core::{CachedRelease, CatalogStats};

use super::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub message: String,
}

/// GET /api/v1/catalog/stats
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CatalogStats>, ApiError> {
    Ok(Json(state.catalog().stats()?))
}

/// GET /api/v1/catalog/{hash}
///
/// Get a stored public release by info hash.
pub async fn get_entry(
    State(state): State<Arc<AppState>>,
    Path(hash): Path<String>,
) -> Result<Json<CachedRelease>, ApiError> {
    Ok(Json(state.catalog().get(&hash)?))
}

/// DELETE /api/v1/catalog/{hash}
///
/// Forget a stored release.
pub async fn remove_entry(
    State(state): State<Arc<AppState>>,
    Path(hash): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    state.catalog().remove(&hash)?;
    info!(hash = %hash, "Removed release from catalog");
    Ok(Json(SuccessResponse {
        message: format!("Removed {} from catalog", hash),
    }))
}
