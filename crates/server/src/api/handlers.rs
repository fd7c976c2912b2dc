use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use cachelink_core::SanitizedConfig;
use tracing::warn;

use crate::metrics::{collect_dynamic_metrics, encode_metrics};
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub coordination: String,
}

/// Liveness plus a coordination store ping.
///
/// Playback refuses to resolve without the store, so an unreachable store
/// reports `degraded`.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let (status, coordination) = match state.coordination().ping().await {
        Ok(()) => ("ok", "ok"),
        Err(e) => {
            warn!(error = %e, "Coordination store ping failed");
            ("degraded", "unavailable")
        }
    };

    Json(HealthResponse {
        status: status.to_string(),
        coordination: coordination.to_string(),
    })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<SanitizedConfig> {
    Json(state.sanitized_config())
}

/// Prometheus text exposition.
pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    collect_dynamic_metrics(&state);
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        encode_metrics(),
    )
}
