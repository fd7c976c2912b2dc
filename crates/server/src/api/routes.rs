use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::middleware::{auth_middleware, metrics_middleware};
use super::{catalog, handlers, playback, search};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes behind the configured authenticator
    let protected = Router::new()
        .route("/config", get(handlers::get_config))
        // Search
        .route("/search", post(search::search))
        // Catalog (public release cache)
        .route("/catalog/stats", get(catalog::get_stats))
        .route(
            "/catalog/{hash}",
            get(catalog::get_entry).delete(catalog::remove_entry),
        )
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth_middleware,
        ));

    let api_routes = Router::new()
        .route("/health", get(handlers::health))
        .merge(protected);

    Router::new()
        .nest("/api/v1", api_routes)
        // Playback authenticates through the key in its config segment
        .route(
            "/playback/{config}/{query}",
            get(playback::play).head(playback::head_status),
        )
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
