//! Playback endpoint: `/playback/{config}/{query}`.
//!
//! GET is rate limited per caller, resolves (coalesced across identical
//! requests) and then either redirects the client to the link or relays the
//! bytes. HEAD only reports whether a link is ready and never resolves.

use std::net::IpAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, Extensions, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use cachelink_core::{
    ByteRange, PlaybackOutcome, PlaybackQuery, PlaybackRequestKey, PlaybackStatus, ProxyMode,
    RateDecision, UserConfig,
};

use super::error::ApiError;
use super::middleware::{auth_request, client_ip, record_auth_failure};
use crate::state::AppState;

/// Seconds a client should wait before asking again for a pending download.
const PENDING_RETRY_AFTER_SECS: u64 = 10;

#[derive(Debug, Serialize)]
pub struct PendingResponse {
    pub status: &'static str,
    pub retryable: bool,
}

/// GET /playback/{config}/{query}
pub async fn play(
    State(state): State<Arc<AppState>>,
    Path((config, query)): Path<(String, String)>,
    headers: HeaderMap,
    extensions: Extensions,
) -> Result<Response, ApiError> {
    let user = UserConfig::decode(&config)?;
    let query = PlaybackQuery::decode(&query)?;
    let ip = client_ip(&headers, &extensions);
    authenticate(&state, &headers, ip, &user).await?;

    let identity = user.identity(&ip.to_string());
    enforce_rate_limit(&state, &identity).await?;

    let key = PlaybackRequestKey::for_query(identity, &query)?;
    debug!(key = %key.digest(), hash = %query.info_hash, service = %query.service, "Playback request");

    let outcome = state
        .coalescer()
        .resolve(&key, &query, state.resolver())
        .await?;

    match outcome {
        PlaybackOutcome::Ready(url) => deliver(&state, &user, &query, url, &headers, false).await,
        PlaybackOutcome::Provisional(url) => {
            deliver(&state, &user, &query, url, &headers, true).await
        }
        PlaybackOutcome::Pending => Ok(pending(&state)),
    }
}

/// HEAD /playback/{config}/{query}
pub async fn head_status(
    State(state): State<Arc<AppState>>,
    Path((config, query)): Path<(String, String)>,
    headers: HeaderMap,
    extensions: Extensions,
) -> Response {
    let (user, query) = match (UserConfig::decode(&config), PlaybackQuery::decode(&query)) {
        (Ok(user), Ok(query)) => (user, query),
        _ => return StatusCode::BAD_REQUEST.into_response(),
    };
    let ip = client_ip(&headers, &extensions);
    if let Err(e) = authenticate(&state, &headers, ip, &user).await {
        return e.status().into_response();
    }
    let key = match PlaybackRequestKey::for_query(user.identity(&ip.to_string()), &query) {
        Ok(key) => key,
        Err(_) => return StatusCode::BAD_REQUEST.into_response(),
    };

    match state.coalescer().status(&key).await {
        Ok(PlaybackStatus::Ready) => ready_head(&state, &user, &query, &key).await,
        Ok(PlaybackStatus::InProgress) | Ok(PlaybackStatus::Unknown) => {
            StatusCode::ACCEPTED.into_response()
        }
        Err(e) => {
            warn!(error = %e, "Playback status unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [(header::RETRY_AFTER, HeaderValue::from(5u64))],
            )
                .into_response()
        }
    }
}

/// 200 for a ready link. Relayed links also report the origin's length.
async fn ready_head(
    state: &AppState,
    user: &UserConfig,
    query: &PlaybackQuery,
    key: &PlaybackRequestKey,
) -> Response {
    if state.proxy_policy().mode(user.proxied, &query.service) == ProxyMode::Redirect {
        return StatusCode::OK.into_response();
    }

    let url = match state.coalescer().cached_link(key).await {
        Ok(Some(url)) => url,
        _ => return StatusCode::OK.into_response(),
    };

    let mut response = StatusCode::OK.into_response();
    let headers = response.headers_mut();
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    match state.proxy().head(&url).await {
        Ok(origin) if origin.status.is_success() => {
            if let Some(length) = origin.content_length {
                headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
            }
        }
        Ok(origin) => debug!(status = origin.status.as_u16(), "Origin HEAD refused"),
        Err(e) => debug!(error = %e, "Origin HEAD failed"),
    }
    response
}

async fn authenticate(
    state: &AppState,
    headers: &HeaderMap,
    ip: IpAddr,
    user: &UserConfig,
) -> Result<(), ApiError> {
    let authenticator = state.authenticator();
    if !authenticator.requires_credentials() {
        return Ok(());
    }

    let request = auth_request(headers, ip).with_url_key(user.api_key.clone());
    match authenticator.authenticate(&request).await {
        Ok(_) => Ok(()),
        Err(e) => {
            record_auth_failure(&e);
            Err(e.into())
        }
    }
}

/// Store failures let the request through.
async fn enforce_rate_limit(state: &AppState, identity: &str) -> Result<(), ApiError> {
    match state.rate_limiter().check(identity).await {
        Ok(RateDecision::Allowed { .. }) => Ok(()),
        Ok(RateDecision::Limited { retry_after }) => Err(ApiError::RateLimited { retry_after }),
        Err(e) => {
            warn!(error = %e, "Rate limit check failed, allowing request");
            Ok(())
        }
    }
}

/// Hand a resolved link to the client, by redirect or relay.
async fn deliver(
    state: &AppState,
    user: &UserConfig,
    query: &PlaybackQuery,
    url: String,
    headers: &HeaderMap,
    provisional: bool,
) -> Result<Response, ApiError> {
    match state.proxy_policy().mode(user.proxied, &query.service) {
        ProxyMode::Redirect => {
            let status = if provisional {
                StatusCode::FOUND
            } else {
                StatusCode::MOVED_PERMANENTLY
            };
            debug!(service = %query.service, status = status.as_u16(), "Redirecting to link");
            Ok(redirect(status, &url))
        }
        ProxyMode::Relay => {
            let range = headers
                .get(header::RANGE)
                .and_then(|v| v.to_str().ok())
                .and_then(ByteRange::parse);
            relay(state, &url, range).await
        }
    }
}

async fn relay(state: &AppState, url: &str, range: Option<ByteRange>) -> Result<Response, ApiError> {
    let upstream = state.proxy().open(url, range).await?;
    info!(
        status = upstream.status.as_u16(),
        range = ?range.map(|r| r.to_string()),
        "Relaying stream"
    );

    let mut headers = upstream.headers;
    headers
        .entry(header::CONTENT_TYPE)
        .or_insert(HeaderValue::from_static("video/mp4"));
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));

    let mut response = Response::new(Body::from_stream(upstream.body));
    *response.status_mut() = upstream.status;
    *response.headers_mut() = headers;
    Ok(response)
}

fn pending(state: &AppState) -> Response {
    if let Some(url) = state.config().playback.not_ready_video_url.as_deref() {
        return redirect(StatusCode::FOUND, url);
    }

    (
        StatusCode::ACCEPTED,
        [(header::RETRY_AFTER, HeaderValue::from(PENDING_RETRY_AFTER_SECS))],
        Json(PendingResponse {
            status: "caching",
            retryable: true,
        }),
    )
        .into_response()
}

fn redirect(status: StatusCode, url: &str) -> Response {
    match HeaderValue::from_str(url) {
        Ok(location) => (status, [(header::LOCATION, location)]).into_response(),
        Err(_) => {
            warn!("Resolved link is not a valid header value");
            StatusCode::BAD_GATEWAY.into_response()
        }
    }
}
