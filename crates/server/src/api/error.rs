//! Mapping of domain errors to HTTP responses.

use std::time::Duration;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{error, warn};

use cachelink_core::{
    AuthError, CatalogError, PlaybackError, ProxyError, QueryError, SearchError,
};

/// Seconds a client is asked to wait after a 503.
const RETRY_AFTER_SECS: u64 = 5;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub retryable: bool,
}

#[derive(Debug)]
pub enum ApiError {
    Playback(PlaybackError),
    Proxy(ProxyError),
    Search(SearchError),
    Catalog(CatalogError),
    Auth(AuthError),
    RateLimited { retry_after: Duration },
}

impl From<PlaybackError> for ApiError {
    fn from(e: PlaybackError) -> Self {
        ApiError::Playback(e)
    }
}

impl From<QueryError> for ApiError {
    fn from(e: QueryError) -> Self {
        ApiError::Playback(PlaybackError::InvalidQuery(e))
    }
}

impl From<ProxyError> for ApiError {
    fn from(e: ProxyError) -> Self {
        ApiError::Proxy(e)
    }
}

impl From<SearchError> for ApiError {
    fn from(e: SearchError) -> Self {
        ApiError::Search(e)
    }
}

impl From<CatalogError> for ApiError {
    fn from(e: CatalogError) -> Self {
        ApiError::Catalog(e)
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        ApiError::Auth(e)
    }
}

impl ApiError {
    /// Status, message and retryability for this error.
    fn parts(&self) -> (StatusCode, String, bool) {
        match self {
            ApiError::Playback(e) => {
                let status = match e {
                    PlaybackError::CoordinationUnavailable(_) | PlaybackError::Timeout => {
                        StatusCode::SERVICE_UNAVAILABLE
                    }
                    PlaybackError::NoMatch => StatusCode::NOT_FOUND,
                    PlaybackError::Upstream(_) => StatusCode::BAD_GATEWAY,
                    PlaybackError::BackendNotConfigured(_) | PlaybackError::InvalidQuery(_) => {
                        StatusCode::BAD_REQUEST
                    }
                };
                let message = match e {
                    PlaybackError::NoMatch => "content not found for this request".to_string(),
                    other => other.to_string(),
                };
                (status, message, e.is_retryable())
            }
            ApiError::Proxy(e) => {
                let retryable = matches!(e, ProxyError::Request(_));
                (StatusCode::BAD_GATEWAY, e.to_string(), retryable)
            }
            ApiError::Search(e) => match e {
                SearchError::NoIndexers => {
                    (StatusCode::SERVICE_UNAVAILABLE, e.to_string(), false)
                }
                SearchError::AllIndexersFailed(_) => (StatusCode::BAD_GATEWAY, e.to_string(), true),
                SearchError::InvalidMedia(_) => (StatusCode::BAD_REQUEST, e.to_string(), false),
                SearchError::Reconcile(_) | SearchError::Encoding(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string(), false)
                }
            },
            ApiError::Catalog(e) => match e {
                CatalogError::NotFound(hash) => (
                    StatusCode::NOT_FOUND,
                    format!("Release not found: {}", hash),
                    false,
                ),
                other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string(), false),
            },
            ApiError::Auth(e) => match e {
                AuthError::NotAuthenticated | AuthError::InvalidCredentials(_) => {
                    (StatusCode::UNAUTHORIZED, e.to_string(), false)
                }
                AuthError::ConfigurationError(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string(), false)
                }
            },
            ApiError::RateLimited { .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                "too many requests".to_string(),
                true,
            ),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.parts().0
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, retryable) = self.parts();

        if status.is_server_error() {
            error!(status = status.as_u16(), error = %message, "Request failed");
        } else {
            warn!(status = status.as_u16(), error = %message, "Request rejected");
        }

        let mut response = (
            status,
            Json(ErrorResponse {
                error: message,
                retryable,
            }),
        )
            .into_response();

        if let ApiError::RateLimited { retry_after } = self {
            // Round up so clients never come back early.
            let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs.max(1)));
        } else if status == StatusCode::SERVICE_UNAVAILABLE && retryable {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(RETRY_AFTER_SECS));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cachelink_core::{BackendError, CoordinationError};

    #[test]
    fn test_playback_status_mapping() {
        let cases = [
            (PlaybackError::Timeout, StatusCode::SERVICE_UNAVAILABLE),
            (
                PlaybackError::CoordinationUnavailable(CoordinationError::Unavailable(
                    "down".into(),
                )),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (PlaybackError::NoMatch, StatusCode::NOT_FOUND),
            (
                PlaybackError::Upstream(BackendError::ApiError("boom".into())),
                StatusCode::BAD_GATEWAY,
            ),
            (
                PlaybackError::BackendNotConfigured("XX".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                PlaybackError::InvalidQuery(QueryError::MissingHash),
                StatusCode::BAD_REQUEST,
            ),
        ];
        for (error, expected) in cases {
            assert_eq!(ApiError::from(error).status(), expected);
        }
    }

    #[test]
    fn test_timeout_sets_retry_after() {
        let response = ApiError::from(PlaybackError::Timeout).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()[header::RETRY_AFTER], "5");
    }

    #[test]
    fn test_no_match_has_no_retry_after() {
        let response = ApiError::from(PlaybackError::NoMatch).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().get(header::RETRY_AFTER).is_none());
    }

    #[test]
    fn test_auth_errors_are_unauthorized() {
        assert_eq!(
            ApiError::from(AuthError::NotAuthenticated).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(AuthError::InvalidCredentials("bad".into())).status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_rate_limited_reports_wait() {
        let response = ApiError::RateLimited {
            retry_after: Duration::from_millis(41_200),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "42");
    }

    #[test]
    fn test_catalog_not_found() {
        assert_eq!(
            ApiError::from(CatalogError::NotFound("abc".into())).status(),
            StatusCode::NOT_FOUND
        );
    }
}
