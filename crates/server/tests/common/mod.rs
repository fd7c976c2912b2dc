//! Common test utilities for in-process HTTP testing with mocks.
//!
//! This module provides a test fixture that builds the full router with
//! mock backends, a mock indexer and an in-memory coordination store, so the
//! HTTP surface can be exercised without Redis or real debrid services.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use cachelink_core::{
    create_authenticator, load_config_from_str, testing::MemoryCoordinationStore,
    testing::MockBackend, testing::MockIndexer, AuthConfig, AuthMethod, Authenticator,
    BackendKind, BackendRegistry, BackendResolver, Config, CoordinationStore, DebridBackend,
    Indexer, MediaType, PatternParser, PlaybackQuery, Privacy, ReleaseCatalog, SqliteCatalog,
    StreamProxy, StreamSearch, UserConfig,
};
use cachelink_server::{api::create_router, state::AppState};

/// Re-export fixtures for test convenience
pub use cachelink_core::testing::fixtures;

pub const HASH: &str = "0123456789abcdef0123456789abcdef01234567";

/// Bytes served by the local origin.
pub const ORIGIN_PAYLOAD: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Test fixture with mock dependencies.
///
/// - `backend`: a Real-Debrid mock, also the download service
/// - `indexer`: a mock indexer feeding the search endpoint
/// - `store`: in-memory coordination store with an outage toggle
pub struct TestFixture {
    pub router: Router,
    pub backend: Arc<MockBackend>,
    pub indexer: Arc<MockIndexer>,
    pub store: Arc<MemoryCoordinationStore>,
    pub catalog: Arc<SqliteCatalog>,
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub bytes: Bytes,
    pub body: Value,
}

/// Configuration for test fixture.
#[derive(Debug, Clone)]
pub struct TestConfig {
    pub api_keys: Vec<String>,
    pub proxied: bool,
    pub not_ready_video_url: Option<String>,
    pub poll_interval_ms: u64,
    pub poll_attempts: u32,
    pub rate_limit_requests: u32,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            api_keys: Vec::new(),
            proxied: true,
            not_ready_video_url: None,
            poll_interval_ms: 10,
            poll_attempts: 50,
            rate_limit_requests: 20,
        }
    }
}

impl TestConfig {
    pub fn with_api_key(key: &str) -> Self {
        Self {
            api_keys: vec![key.to_string()],
            ..Default::default()
        }
    }

    pub fn redirecting() -> Self {
        Self {
            proxied: false,
            ..Default::default()
        }
    }
}

impl TestFixture {
    pub async fn new() -> Self {
        Self::with_config(TestConfig::default()).await
    }

    pub async fn with_config(test_config: TestConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("catalog.db");

        let mut config: Config =
            load_config_from_str("[auth]\nmethod = \"none\"\n").expect("Failed to parse config");
        if !test_config.api_keys.is_empty() {
            config.auth = AuthConfig {
                method: AuthMethod::ApiKey,
                api_keys: test_config.api_keys.clone(),
            };
        }
        config.database.path = db_path.clone();
        config.playback.proxied = test_config.proxied;
        config.playback.not_ready_video_url = test_config.not_ready_video_url.clone();
        config.playback.poll_interval_ms = test_config.poll_interval_ms;
        config.playback.poll_attempts = test_config.poll_attempts;
        config.playback.rate_limit_requests = test_config.rate_limit_requests;
        config.playback.download_service = Some("RD".to_string());
        config.search.public_host = "http://cachelink.test".to_string();

        let backend = Arc::new(MockBackend::new(BackendKind::RealDebrid));
        let indexer = Arc::new(MockIndexer::new("mock-indexer", 1));
        let store = Arc::new(MemoryCoordinationStore::new());
        let catalog = Arc::new(SqliteCatalog::new(&db_path).expect("Failed to create catalog"));

        let mut registry = BackendRegistry::new();
        registry.register(Arc::clone(&backend) as Arc<dyn DebridBackend>);
        assert!(registry.set_download_service("RD"));
        let registry = Arc::new(registry);

        let search = StreamSearch::new(
            vec![Arc::clone(&indexer) as Arc<dyn Indexer>],
            Arc::clone(&registry),
            Arc::new(PatternParser::new()),
            config.search.search_settings(),
        )
        .with_catalog(Arc::clone(&catalog) as Arc<dyn ReleaseCatalog>);

        let authenticator: Arc<dyn Authenticator> = Arc::from(
            create_authenticator(&config.auth).expect("Failed to create authenticator"),
        );
        let proxy = StreamProxy::new(reqwest::Client::new(), config.playback.proxy_settings());

        let state = Arc::new(AppState::new(
            config,
            authenticator,
            Arc::clone(&catalog) as Arc<dyn ReleaseCatalog>,
            Arc::clone(&store) as Arc<dyn CoordinationStore>,
            Arc::new(BackendResolver::new(registry)),
            proxy,
            Arc::new(search),
        ));

        Self {
            router: create_router(state),
            backend,
            indexer,
            store,
            catalog,
            temp_dir,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.send(Request::get(path).body(Body::empty()).unwrap())
            .await
    }

    /// Send a HEAD request to the test server.
    pub async fn head(&self, path: &str) -> TestResponse {
        self.send(Request::head(path).body(Body::empty()).unwrap())
            .await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.send(Request::delete(path).body(Body::empty()).unwrap())
            .await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        let request = Request::post(path)
            .header("Content-Type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        self.send(request).await
    }

    /// Send an arbitrary request.
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        TestResponse {
            status,
            headers,
            bytes,
            body,
        }
    }
}

/// A movie query played through `service`.
pub fn movie_query(service: &str) -> PlaybackQuery {
    PlaybackQuery {
        info_hash: HASH.to_string(),
        magnet: Some(format!("magnet:?xt=urn:btih:{}", HASH)),
        link: None,
        file_index: Some(1),
        season: None,
        episode: None,
        media_type: MediaType::Movie,
        service: service.to_string(),
        privacy: Privacy::Public,
    }
}

/// Playback path for `query` with default user settings.
pub fn playback_path(query: &PlaybackQuery) -> String {
    format!("/playback/-/{}", query.encode().unwrap())
}

/// Playback path carrying a user config.
pub fn playback_path_with(user: &UserConfig, query: &PlaybackQuery) -> String {
    format!(
        "/playback/{}/{}",
        user.encode().unwrap(),
        query.encode().unwrap()
    )
}

async fn origin_media(headers: HeaderMap) -> Response {
    let range = headers
        .get("range")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("bytes="))
        .and_then(|v| v.split_once('-'))
        .and_then(|(start, end)| Some((start.parse::<usize>().ok()?, end.parse::<usize>().ok()?)));

    match range {
        Some((start, end)) if start <= end && end < ORIGIN_PAYLOAD.len() => (
            StatusCode::PARTIAL_CONTENT,
            [
                (
                    "content-range",
                    format!("bytes {}-{}/{}", start, end, ORIGIN_PAYLOAD.len()),
                ),
                ("content-type", "video/x-matroska".to_string()),
                ("etag", "\"v1\"".to_string()),
            ],
            ORIGIN_PAYLOAD[start..=end].to_vec(),
        )
            .into_response(),
        _ => (
            [
                ("content-type", "video/x-matroska".to_string()),
                ("etag", "\"v1\"".to_string()),
            ],
            ORIGIN_PAYLOAD.to_vec(),
        )
            .into_response(),
    }
}

async fn origin_gone() -> StatusCode {
    StatusCode::GONE
}

/// Start a local origin serving `/media` (range aware) and `/gone` (410).
pub async fn spawn_origin() -> String {
    let app = Router::new()
        .route("/media", get(origin_media))
        .route("/gone", get(origin_gone));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {{
        let response = &$response;
        assert_eq!(
            response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            response.status,
            serde_json::to_string_pretty(&response.body).unwrap_or_default()
        );
    }};
}

/// Helper to assert a JSON path equals expected value.
#[macro_export]
macro_rules! assert_json_path {
    ($json:expr, $path:expr, $expected:expr) => {
        let actual = &$json[$path];
        assert_eq!(
            actual, &$expected,
            "Path '{}' expected {:?}, got {:?}",
            $path, $expected, actual
        );
    };
}
