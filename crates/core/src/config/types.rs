use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::coordination::redact_url;
use crate::playback::{CoalescerSettings, RateLimitSettings};
use crate::proxy::{ProxyPolicy, ProxySettings};
use crate::search::SearchSettings;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub auth: AuthConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub coordination: CoordinationConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    pub method: AuthMethod,
    /// Accepted keys when `method = "api_key"`.
    #[serde(default)]
    pub api_keys: Vec<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    None,
    ApiKey,
}

/// Public catalog database
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("cachelink.db")
}

/// Shared coordination store
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CoordinationConfig {
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            redis_url: default_redis_url(),
        }
    }
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

/// Playback coalescing and proxying
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlaybackConfig {
    #[serde(default = "default_lock_ttl")]
    pub lock_ttl_secs: u64,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_poll_attempts")]
    pub poll_attempts: u32,
    #[serde(default = "default_link_ttl")]
    pub link_ttl_secs: u64,
    #[serde(default = "default_provisional_ttl")]
    pub provisional_ttl_secs: u64,
    #[serde(default = "default_download_flag_ttl")]
    pub download_flag_ttl_secs: u64,
    /// Relay bytes unless a user config says otherwise.
    #[serde(default = "default_proxied")]
    pub proxied: bool,
    /// Service codes whose links are always redirected.
    #[serde(default = "default_redirect_services")]
    pub redirect_services: Vec<String>,
    /// Shown while a download is still being cached.
    #[serde(default)]
    pub not_ready_video_url: Option<String>,
    /// Connect timeout for origin requests.
    #[serde(default = "default_upstream_timeout")]
    pub upstream_timeout_secs: u64,
    #[serde(default = "default_buffer_size")]
    pub proxy_buffer_size: usize,
    #[serde(default = "default_read_size")]
    pub proxy_read_size: usize,
    /// Service code used for playback of releases with no confirmed availability.
    #[serde(default)]
    pub download_service: Option<String>,
    /// Playback requests allowed per caller and window. Zero disables limiting.
    #[serde(default = "default_rate_limit_requests")]
    pub rate_limit_requests: u32,
    #[serde(default = "default_rate_limit_window")]
    pub rate_limit_window_secs: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            lock_ttl_secs: default_lock_ttl(),
            poll_interval_ms: default_poll_interval(),
            poll_attempts: default_poll_attempts(),
            link_ttl_secs: default_link_ttl(),
            provisional_ttl_secs: default_provisional_ttl(),
            download_flag_ttl_secs: default_download_flag_ttl(),
            proxied: default_proxied(),
            redirect_services: default_redirect_services(),
            not_ready_video_url: None,
            upstream_timeout_secs: default_upstream_timeout(),
            proxy_buffer_size: default_buffer_size(),
            proxy_read_size: default_read_size(),
            download_service: None,
            rate_limit_requests: default_rate_limit_requests(),
            rate_limit_window_secs: default_rate_limit_window(),
        }
    }
}

impl PlaybackConfig {
    pub fn coalescer_settings(&self) -> CoalescerSettings {
        CoalescerSettings {
            lock_ttl: Duration::from_secs(self.lock_ttl_secs),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            poll_attempts: self.poll_attempts,
            link_ttl: Duration::from_secs(self.link_ttl_secs),
            provisional_ttl: Duration::from_secs(self.provisional_ttl_secs),
            download_flag_ttl: Duration::from_secs(self.download_flag_ttl_secs),
        }
    }

    pub fn proxy_settings(&self) -> ProxySettings {
        ProxySettings {
            buffer_size: self.proxy_buffer_size,
            read_size: self.proxy_read_size,
        }
    }

    pub fn proxy_policy(&self) -> ProxyPolicy {
        ProxyPolicy {
            proxied_by_default: self.proxied,
            redirect_services: self.redirect_services.clone(),
        }
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    pub fn rate_limit_settings(&self) -> RateLimitSettings {
        RateLimitSettings {
            limit: self.rate_limit_requests,
            window: Duration::from_secs(self.rate_limit_window_secs),
        }
    }
}

fn default_lock_ttl() -> u64 {
    60
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_poll_attempts() -> u32 {
    30
}

fn default_link_ttl() -> u64 {
    3600
}

fn default_provisional_ttl() -> u64 {
    30
}

fn default_download_flag_ttl() -> u64 {
    600
}

fn default_proxied() -> bool {
    true
}

fn default_redirect_services() -> Vec<String> {
    vec!["TB".to_string()]
}

fn default_upstream_timeout() -> u64 {
    30
}

fn default_buffer_size() -> usize {
    1024 * 1024
}

fn default_read_size() -> usize {
    8192
}

fn default_rate_limit_requests() -> u32 {
    20
}

fn default_rate_limit_window() -> u64 {
    60
}

/// Search pipeline
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    /// Base URL written into playback links.
    #[serde(default = "default_public_host")]
    pub public_host: String,
    /// Reuse and persist public releases in the catalog.
    #[serde(default = "default_true")]
    pub catalog_enabled: bool,
    /// Allow the nearest-episode fallback for aggregator reports.
    #[serde(default = "default_true")]
    pub episode_fallback: bool,
    /// Stop querying further indexers once this many distinct releases are
    /// known. Zero queries every indexer concurrently.
    #[serde(default = "default_min_cached_results")]
    pub min_cached_results: usize,
    /// Lifetime of cached search results. Zero disables the cache.
    #[serde(default = "default_result_cache_ttl")]
    pub result_cache_ttl_secs: u64,
    /// Shorter lifetime used when an aggregator backend is configured.
    #[serde(default = "default_aggregator_cache_ttl")]
    pub aggregator_cache_ttl_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            public_host: default_public_host(),
            catalog_enabled: true,
            episode_fallback: true,
            min_cached_results: default_min_cached_results(),
            result_cache_ttl_secs: default_result_cache_ttl(),
            aggregator_cache_ttl_secs: default_aggregator_cache_ttl(),
        }
    }
}

impl SearchConfig {
    pub fn search_settings(&self) -> SearchSettings {
        SearchSettings {
            public_host: self.public_host.trim_end_matches('/').to_string(),
            catalog_enabled: self.catalog_enabled,
            episode_fallback: self.episode_fallback,
            min_cached_results: self.min_cached_results,
            result_cache_ttl: Duration::from_secs(self.result_cache_ttl_secs),
            aggregator_cache_ttl: Duration::from_secs(self.aggregator_cache_ttl_secs),
        }
    }
}

fn default_public_host() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_true() -> bool {
    true
}

fn default_min_cached_results() -> usize {
    5
}

fn default_result_cache_ttl() -> u64 {
    1200
}

fn default_aggregator_cache_ttl() -> u64 {
    600
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub auth: SanitizedAuthConfig,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub coordination: CoordinationConfig,
    pub playback: PlaybackConfig,
    pub search: SearchConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedAuthConfig {
    pub method: AuthMethod,
    pub api_keys_configured: usize,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            auth: SanitizedAuthConfig {
                method: config.auth.method,
                api_keys_configured: config.auth.api_keys.len(),
            },
            server: config.server.clone(),
            database: config.database.clone(),
            coordination: CoordinationConfig {
                redis_url: redact_url(&config.coordination.redis_url),
            },
            playback: config.playback.clone(),
            search: config.search.clone(),
        }
    }
}
