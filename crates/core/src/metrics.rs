//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Search (indexer queries, catalog writes, result cache)
//! - Availability reconciliation
//! - Playback coalescing, rate limiting and link resolution
//! - Stream proxying

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Search Metrics
// =============================================================================

/// Searches total by result.
pub static SEARCHES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("cachelink_searches_total", "Total stream searches"),
        &["result"], // "ok", "empty", "failed", "cached"
    )
    .unwrap()
});

/// Indexer query duration in seconds.
pub static INDEXER_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "cachelink_indexer_duration_seconds",
            "Duration of indexer queries",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["indexer", "status"], // status: "success", "error"
    )
    .unwrap()
});

/// Releases returned per search, after deduplication.
pub static SEARCH_RESULTS: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "cachelink_search_results",
            "Number of releases returned per search",
        )
        .buckets(vec![0.0, 1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0]),
    )
    .unwrap()
});

/// Catalog writes by result.
pub static CATALOG_WRITES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("cachelink_catalog_writes_total", "Total catalog writes"),
        &["result"], // "inserted", "updated"
    )
    .unwrap()
});

/// Search result cache lookups by result.
pub static SEARCH_CACHE: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("cachelink_search_cache_total", "Total search result cache lookups"),
        &["result"], // "hit", "miss", "error"
    )
    .unwrap()
});

// =============================================================================
// Availability Metrics
// =============================================================================

/// Availability reports processed by backend and result.
pub static AVAILABILITY_REPORTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "cachelink_availability_reports_total",
            "Total availability reports processed",
        ),
        &["backend", "result"], // "applied", "empty", "malformed", "error"
    )
    .unwrap()
});

/// Releases confirmed cached by backend.
pub static AVAILABILITY_CONFIRMED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "cachelink_availability_confirmed_total",
            "Total releases confirmed cached",
        ),
        &["backend"],
    )
    .unwrap()
});

// =============================================================================
// Playback Metrics
// =============================================================================

/// Lock acquisition attempts by result.
pub static LOCK_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("cachelink_lock_attempts_total", "Total playback lock attempts"),
        &["result"], // "acquired", "contended", "error"
    )
    .unwrap()
});

/// Playback requests by outcome.
pub static PLAYBACK_OUTCOMES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("cachelink_playback_outcomes_total", "Total playback outcomes"),
        &["outcome"],
    )
    .unwrap()
});

/// Time a waiter spent polling for another request's link.
pub static POLL_WAIT_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "cachelink_poll_wait_seconds",
            "Time spent waiting on a concurrent resolution",
        )
        .buckets(vec![0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 30.0, 60.0]),
    )
    .unwrap()
});

/// Playback rate limit decisions.
pub static RATE_LIMIT_DECISIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "cachelink_rate_limit_decisions_total",
            "Total playback rate limit decisions",
        ),
        &["decision"], // "allowed", "limited", "error"
    )
    .unwrap()
});

/// Upstream link resolutions by backend and outcome.
pub static RESOLUTIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("cachelink_resolutions_total", "Total upstream link resolutions"),
        &["backend", "outcome"], // "ready", "provisional", "not_ready", "error"
    )
    .unwrap()
});

// =============================================================================
// Proxy Metrics
// =============================================================================

/// Proxied streams by result.
pub static PROXY_STREAMS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("cachelink_proxy_streams_total", "Total proxied streams"),
        &["result"], // "opened", "request_failed", "upstream_status", "aborted"
    )
    .unwrap()
});

/// Bytes relayed to clients.
pub static PROXY_BYTES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("cachelink_proxy_bytes_total", "Total bytes relayed to clients").unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Search
        Box::new(SEARCHES.clone()),
        Box::new(INDEXER_DURATION.clone()),
        Box::new(SEARCH_RESULTS.clone()),
        Box::new(CATALOG_WRITES.clone()),
        Box::new(SEARCH_CACHE.clone()),
        // Availability
        Box::new(AVAILABILITY_REPORTS.clone()),
        Box::new(AVAILABILITY_CONFIRMED.clone()),
        // Playback
        Box::new(LOCK_ATTEMPTS.clone()),
        Box::new(PLAYBACK_OUTCOMES.clone()),
        Box::new(POLL_WAIT_SECONDS.clone()),
        Box::new(RATE_LIMIT_DECISIONS.clone()),
        Box::new(RESOLUTIONS.clone()),
        // Proxy
        Box::new(PROXY_STREAMS.clone()),
        Box::new(PROXY_BYTES.clone()),
    ]
}
