//! Stream search: from a requested media to playable candidates.
//!
//! Previously seen public releases come from the catalog first. Indexers are
//! then queried in priority order until enough distinct releases are known
//! (or all at once when no minimum is set), their hits normalized and merged
//! with the catalog matches, and every configured backend is asked which of
//! the still-unconfirmed hashes it holds. The surviving releases come back
//! with self-contained playback URLs. Finished searches are cached per user
//! and media in the coordination store.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::availability::{BackendKind, ReconcileError, Reconciler};
use crate::backend::BackendRegistry;
use crate::catalog::{CatalogQuery, ReleaseCatalog};
use crate::coordination::CoordinationStore;
use crate::indexer::{Indexer, IndexerError};
use crate::matcher::FallbackPolicy;
use crate::media::{MediaError, RequestedMedia};
use crate::metrics;
use crate::playback::{PlaybackQuery, QueryError, UserConfig};
use crate::release::{
    extract_info_hash, RawRelease, ReleaseDescriptor, ReleaseStore, TitleParser,
};

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("No indexer configured")]
    NoIndexers,

    #[error("All indexers failed: {0}")]
    AllIndexersFailed(String),

    #[error("Invalid requested media: {0}")]
    InvalidMedia(#[from] MediaError),

    #[error("Reconciliation failed: {0}")]
    Reconcile(#[from] ReconcileError),

    #[error("Failed to build playback URL: {0}")]
    Encoding(#[from] QueryError),
}

/// One offered release.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub release: ReleaseDescriptor,
    /// Service the playback URL goes through.
    pub service: String,
    pub playback_url: String,
}

#[derive(Debug, Clone)]
pub struct SearchSettings {
    /// Base URL of this service, used in playback URLs.
    pub public_host: String,
    pub catalog_enabled: bool,
    pub episode_fallback: bool,
    /// Distinct releases after which no further indexer is queried.
    /// Zero queries every indexer concurrently.
    pub min_cached_results: usize,
    /// Zero disables the result cache.
    pub result_cache_ttl: Duration,
    /// Used instead of `result_cache_ttl` when an aggregator backend is configured.
    pub aggregator_cache_ttl: Duration,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            public_host: "http://127.0.0.1:8080".to_string(),
            catalog_enabled: true,
            episode_fallback: true,
            min_cached_results: 5,
            result_cache_ttl: Duration::from_secs(1200),
            aggregator_cache_ttl: Duration::from_secs(600),
        }
    }
}

type IndexerOutcome = (String, Result<Vec<RawRelease>, IndexerError>);

pub struct StreamSearch {
    indexers: Vec<Arc<dyn Indexer>>,
    registry: Arc<BackendRegistry>,
    parser: Arc<dyn TitleParser>,
    catalog: Option<Arc<dyn ReleaseCatalog>>,
    result_cache: Option<Arc<dyn CoordinationStore>>,
    settings: SearchSettings,
}

impl StreamSearch {
    pub fn new(
        indexers: Vec<Arc<dyn Indexer>>,
        registry: Arc<BackendRegistry>,
        parser: Arc<dyn TitleParser>,
        settings: SearchSettings,
    ) -> Self {
        let mut indexers = indexers;
        // Stable, so equal priorities keep their configured order.
        indexers.sort_by_key(|indexer| indexer.priority());
        Self {
            indexers,
            registry,
            parser,
            catalog: None,
            result_cache: None,
            settings,
        }
    }

    pub fn with_catalog(mut self, catalog: Arc<dyn ReleaseCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn with_result_cache(mut self, store: Arc<dyn CoordinationStore>) -> Self {
        self.result_cache = Some(store);
        self
    }

    pub fn indexer_count(&self) -> usize {
        self.indexers.len()
    }

    pub async fn search(
        &self,
        media: &RequestedMedia,
        user: &UserConfig,
    ) -> Result<Vec<SearchResult>, SearchError> {
        if self.indexers.is_empty() {
            return Err(SearchError::NoIndexers);
        }
        let target = media.episode_target()?;
        let media_type = media.media_type();

        let cache_key = result_cache_key(user, media);
        if let Some(cached) = self.cached_results(&cache_key).await {
            info!(media = %media.id, results = cached.len(), "Serving cached search results");
            metrics::SEARCHES.with_label_values(&["cached"]).inc();
            return Ok(cached);
        }

        let known = self.catalog_matches(media);
        let raw = match self.query_indexers(media, &known).await {
            Ok(raw) => raw,
            Err(e) => {
                metrics::SEARCHES.with_label_values(&["failed"]).inc();
                return Err(e);
            }
        };

        let mut store = ReleaseStore::new(self.parser.clone());
        for indexer in &self.indexers {
            store.set_priority(indexer.name(), indexer.priority());
        }
        let mut descriptors = store.normalize_all(raw, media_type);
        let fresh = descriptors.len();
        descriptors.extend(known);

        let policy = if self.settings.episode_fallback {
            FallbackPolicy::NearestEpisode
        } else {
            FallbackPolicy::Disabled
        };
        let mut reconciler = Reconciler::new(descriptors, media.clone(), self.parser.clone())?
            .with_fallback_policy(policy);
        info!(
            media = %media.id,
            fresh,
            total = reconciler.len(),
            "Collected candidate releases"
        );

        for backend in self.registry.all() {
            let hashes = reconciler.unavailable_hashes();
            if hashes.is_empty() {
                break;
            }
            let kind = backend.kind();
            match backend.check_availability(&hashes).await {
                Ok(report) => {
                    reconciler.update_availability(&report, &kind, media)?;
                }
                Err(e) => {
                    warn!(backend = %kind, error = %e, "Availability check failed, skipping backend");
                }
            }
        }

        self.persist(&reconciler);

        let mut best = reconciler.best_matching();
        for release in best.iter_mut() {
            let Some(code) = release.availability.as_deref() else {
                continue;
            };
            if self.registry.get(code).is_none() {
                warn!(
                    hash = %release.info_hash,
                    service = %code,
                    "Confirmed by an unregistered service, offering as download"
                );
                release.availability = None;
            }
        }
        // Confirmed releases first; order is otherwise kept.
        best.sort_by_key(|d| d.availability.is_none());

        let config_segment = if *user == UserConfig::default() {
            "-".to_string()
        } else {
            user.encode()?
        };
        let host = self.settings.public_host.trim_end_matches('/');

        let mut results = Vec::with_capacity(best.len());
        for release in best {
            let query = PlaybackQuery::for_descriptor(&release, target);
            let playback_url = format!("{}/playback/{}/{}", host, config_segment, query.encode()?);
            results.push(SearchResult {
                service: query.service,
                release,
                playback_url,
            });
        }

        let label = if results.is_empty() { "empty" } else { "ok" };
        metrics::SEARCHES.with_label_values(&[label]).inc();
        metrics::SEARCH_RESULTS.observe(results.len() as f64);
        info!(media = %media.id, results = results.len(), "Search complete");

        if !results.is_empty() {
            self.cache_results(&cache_key, &results).await;
        }
        Ok(results)
    }

    /// Lifetime of cached results, `None` when caching is off.
    fn result_cache_ttl(&self) -> Option<Duration> {
        if self.result_cache.is_none() || self.settings.result_cache_ttl.is_zero() {
            return None;
        }
        let has_aggregator = self
            .registry
            .all()
            .any(|backend| matches!(backend.kind(), BackendKind::StremThru { .. }));
        let ttl = if has_aggregator {
            self.settings.aggregator_cache_ttl
        } else {
            self.settings.result_cache_ttl
        };
        (!ttl.is_zero()).then_some(ttl)
    }

    async fn cached_results(&self, key: &str) -> Option<Vec<SearchResult>> {
        self.result_cache_ttl()?;
        let store = self.result_cache.as_ref()?;

        let raw = match store.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                metrics::SEARCH_CACHE.with_label_values(&["miss"]).inc();
                return None;
            }
            Err(e) => {
                warn!(error = %e, "Search cache lookup failed");
                metrics::SEARCH_CACHE.with_label_values(&["error"]).inc();
                return None;
            }
        };

        match serde_json::from_str::<Vec<SearchResult>>(&raw) {
            Ok(results) => {
                metrics::SEARCH_CACHE.with_label_values(&["hit"]).inc();
                Some(results)
            }
            Err(e) => {
                warn!(error = %e, "Discarding unreadable cached search results");
                metrics::SEARCH_CACHE.with_label_values(&["error"]).inc();
                if let Err(e) = store.delete(key).await {
                    warn!(error = %e, "Failed to drop cached search results");
                }
                None
            }
        }
    }

    async fn cache_results(&self, key: &str, results: &[SearchResult]) {
        let (Some(store), Some(ttl)) = (&self.result_cache, self.result_cache_ttl()) else {
            return;
        };
        let encoded = match serde_json::to_string(results) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!(error = %e, "Failed to encode search results for caching");
                return;
            }
        };
        match store.set(key, &encoded, ttl).await {
            Ok(()) => debug!(ttl_secs = ttl.as_secs(), "Cached search results"),
            Err(e) => warn!(error = %e, "Failed to cache search results"),
        }
    }

    async fn query_indexers(
        &self,
        media: &RequestedMedia,
        known: &[ReleaseDescriptor],
    ) -> Result<Vec<RawRelease>, SearchError> {
        let min = self.settings.min_cached_results;
        let outcomes = if min == 0 {
            join_all(self.indexers.iter().map(|indexer| run_indexer(indexer, media))).await
        } else {
            let mut seen: HashSet<String> =
                known.iter().map(|d| d.info_hash.clone()).collect();
            let mut outcomes = Vec::new();
            for indexer in &self.indexers {
                if !outcomes.is_empty() && seen.len() >= min {
                    info!(
                        known = seen.len(),
                        min,
                        skipped = self.indexers.len() - outcomes.len(),
                        "Enough releases, skipping remaining indexers"
                    );
                    break;
                }
                let outcome = run_indexer(indexer, media).await;
                if let Ok(hits) = &outcome.1 {
                    seen.extend(hits.iter().filter_map(hit_hash));
                }
                outcomes.push(outcome);
            }
            outcomes
        };

        let queried = outcomes.len();
        let mut raw = Vec::new();
        let mut failures = Vec::new();
        for (name, result) in outcomes {
            match result {
                Ok(hits) => {
                    debug!(indexer = %name, hits = hits.len(), "Indexer answered");
                    raw.extend(hits);
                }
                Err(e) => {
                    warn!(indexer = %name, error = %e, "Indexer search failed");
                    failures.push(format!("{}: {}", name, e));
                }
            }
        }

        if failures.len() == queried {
            return Err(SearchError::AllIndexersFailed(failures.join("; ")));
        }
        Ok(raw)
    }

    /// Public releases seen by earlier searches for the same title.
    fn catalog_matches(&self, media: &RequestedMedia) -> Vec<ReleaseDescriptor> {
        let catalog = match (&self.catalog, self.settings.catalog_enabled) {
            (Some(catalog), true) => catalog,
            _ => return Vec::new(),
        };
        let Some(title) = media.titles.first() else {
            return Vec::new();
        };

        let query = CatalogQuery::title(title.clone()).with_media_type(media.media_type());
        match catalog.find(&query) {
            Ok(found) => {
                debug!(title = %title, found = found.len(), "Catalog matches");
                found
            }
            Err(e) => {
                warn!(title = %title, error = %e, "Catalog lookup failed");
                Vec::new()
            }
        }
    }

    fn persist(&self, reconciler: &Reconciler) {
        let catalog = match (&self.catalog, self.settings.catalog_enabled) {
            (Some(catalog), true) => catalog,
            _ => return,
        };
        let public: Vec<ReleaseDescriptor> =
            reconciler.public_items().into_iter().cloned().collect();
        if public.is_empty() {
            return;
        }
        match catalog.store(&public) {
            Ok(new) => debug!(stored = public.len(), new, "Persisted public releases"),
            Err(e) => warn!(error = %e, "Failed to persist public releases"),
        }
    }
}

async fn run_indexer(indexer: &Arc<dyn Indexer>, media: &RequestedMedia) -> IndexerOutcome {
    let started = Instant::now();
    let result = indexer.search(media).await;
    let status = if result.is_ok() { "success" } else { "error" };
    metrics::INDEXER_DURATION
        .with_label_values(&[indexer.name(), status])
        .observe(started.elapsed().as_secs_f64());
    (indexer.name().to_string(), result)
}

fn hit_hash(hit: &RawRelease) -> Option<String> {
    hit.info_hash
        .as_deref()
        .map(str::to_lowercase)
        .or_else(|| hit.magnet_uri.as_deref().and_then(|m| extract_info_hash(m).ok()))
}

/// Cache key for one user's search of one media. The user config may hold an
/// API key, so only a digest is stored.
fn result_cache_key(user: &UserConfig, media: &RequestedMedia) -> String {
    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_vec(user).unwrap_or_default());
    hasher.update([0u8]);
    hasher.update(serde_json::to_vec(media).unwrap_or_default());
    format!("cachelink:search:{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::availability::BackendKind;
    use crate::catalog::SqliteCatalog;
    use crate::indexer::IndexerError;
    use crate::release::{MediaType, PatternParser};
    use crate::testing::fixtures::{private_raw_release, raw_release};
    use crate::testing::{MemoryCoordinationStore, MockBackend, MockIndexer};
    use serde_json::json;

    const HASH_A: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const HASH_B: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
    const HASH_C: &str = "cccccccccccccccccccccccccccccccccccccccc";

    fn build(
        indexers: Vec<Arc<MockIndexer>>,
        backends: Vec<Arc<MockBackend>>,
    ) -> StreamSearch {
        build_with(
            indexers,
            backends,
            SearchSettings {
                public_host: "https://cachelink.example/".to_string(),
                ..Default::default()
            },
        )
    }

    fn build_with(
        indexers: Vec<Arc<MockIndexer>>,
        backends: Vec<Arc<MockBackend>>,
        settings: SearchSettings,
    ) -> StreamSearch {
        let mut registry = BackendRegistry::new();
        for backend in backends {
            registry.register(backend);
        }
        StreamSearch::new(
            indexers
                .into_iter()
                .map(|i| i as Arc<dyn Indexer>)
                .collect(),
            Arc::new(registry),
            Arc::new(PatternParser::new()),
            settings,
        )
    }

    fn with_minimum(min_cached_results: usize) -> SearchSettings {
        SearchSettings {
            min_cached_results,
            ..Default::default()
        }
    }

    fn movie() -> RequestedMedia {
        RequestedMedia::movie("tt0111161", vec!["The Film".to_string()])
    }

    #[tokio::test]
    async fn test_search_confirms_and_builds_urls() {
        let indexer = Arc::new(MockIndexer::new("public-idx", 1));
        indexer
            .set_results(vec![
                raw_release("The.Film.2020.1080p.WEB-DL", HASH_A, "public-idx"),
                raw_release("The.Film.2020.720p.HDTV", HASH_B, "public-idx"),
            ])
            .await;
        let backend = Arc::new(MockBackend::new(BackendKind::RealDebrid));
        backend
            .set_availability(
                json!({
                    HASH_B: {"rd": [{"1": {"filename": "The.Film.mkv", "filesize": 900}}]}
                })
                .into(),
            )
            .await;

        let search = build(vec![indexer], vec![backend.clone()]);
        let results = search.search(&movie(), &UserConfig::default()).await.unwrap();

        assert_eq!(results.len(), 2);
        // Confirmed release is listed first.
        assert_eq!(results[0].release.info_hash, HASH_B);
        assert_eq!(results[0].service, "RD");
        assert_eq!(results[0].release.file_index, Some(1));
        assert_eq!(results[1].service, "DL");
        assert!(results[0]
            .playback_url
            .starts_with("https://cachelink.example/playback/-/"));

        let blob = results[0].playback_url.rsplit('/').next().unwrap();
        let query = PlaybackQuery::decode(blob).unwrap();
        assert_eq!(query.info_hash, HASH_B);
        assert_eq!(query.file_index, Some(1));

        let checks = backend.availability_checks().await;
        assert_eq!(checks.len(), 1);
        assert_eq!(checks[0].len(), 2);
    }

    #[tokio::test]
    async fn test_later_backends_only_see_unconfirmed_hashes() {
        let indexer = Arc::new(MockIndexer::new("public-idx", 1));
        indexer
            .set_results(vec![
                raw_release("The.Film.2020.1080p", HASH_A, "public-idx"),
                raw_release("The.Film.2020.720p", HASH_B, "public-idx"),
            ])
            .await;
        let rd = Arc::new(MockBackend::new(BackendKind::RealDebrid));
        rd.set_availability(
            json!({HASH_A: {"rd": [{"0": {"filename": "f.mkv", "filesize": 5}}]}}).into(),
        )
        .await;
        let tb = Arc::new(MockBackend::new(BackendKind::Torbox));

        let search = build(vec![indexer], vec![rd, tb.clone()]);
        search.search(&movie(), &UserConfig::default()).await.unwrap();

        assert_eq!(tb.availability_checks().await, vec![vec![HASH_B.to_string()]]);
    }

    #[tokio::test]
    async fn test_failing_backend_is_skipped() {
        let indexer = Arc::new(MockIndexer::new("public-idx", 1));
        indexer
            .set_results(vec![raw_release("The.Film.2020", HASH_A, "public-idx")])
            .await;
        let backend = Arc::new(MockBackend::new(BackendKind::AllDebrid));
        backend
            .set_next_error(crate::backend::BackendError::Timeout)
            .await;

        let search = build(vec![indexer], vec![backend]);
        let results = search.search(&movie(), &UserConfig::default()).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].service, "DL");
    }

    #[tokio::test]
    async fn test_one_failing_indexer_is_tolerated() {
        let good = Arc::new(MockIndexer::new("good", 1));
        good.set_results(vec![raw_release("The.Film", HASH_A, "good")])
            .await;
        let bad = Arc::new(MockIndexer::new("bad", 2));
        bad.set_next_error(IndexerError::Timeout).await;

        let search = build(vec![good, bad.clone()], vec![]);
        let results = search.search(&movie(), &UserConfig::default()).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(bad.searches().await.len(), 1);
    }

    #[tokio::test]
    async fn test_all_indexers_failing() {
        let bad = Arc::new(MockIndexer::new("bad", 1));
        bad.set_next_error(IndexerError::ApiError("down".into())).await;

        let search = build(vec![bad], vec![]);
        let err = search
            .search(&movie(), &UserConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::AllIndexersFailed(_)));
    }

    #[tokio::test]
    async fn test_no_indexers() {
        let search = build(vec![], vec![]);
        let err = search
            .search(&movie(), &UserConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::NoIndexers));
    }

    #[tokio::test]
    async fn test_unmatched_season_pack_is_dropped() {
        let indexer = Arc::new(MockIndexer::new("private-idx", 1));
        indexer
            .set_results(vec![
                private_raw_release(
                    "Show.S02.1080p",
                    HASH_A,
                    "private-idx",
                    &[("Show.S02E01.mkv", 100), ("Show.S02E02.mkv", 100)],
                ),
                private_raw_release(
                    "Show.S02.720p",
                    HASH_B,
                    "private-idx",
                    &[
                        ("Show.S02E05.mkv", 900),
                        ("Show.S02E05.proper.mkv", 1400),
                    ],
                ),
                raw_release("Show.S02E05.1080p", HASH_C, "private-idx"),
            ])
            .await;

        let search = build(vec![indexer], vec![]);
        let media = RequestedMedia::series("tt1", vec!["Show".to_string()], 2, 5);
        let results = search.search(&media, &UserConfig::default()).await.unwrap();

        let hashes: Vec<&str> = results
            .iter()
            .map(|r| r.release.info_hash.as_str())
            .collect();
        assert_eq!(hashes, vec![HASH_B, HASH_C]);
        assert_eq!(results[0].release.file_size, Some(1400));
        assert_eq!(results[0].release.media_type, MediaType::Series);
    }

    #[tokio::test]
    async fn test_catalog_reuse_and_persistence() {
        let catalog: Arc<dyn ReleaseCatalog> = Arc::new(SqliteCatalog::in_memory().unwrap());

        let first = Arc::new(MockIndexer::new("public-idx", 1));
        first
            .set_results(vec![raw_release("The Film 2020 1080p", HASH_A, "public-idx")])
            .await;
        build(vec![first], vec![])
            .with_catalog(catalog.clone())
            .search(&movie(), &UserConfig::default())
            .await
            .unwrap();
        assert!(catalog.exists(HASH_A).unwrap());

        // A later search whose indexer returns nothing still offers the cached release.
        let empty = Arc::new(MockIndexer::new("public-idx", 1));
        let results = build(vec![empty], vec![])
            .with_catalog(catalog)
            .search(&movie(), &UserConfig::default())
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].release.info_hash, HASH_A);
    }

    #[tokio::test]
    async fn test_user_config_is_carried_in_url() {
        let indexer = Arc::new(MockIndexer::new("public-idx", 1));
        indexer
            .set_results(vec![raw_release("The.Film", HASH_A, "public-idx")])
            .await;
        let user = UserConfig {
            api_key: Some("k1".to_string()),
            proxied: None,
        };

        let results = build(vec![indexer], vec![])
            .search(&movie(), &user)
            .await
            .unwrap();
        let segment = results[0].playback_url.split('/').nth_back(1).unwrap();
        assert_eq!(UserConfig::decode(segment).unwrap(), user);
    }

    #[tokio::test]
    async fn test_indexers_stop_once_minimum_is_reached() {
        let first = Arc::new(MockIndexer::new("first", 1));
        first
            .set_results(vec![
                raw_release("The.Film.2020.1080p", HASH_A, "first"),
                raw_release("The.Film.2020.720p", HASH_B, "first"),
            ])
            .await;
        let second = Arc::new(MockIndexer::new("second", 2));
        second
            .set_results(vec![raw_release("The.Film.2020.2160p", HASH_C, "second")])
            .await;

        // Registered out of priority order on purpose.
        let results = build_with(vec![second.clone(), first.clone()], vec![], with_minimum(2))
            .search(&movie(), &UserConfig::default())
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(first.searches().await.len(), 1);
        assert!(second.searches().await.is_empty());
    }

    #[tokio::test]
    async fn test_indexers_continue_below_minimum() {
        let first = Arc::new(MockIndexer::new("first", 1));
        first.set_next_error(IndexerError::Timeout).await;
        let second = Arc::new(MockIndexer::new("second", 2));
        second
            .set_results(vec![raw_release("The.Film.2020", HASH_A, "second")])
            .await;
        let third = Arc::new(MockIndexer::new("third", 3));

        let results = build_with(
            vec![first.clone(), second.clone(), third.clone()],
            vec![],
            with_minimum(1),
        )
        .search(&movie(), &UserConfig::default())
        .await
        .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(first.searches().await.len(), 1);
        assert_eq!(second.searches().await.len(), 1);
        assert!(third.searches().await.is_empty());
    }

    #[tokio::test]
    async fn test_zero_minimum_queries_every_indexer() {
        let first = Arc::new(MockIndexer::new("first", 1));
        first
            .set_results(vec![
                raw_release("The.Film.2020.1080p", HASH_A, "first"),
                raw_release("The.Film.2020.720p", HASH_B, "first"),
            ])
            .await;
        let second = Arc::new(MockIndexer::new("second", 2));

        build_with(vec![first, second.clone()], vec![], with_minimum(0))
            .search(&movie(), &UserConfig::default())
            .await
            .unwrap();

        assert_eq!(second.searches().await.len(), 1);
    }

    #[tokio::test]
    async fn test_catalog_counts_toward_minimum() {
        let catalog: Arc<dyn ReleaseCatalog> = Arc::new(SqliteCatalog::in_memory().unwrap());
        let seed = Arc::new(MockIndexer::new("public-idx", 1));
        seed.set_results(vec![raw_release("The Film 2020 1080p", HASH_A, "public-idx")])
            .await;
        build(vec![seed], vec![])
            .with_catalog(catalog.clone())
            .search(&movie(), &UserConfig::default())
            .await
            .unwrap();

        let first = Arc::new(MockIndexer::new("first", 1));
        let second = Arc::new(MockIndexer::new("second", 2));
        let results = build_with(vec![first.clone(), second.clone()], vec![], with_minimum(1))
            .with_catalog(catalog)
            .search(&movie(), &UserConfig::default())
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(first.searches().await.len(), 1);
        assert!(second.searches().await.is_empty());
    }

    #[tokio::test]
    async fn test_results_are_cached_per_user_and_media() {
        let store = Arc::new(MemoryCoordinationStore::new());
        let indexer = Arc::new(MockIndexer::new("public-idx", 1));
        indexer
            .set_results(vec![raw_release("The.Film.2020", HASH_A, "public-idx")])
            .await;
        let search = build(vec![indexer.clone()], vec![]).with_result_cache(store.clone());

        let first = search.search(&movie(), &UserConfig::default()).await.unwrap();
        indexer
            .set_results(vec![raw_release("The.Film.2020.720p", HASH_B, "public-idx")])
            .await;
        let second = search.search(&movie(), &UserConfig::default()).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(indexer.searches().await.len(), 1);

        let key = result_cache_key(&UserConfig::default(), &movie());
        assert_eq!(store.ttl(&key).await, Some(Duration::from_secs(1200)));

        let other_user = UserConfig {
            api_key: Some("k2".to_string()),
            proxied: None,
        };
        let theirs = search.search(&movie(), &other_user).await.unwrap();
        assert_eq!(theirs[0].release.info_hash, HASH_B);
        assert_eq!(indexer.searches().await.len(), 2);
        assert!(!key.contains("k2"));
    }

    #[tokio::test]
    async fn test_aggregator_shortens_result_cache() {
        let store = Arc::new(MemoryCoordinationStore::new());
        let indexer = Arc::new(MockIndexer::new("public-idx", 1));
        indexer
            .set_results(vec![raw_release("The.Film.2020", HASH_A, "public-idx")])
            .await;
        let aggregator = Arc::new(MockBackend::new(BackendKind::StremThru {
            store: "torbox".to_string(),
        }));

        build(vec![indexer], vec![aggregator])
            .with_result_cache(store.clone())
            .search(&movie(), &UserConfig::default())
            .await
            .unwrap();

        let key = result_cache_key(&UserConfig::default(), &movie());
        assert_eq!(store.ttl(&key).await, Some(Duration::from_secs(600)));
    }

    #[tokio::test]
    async fn test_empty_results_are_not_cached() {
        let store = Arc::new(MemoryCoordinationStore::new());
        let indexer = Arc::new(MockIndexer::new("public-idx", 1));

        let results = build(vec![indexer], vec![])
            .with_result_cache(store.clone())
            .search(&movie(), &UserConfig::default())
            .await
            .unwrap();

        assert!(results.is_empty());
        let key = result_cache_key(&UserConfig::default(), &movie());
        assert!(store.value(&key).await.is_none());
    }

    #[tokio::test]
    async fn test_unreadable_cache_entry_is_replaced() {
        let store = Arc::new(MemoryCoordinationStore::new());
        let key = result_cache_key(&UserConfig::default(), &movie());
        store
            .set(&key, "not json", Duration::from_secs(60))
            .await
            .unwrap();
        let indexer = Arc::new(MockIndexer::new("public-idx", 1));
        indexer
            .set_results(vec![raw_release("The.Film.2020", HASH_A, "public-idx")])
            .await;

        let results = build(vec![indexer.clone()], vec![])
            .with_result_cache(store.clone())
            .search(&movie(), &UserConfig::default())
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(indexer.searches().await.len(), 1);
        let cached: Vec<SearchResult> =
            serde_json::from_str(&store.value(&key).await.unwrap()).unwrap();
        assert_eq!(cached, results);
    }

    #[tokio::test]
    async fn test_unavailable_cache_does_not_fail_search() {
        let store = Arc::new(MemoryCoordinationStore::new());
        store.set_unavailable(true).await;
        let indexer = Arc::new(MockIndexer::new("public-idx", 1));
        indexer
            .set_results(vec![raw_release("The.Film.2020", HASH_A, "public-idx")])
            .await;

        let results = build(vec![indexer], vec![])
            .with_result_cache(store)
            .search(&movie(), &UserConfig::default())
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn test_unregistered_service_is_offered_as_download() {
        let indexer = Arc::new(MockIndexer::new("public-idx", 1));
        indexer
            .set_results(vec![
                raw_release("The.Film.2020.1080p", HASH_A, "public-idx"),
                raw_release("The.Film.2020.720p", HASH_B, "public-idx"),
            ])
            .await;
        let aggregator = Arc::new(MockBackend::new(BackendKind::StremThru {
            store: "torbox".to_string(),
        }));
        aggregator
            .set_availability(
                json!([
                    {"hash": HASH_A, "debrid": "RD", "files": []},
                    {"hash": HASH_B, "files": []}
                ])
                .into(),
            )
            .await;

        let results = build(vec![indexer], vec![aggregator])
            .search(&movie(), &UserConfig::default())
            .await
            .unwrap();

        let service_of = |hash: &str| {
            results
                .iter()
                .find(|r| r.release.info_hash == hash)
                .map(|r| r.service.clone())
                .unwrap()
        };
        assert_eq!(service_of(HASH_B), "TB");
        assert_eq!(service_of(HASH_A), "DL");
    }
}
