use std::sync::Arc;

use cachelink_core::{
    Authenticator, Config, CoordinationStore, LinkResolver, PlaybackCoalescer, ProxyPolicy,
    RateLimiter, ReleaseCatalog, SanitizedConfig, StreamProxy, StreamSearch,
};

/// Shared application state
pub struct AppState {
    config: Config,
    authenticator: Arc<dyn Authenticator>,
    catalog: Arc<dyn ReleaseCatalog>,
    coordination: Arc<dyn CoordinationStore>,
    coalescer: PlaybackCoalescer,
    rate_limiter: RateLimiter,
    resolver: Arc<dyn LinkResolver>,
    proxy: StreamProxy,
    proxy_policy: ProxyPolicy,
    search: Arc<StreamSearch>,
}

impl AppState {
    /// Coalescer, rate limiter and proxy policy are derived from `config.playback`.
    pub fn new(
        config: Config,
        authenticator: Arc<dyn Authenticator>,
        catalog: Arc<dyn ReleaseCatalog>,
        coordination: Arc<dyn CoordinationStore>,
        resolver: Arc<dyn LinkResolver>,
        proxy: StreamProxy,
        search: Arc<StreamSearch>,
    ) -> Self {
        let coalescer =
            PlaybackCoalescer::new(Arc::clone(&coordination), config.playback.coalescer_settings());
        let rate_limiter =
            RateLimiter::new(Arc::clone(&coordination), config.playback.rate_limit_settings());
        let proxy_policy = config.playback.proxy_policy();
        Self {
            config,
            authenticator,
            catalog,
            coordination,
            coalescer,
            rate_limiter,
            resolver,
            proxy,
            proxy_policy,
            search,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn authenticator(&self) -> &dyn Authenticator {
        self.authenticator.as_ref()
    }

    pub fn catalog(&self) -> &dyn ReleaseCatalog {
        self.catalog.as_ref()
    }

    pub fn coordination(&self) -> &dyn CoordinationStore {
        self.coordination.as_ref()
    }

    pub fn coalescer(&self) -> &PlaybackCoalescer {
        &self.coalescer
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    pub fn resolver(&self) -> &dyn LinkResolver {
        self.resolver.as_ref()
    }

    pub fn proxy(&self) -> &StreamProxy {
        &self.proxy
    }

    pub fn proxy_policy(&self) -> &ProxyPolicy {
        &self.proxy_policy
    }

    pub fn search(&self) -> &StreamSearch {
        self.search.as_ref()
    }
}
