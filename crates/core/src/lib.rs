pub mod auth;
pub mod availability;
pub mod backend;
pub mod catalog;
pub mod config;
pub mod coordination;
pub mod indexer;
pub mod matcher;
pub mod media;
pub mod metrics;
pub mod playback;
pub mod proxy;
pub mod release;
pub mod search;
pub mod testing;

pub use auth::{
    create_authenticator, ApiKeyAuthenticator, AuthError, AuthRequest, Authenticator, Identity,
    NoneAuthenticator,
};
pub use availability::{AvailabilityReport, BackendKind, ReconcileError, Reconciler};
pub use backend::{
    BackendError, BackendRegistry, ContentIdentifier, DebridBackend, JobHandle, LinkTarget,
    Resolution, DOWNLOAD_SERVICE,
};
pub use catalog::{
    CachedRelease, CatalogError, CatalogQuery, CatalogStats, ReleaseCatalog, SqliteCatalog,
};
pub use config::{
    config_path, load_config, load_config_from_str, validate_config, AuthConfig, AuthMethod, Config,
    ConfigError, CoordinationConfig, DatabaseConfig, PlaybackConfig, SanitizedConfig,
    SearchConfig, ServerConfig,
};
pub use coordination::{
    CoordinationError, CoordinationStore, LockToken, RedisStore, WindowCount,
};
pub use indexer::{Indexer, IndexerError};
pub use matcher::{FallbackPolicy, FileMatch};
pub use media::{MediaError, MediaKind, RequestedMedia};
pub use playback::{
    BackendResolver, CoalescerSettings, LinkResolver, PlaybackCoalescer, PlaybackError,
    PlaybackOutcome, PlaybackQuery, PlaybackRequestKey, PlaybackStatus, QueryError,
    RateDecision, RateLimitSettings, RateLimiter, UserConfig,
};
pub use proxy::{
    ByteRange, ProxiedStream, ProxyError, ProxyMode, ProxyPolicy, ProxySettings, StreamProxy,
};
pub use release::{
    MediaType, PatternParser, Privacy, RawRelease, ReleaseDescriptor, ReleaseStore, TitleParser,
};
pub use search::{SearchError, SearchResult, SearchSettings, StreamSearch};
