use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cachelink_core::{
    config_path, create_authenticator, load_config, validate_config, Authenticator, BackendRegistry,
    BackendResolver, CoordinationStore, LinkResolver, PatternParser, RedisStore, ReleaseCatalog,
    SqliteCatalog, StreamProxy, StreamSearch,
};
use cachelink_server::{api::create_router, state::AppState};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("cachelink v{}", VERSION);

    let config_path = config_path();

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Invalid configuration")?;

    // Create authenticator
    let authenticator: Arc<dyn Authenticator> = Arc::from(
        create_authenticator(&config.auth).context("Failed to create authenticator")?,
    );
    info!("Authentication method: {}", authenticator.method_name());

    // Public release catalog
    let catalog: Arc<dyn ReleaseCatalog> = Arc::new(
        SqliteCatalog::new(&config.database.path).with_context(|| {
            format!("Failed to open catalog at {:?}", config.database.path)
        })?,
    );
    info!("Release catalog at {:?}", config.database.path);

    // Coordination store shared by every instance
    let coordination: Arc<dyn CoordinationStore> = Arc::new(
        RedisStore::connect(&config.coordination.redis_url)
            .await
            .context("Failed to connect to coordination store")?,
    );

    // One HTTP client for origin requests
    let http_client = reqwest::Client::builder()
        .connect_timeout(config.playback.upstream_timeout())
        .build()
        .context("Failed to build HTTP client")?;
    let proxy = StreamProxy::new(http_client, config.playback.proxy_settings());

    // Debrid backends are registered by the deployment; none ship built in
    let mut registry = BackendRegistry::new();
    if let Some(code) = config.playback.download_service.as_deref() {
        if !registry.set_download_service(code) {
            warn!(service = %code, "Download service is not a registered backend");
        }
    }
    if registry.is_empty() {
        warn!("No debrid backends registered, playback requests will be rejected");
    }
    let registry = Arc::new(registry);

    let resolver: Arc<dyn LinkResolver> = Arc::new(BackendResolver::new(Arc::clone(&registry)));

    // Search pipeline; indexers are registered by the deployment as well
    let mut search = StreamSearch::new(
        Vec::new(),
        Arc::clone(&registry),
        Arc::new(PatternParser::new()),
        config.search.search_settings(),
    );
    if config.search.catalog_enabled {
        search = search.with_catalog(Arc::clone(&catalog));
    }
    search = search.with_result_cache(Arc::clone(&coordination));
    info!("Search configured with {} indexer(s)", search.indexer_count());

    let addr = SocketAddr::new(config.server.host, config.server.port);

    let state = Arc::new(AppState::new(
        config,
        authenticator,
        catalog,
        coordination,
        resolver,
        proxy,
        Arc::new(search),
    ));

    // Create router
    let app = create_router(state);

    // Start server
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    info!("Server shutting down...");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
