use mcphub::{
    cache::TtlCache,
    config::HubConfig,
    directory::ServerDirectory,
    handlers,
    provision::{NpmInstaller, Provisioner},
    registry::{
        CodeSearchClient, CommunityRegistryClient, DiscoveryAggregator, KnownOrgsClient,
        OfficialRegistryClient, RegistryClient,
    },
    resolver::ResolutionEngine,
    AppState,
};

use axum::{
    routing::{get, post},
    Router,
};
use std::{net::SocketAddr, sync::Arc};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mcphub=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = HubConfig::from_env();

    // Cache and server directory, loaded once at startup
    let cache = TtlCache::open(&config.cache_file, config.cache_max_entries).await;
    let directory = Arc::new(ServerDirectory::load(&config.directory_file));
    tracing::info!(
        "Server directory loaded with {} entries",
        directory.len().await
    );

    // Registry sources
    let official = if config.official_registry_urls.is_empty() {
        OfficialRegistryClient::new(cache.clone())
    } else {
        OfficialRegistryClient::with_mirrors(config.official_registry_urls.clone(), cache.clone())
    };
    let community = match &config.community_registry_url {
        Some(url) => CommunityRegistryClient::with_url(url.clone(), cache.clone()),
        None => CommunityRegistryClient::new(cache.clone()),
    };
    let (code_search, known_orgs) = match &config.github_api_url {
        Some(api) => (
            CodeSearchClient::with_api_url(api.clone(), config.github_token.clone(), cache.clone()),
            KnownOrgsClient::with_api_url(api.clone(), config.github_token.clone(), cache.clone()),
        ),
        None => (
            CodeSearchClient::new(config.github_token.clone(), cache.clone()),
            KnownOrgsClient::new(config.github_token.clone(), cache.clone()),
        ),
    };
    if config.github_token.is_none() {
        tracing::info!("GITHUB_TOKEN not set, code-search and known-orgs sources disabled");
    }

    let clients: Vec<Arc<dyn RegistryClient>> = vec![
        Arc::new(official),
        Arc::new(community),
        Arc::new(code_search),
        Arc::new(known_orgs),
    ];
    let aggregator = Arc::new(DiscoveryAggregator::new(clients, cache.clone()));

    // Provisioning and resolution
    let installer = Arc::new(NpmInstaller::new(config.install_timeout));
    let provisioner = Arc::new(Provisioner::new(
        directory.clone(),
        installer,
        &config.install_root,
    ));
    let resolver = Arc::new(ResolutionEngine::new(
        cache.clone(),
        directory.clone(),
        aggregator,
        provisioner,
    ));

    let app_state = AppState {
        resolver,
        cache: cache.clone(),
        directory,
    };

    let app = Router::new()
        .route("/health", get(handlers::health))
        .route("/mcp/v1", post(handlers::handle_rpc))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any))
        .with_state(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("mcphub listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Shutdown sequence owns the cache flush; there is no exit hook.
    cache.flush_and_close().await;
    tracing::info!("mcphub shut down");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
