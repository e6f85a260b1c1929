//! Application wiring: database, handlers, worker pool, router, server.

use std::sync::Arc;

use axum::Router;
use curator_commons::{HashLockRegistry, MediaWikiClientFactory};
use curator_core::{AppError, Config, TokenVault};
use curator_db::{
    connect, ensure_schema, BatchRepository, DbFlavor, PresetRepository, UploadRepository,
    UserRepository,
};
use curator_handlers::{CommonsSearch, FlickrHandler, HandlerRegistry, MapillaryHandler};
use curator_worker::{
    HttpMediaFetcher, ProgressSink, RetryPolicy, UploadQueue, UploadQueueConfig, WorkerContext,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::hub::ProgressHub;
use crate::routes;
use crate::session::SessionStore;
use crate::state::AppState;

pub async fn initialize_app(config: Config) -> Result<(AppState, Router), AppError> {
    // The vault is non-optional: refuse to start without a usable key.
    let vault = TokenVault::from_base64(&config.token_encryption_key)?;

    let pool = connect(&config.database_url).await?;
    ensure_schema(&pool, DbFlavor::from_url(&config.database_url)?).await?;

    let http = reqwest::Client::builder()
        .user_agent(config.user_agent.clone())
        .build()
        .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

    let mut registry = HandlerRegistry::new();
    registry.register(Arc::new(MapillaryHandler::new(
        http.clone(),
        config.mapillary_api_token.clone().unwrap_or_default(),
        CommonsSearch::new(http.clone(), config.commons_api_url.clone()),
    )));
    registry.register(Arc::new(FlickrHandler::new(
        http.clone(),
        config.flickr_api_key.clone().unwrap_or_default(),
        CommonsSearch::new(http.clone(), config.commons_api_url.clone()),
    )));

    let hub = Arc::new(ProgressHub::new());
    let wiki_factory = Arc::new(MediaWikiClientFactory::new(
        http.clone(),
        config.commons_api_url.clone(),
        config.oauth_consumer_key.clone().unwrap_or_default(),
        config.oauth_consumer_secret.clone().unwrap_or_default(),
        HashLockRegistry::new(),
    ));

    let worker_ctx = Arc::new(WorkerContext {
        uploads: UploadRepository::new(pool.clone()),
        users: UserRepository::new(pool.clone()),
        registry: registry.clone(),
        vault: vault.clone(),
        wiki_factory,
        media: Arc::new(HttpMediaFetcher::new(http.clone())),
        progress: Arc::clone(&hub) as Arc<dyn ProgressSink>,
        retry: RetryPolicy::default(),
    });
    let queue = Arc::new(UploadQueue::start(
        worker_ctx,
        UploadQueueConfig {
            max_workers: config.worker_concurrency,
            ..Default::default()
        },
    ));

    let state = AppState {
        config: Arc::new(config),
        pool: pool.clone(),
        uploads: UploadRepository::new(pool.clone()),
        batches: BatchRepository::new(pool.clone()),
        users: UserRepository::new(pool.clone()),
        presets: PresetRepository::new(pool.clone()),
        registry,
        vault: vault.clone(),
        hub,
        queue,
        sessions: Arc::new(SessionStore::new(vault)),
    };

    let router = build_router(state.clone());
    Ok((state, router))
}

pub fn build_router(state: AppState) -> Router {
    routes::router()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_server(config: &Config, router: Router) -> Result<(), AppError> {
    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to bind {}: {}", addr, e)))?;

    tracing::info!(addr = %addr, "Server listening");
    axum::serve(listener, router)
        .await
        .map_err(|e| AppError::Internal(format!("Server error: {}", e)))
}
