use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use geofence_alerts::{
    app_state::AppState,
    config::AppConfig,
    db::{self, CheckHistory, IncidentRepository, IncidentSource, PgCheckHistory, PgIncidentRepository},
    routes,
    shutdown::shutdown_signal,
    services::{
        geofence::GeofenceChecker,
        incident_cache::{ActiveIncidentCache, CacheStore},
        incidents::IncidentService,
        locations::LocationService,
        queue::{QueueStore, WebhookQueue},
        recorder::CheckRecorder,
        redis_store::RedisStore,
        webhook::{HttpWebhookSink, WebhookSink},
    },
};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing geofence-alerts server");

    let prometheus_handle =
        routes::metrics::install_recorder().expect("Failed to install Prometheus metrics recorder");

    // Initialize database connection pool
    tracing::info!("Connecting to PostgreSQL database");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Running database migrations");
    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    // Redis backs both the cache and the webhook queue; without it both are disabled.
    tracing::info!("Connecting to Redis");
    let redis = match RedisStore::connect(&config.redis_url).await {
        Ok(store) => Some(store),
        Err(e) => {
            tracing::warn!(error = %e, "Redis unavailable, incident caching and webhooks disabled");
            None
        }
    };

    let webhook_config = config.webhook();
    let sink: Option<Arc<dyn WebhookSink>> = match webhook_config.endpoint() {
        Some(url) => Some(Arc::new(
            HttpWebhookSink::new(url, webhook_config.timeout())
                .expect("Failed to initialize webhook HTTP client"),
        )),
        None => {
            tracing::info!("WEBHOOK_URL not set, webhook delivery disabled");
            None
        }
    };

    let incident_repo = Arc::new(PgIncidentRepository::new(db_pool.clone()));
    let history: Arc<dyn CheckHistory> = Arc::new(PgCheckHistory::new(db_pool.clone()));
    let cache_store = redis.clone().map(|r| Arc::new(r) as Arc<dyn CacheStore>);
    let queue_store = redis.clone().map(|r| Arc::new(r) as Arc<dyn QueueStore>);

    let cache = Arc::new(ActiveIncidentCache::new(
        incident_repo.clone() as Arc<dyn IncidentSource>,
        cache_store,
        config.cache_ttl(),
    ));
    let webhooks = WebhookQueue::new(queue_store, sink, webhook_config.retry_policy());
    tracing::info!(
        cache_enabled = cache.is_enabled(),
        webhooks_enabled = webhooks.is_enabled(),
        "Services initialized"
    );

    let incidents = Arc::new(IncidentService::new(
        incident_repo as Arc<dyn IncidentRepository>,
        cache.clone(),
    ));
    let locations = Arc::new(LocationService::new(
        GeofenceChecker::new(cache),
        history,
        webhooks.clone(),
    ));

    // Background tasks
    let shutdown = CancellationToken::new();
    let (recorder, recorder_handle) =
        CheckRecorder::spawn(locations.clone(), config.recorder_buffer, shutdown.clone());

    let worker_handle = config.webhook_embedded_worker.then(|| {
        let webhooks = webhooks.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { webhooks.run(shutdown).await })
    });

    let state = AppState::new(
        db_pool,
        redis,
        incidents,
        locations,
        recorder,
        &config.operator_api_key,
        config.stats_time_window_minutes,
    );

    let app = routes::api_router(state)
        .merge(
            Router::new()
                .route("/metrics", get(routes::metrics::prometheus_metrics))
                .with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(64 * 1024));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Server stopped, draining background tasks");
    shutdown.cancel();
    if let Err(e) = recorder_handle.await {
        tracing::error!(error = %e, "Check recorder task panicked");
    }
    if let Some(handle) = worker_handle {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Webhook worker task panicked");
        }
    }
}
