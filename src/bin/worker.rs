use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use geofence_alerts::{
    config::WorkerConfig,
    shutdown::cancel_on_signal,
    services::{
        queue::{QueueStore, WebhookQueue},
        redis_store::RedisStore,
        webhook::{HttpWebhookSink, WebhookSink},
    },
};

/// Standalone webhook delivery worker. Several instances may consume the same queue.
#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting webhook delivery worker");

    let config = WorkerConfig::from_env().expect("Failed to load configuration");
    let webhook_config = config.webhook();

    let Some(url) = webhook_config.endpoint() else {
        tracing::error!("WEBHOOK_URL is not set, nothing to deliver to");
        std::process::exit(1);
    };

    tracing::info!("Connecting to Redis");
    let store = RedisStore::connect(&config.redis_url)
        .await
        .expect("Failed to connect to Redis");

    let sink = HttpWebhookSink::new(url, webhook_config.timeout())
        .expect("Failed to initialize webhook HTTP client");

    let queue = WebhookQueue::new(
        Some(Arc::new(store) as Arc<dyn QueueStore>),
        Some(Arc::new(sink) as Arc<dyn WebhookSink>),
        webhook_config.retry_policy(),
    );

    let shutdown = CancellationToken::new();
    let signals = cancel_on_signal(shutdown.clone());

    queue.run(shutdown.clone()).await;
    shutdown.cancel();
    if let Err(e) = signals.await {
        tracing::error!(error = %e, "Signal listener task panicked");
    }
}
