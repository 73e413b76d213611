use axum::extract::State;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;

/// Installs the global Prometheus recorder and describes the service metrics.
pub fn install_recorder() -> Result<Arc<PrometheusHandle>, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    metrics::describe_counter!("geofence_checks_total", "Location checks evaluated");
    metrics::describe_counter!("incident_cache_hits_total", "Active incident cache hits");
    metrics::describe_counter!(
        "incident_cache_misses_total",
        "Active incident reads served from the database"
    );
    metrics::describe_counter!("webhook_jobs_enqueued_total", "Webhook jobs enqueued");
    metrics::describe_counter!("webhook_deliveries_total", "Webhook delivery attempts");
    metrics::describe_counter!(
        "webhook_jobs_dead_lettered_total",
        "Webhook jobs that exhausted their retries"
    );
    metrics::describe_counter!(
        "webhook_jobs_lost_total",
        "Webhook jobs dropped because the queue store rejected every write"
    );
    metrics::describe_counter!(
        "webhook_jobs_malformed_total",
        "Unparseable webhook queue items discarded"
    );
    metrics::describe_counter!(
        "location_check_record_failures_total",
        "Location checks that could not be recorded"
    );
    metrics::describe_gauge!("webhook_queue_depth", "Webhook jobs waiting for delivery");

    Ok(Arc::new(handle))
}

/// Prometheus metrics scrape endpoint.
pub async fn prometheus_metrics(State(handle): State<Arc<PrometheusHandle>>) -> impl IntoResponse {
    handle.render()
}
