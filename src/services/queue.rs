use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::webhook::{DeliveryError, WebhookSink};
use crate::models::webhook::{Payload, WebhookJob};

pub const QUEUE_KEY: &str = "queue:webhook";
pub const DELAYED_KEY: &str = "queue:webhook:delayed";
pub const DEAD_LETTER_KEY: &str = "queue:webhook:dead";

/// Maximum number of dead-lettered jobs kept.
pub const DEAD_LETTER_CAP: usize = 1000;

/// Bounded wait of each blocking pop; also the worst-case shutdown latency.
pub const POP_TIMEOUT: Duration = Duration::from_secs(2);

/// Shared, durable list holding serialized webhook jobs.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Appends to the tail of the ready list.
    async fn push(&self, item: &str) -> Result<(), QueueError>;

    /// Removes from the head of the ready list, waiting up to `timeout`.
    async fn pop(&self, timeout: Duration) -> Result<Option<String>, QueueError>;

    /// Parks an item until `delay` has elapsed.
    async fn schedule(&self, item: &str, delay: Duration) -> Result<(), QueueError>;

    /// Moves every parked item whose delay has elapsed to the tail of the ready list.
    async fn promote_due(&self) -> Result<usize, QueueError>;

    async fn dead_letter(&self, item: &str) -> Result<(), QueueError>;

    /// Number of items in the ready list.
    async fn len(&self) -> Result<u64, QueueError>;
}

/// Retry ceiling and exponential backoff base.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_base: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based): `retry_base * 2^(attempt - 1)`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        self.retry_base.saturating_mul(1u32 << exp)
    }
}

/// At-least-once webhook delivery backed by a shared queue store.
///
/// Producers call [`WebhookQueue::enqueue`]; one [`WebhookQueue::run`] loop per
/// process consumes the list. Failed deliveries are parked in the store's delayed
/// set and promoted back by the loop once due.
#[derive(Clone)]
pub struct WebhookQueue {
    inner: Option<Worker>,
}

#[derive(Clone)]
struct Worker {
    store: Arc<dyn QueueStore>,
    sink: Arc<dyn WebhookSink>,
    policy: RetryPolicy,
}

impl WebhookQueue {
    /// Delivery is disabled when either the store or the sink is missing.
    pub fn new(
        store: Option<Arc<dyn QueueStore>>,
        sink: Option<Arc<dyn WebhookSink>>,
        policy: RetryPolicy,
    ) -> Self {
        let inner = match (store, sink) {
            (Some(store), Some(sink)) => Some(Worker {
                store,
                sink,
                policy,
            }),
            _ => None,
        };
        Self { inner }
    }

    pub fn disabled() -> Self {
        Self { inner: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    /// Pushes a new job (attempt 0). A no-op when delivery is disabled.
    pub async fn enqueue(&self, payload: Payload) -> Result<(), QueueError> {
        let Some(worker) = &self.inner else {
            return Ok(());
        };

        let item = serde_json::to_string(&WebhookJob::new(payload))?;
        worker.store.push(&item).await?;
        metrics::counter!("webhook_jobs_enqueued_total").increment(1);
        Ok(())
    }

    /// Consumes the queue until `shutdown` is cancelled.
    ///
    /// Cancellation is observed between iterations, so shutdown waits for at most one
    /// pop timeout plus one in-flight delivery. Parked retries stay in the store.
    pub async fn run(&self, shutdown: CancellationToken) {
        let Some(worker) = &self.inner else {
            info!("Webhook delivery disabled, worker not started");
            return;
        };

        info!(
            max_retries = worker.policy.max_retries,
            retry_base_secs = worker.policy.retry_base.as_secs(),
            "Webhook worker started"
        );

        while !shutdown.is_cancelled() {
            match worker.process_next().await {
                Ok(true) => trace!("Webhook job processed"),
                Ok(false) => trace!("Webhook queue idle"),
                Err(e) => {
                    error!(error = %e, "Webhook queue store error");
                    tokio::select! {
                        _ = shutdown.cancelled() => {}
                        _ = tokio::time::sleep(POP_TIMEOUT) => {}
                    }
                }
            }
        }

        info!("Webhook worker stopped");
    }
}

impl Worker {
    /// Promotes due retries, then handles at most one job.
    /// Returns `Ok(false)` when the pop timed out on an empty list.
    async fn process_next(&self) -> Result<bool, QueueError> {
        let promoted = self.store.promote_due().await?;
        if promoted > 0 {
            debug!(promoted, "Promoted due webhook retries");
        }

        let depth = self.store.len().await?;
        metrics::gauge!("webhook_queue_depth").set(depth as f64);

        let Some(item) = self.store.pop(POP_TIMEOUT).await? else {
            return Ok(false);
        };

        let job: WebhookJob = match serde_json::from_str(&item) {
            Ok(job) => job,
            Err(e) => {
                metrics::counter!("webhook_jobs_malformed_total").increment(1);
                warn!(error = %e, "Discarding malformed webhook job");
                return Ok(true);
            }
        };

        match self.sink.deliver(&job.payload).await {
            Ok(()) => {
                metrics::counter!("webhook_deliveries_total", "outcome" => "success").increment(1);
                info!(
                    check_id = job.payload.check_id,
                    attempt = job.attempt,
                    "Webhook delivered"
                );
            }
            Err(e) => {
                metrics::counter!("webhook_deliveries_total", "outcome" => "failure").increment(1);
                self.retry_or_dead_letter(job, e).await?;
            }
        }

        Ok(true)
    }

    /// Parks a failed job for retry, or dead-letters it once retries are exhausted.
    ///
    /// The job has already left the store, so store faults here are absorbed: a
    /// retry that cannot be parked goes straight back onto the ready list, and a job
    /// that cannot be written anywhere is logged in full and counted as lost.
    async fn retry_or_dead_letter(
        &self,
        mut job: WebhookJob,
        cause: DeliveryError,
    ) -> Result<(), QueueError> {
        let next_attempt = job.attempt + 1;

        if next_attempt > self.policy.max_retries {
            metrics::counter!("webhook_jobs_dead_lettered_total").increment(1);
            error!(
                check_id = job.payload.check_id,
                attempts = next_attempt,
                error = %cause,
                "Webhook delivery failed permanently, moving to dead-letter list"
            );
            let item = serde_json::to_string(&job)?;
            if let Err(e) = self.store.dead_letter(&item).await {
                record_lost(&job, &item, &e);
            }
            return Ok(());
        }

        job.attempt = next_attempt;
        let delay = self.policy.backoff(next_attempt);
        let item = serde_json::to_string(&job)?;

        if let Err(e) = self.store.schedule(&item, delay).await {
            warn!(
                check_id = job.payload.check_id,
                attempt = next_attempt,
                error = %e,
                "Failed to park webhook retry, requeueing without delay"
            );
            if let Err(e) = self.store.push(&item).await {
                record_lost(&job, &item, &e);
            }
            return Ok(());
        }

        warn!(
            check_id = job.payload.check_id,
            attempt = next_attempt,
            delay_secs = delay.as_secs(),
            error = %cause,
            "Webhook delivery failed, retry scheduled"
        );
        Ok(())
    }
}

fn record_lost(job: &WebhookJob, item: &str, cause: &QueueError) {
    metrics::counter!("webhook_jobs_lost_total").increment(1);
    error!(
        check_id = job.payload.check_id,
        attempt = job.attempt,
        job = %item,
        error = %cause,
        "Webhook job lost, queue store rejected every write"
    );
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
