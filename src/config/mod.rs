use serde::Deserialize;
use std::time::Duration;

use crate::services::queue::RetryPolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// PostgreSQL connection string
    pub database_url: String,

    /// API key required on operator routes
    pub operator_api_key: String,

    /// Redis connection string for the incident cache and webhook queue
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// Window used by the unique-users stats endpoint
    #[serde(default = "default_stats_window")]
    pub stats_time_window_minutes: i64,

    /// TTL of the cached active-incident set. Zero or negative disables caching.
    #[serde(default = "default_cache_ttl")]
    pub cache_incidents_ttl_seconds: i64,

    /// Whether this process also runs the webhook delivery loop.
    #[serde(default = "default_true")]
    pub webhook_embedded_worker: bool,

    /// Capacity of the buffer between request handlers and the check recorder.
    #[serde(default = "default_recorder_buffer")]
    pub recorder_buffer: usize,

    /// Notification endpoint. Empty disables webhook delivery.
    #[serde(default)]
    pub webhook_url: String,

    #[serde(default = "default_max_retries")]
    pub webhook_max_retries: u32,

    #[serde(default = "default_retry_base")]
    pub webhook_retry_base_seconds: u64,

    #[serde(default = "default_webhook_timeout")]
    pub webhook_timeout_seconds: u64,
}

/// Environment read by the `webhook-worker` binary.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    #[serde(default)]
    pub webhook_url: String,

    #[serde(default = "default_max_retries")]
    pub webhook_max_retries: u32,

    #[serde(default = "default_retry_base")]
    pub webhook_retry_base_seconds: u64,

    #[serde(default = "default_webhook_timeout")]
    pub webhook_timeout_seconds: u64,
}

/// Webhook delivery settings shared by the server and the standalone worker.
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub url: String,
    pub max_retries: u32,
    pub retry_base_seconds: u64,
    pub timeout_seconds: u64,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_stats_window() -> i64 {
    60
}

fn default_cache_ttl() -> i64 {
    60
}

fn default_true() -> bool {
    true
}

fn default_recorder_buffer() -> usize {
    1024
}

fn default_max_retries() -> u32 {
    5
}

fn default_retry_base() -> u64 {
    10
}

fn default_webhook_timeout() -> u64 {
    5
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_incidents_ttl_seconds.max(0) as u64)
    }

    pub fn webhook(&self) -> WebhookConfig {
        WebhookConfig {
            url: self.webhook_url.clone(),
            max_retries: self.webhook_max_retries,
            retry_base_seconds: self.webhook_retry_base_seconds,
            timeout_seconds: self.webhook_timeout_seconds,
        }
    }
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    pub fn webhook(&self) -> WebhookConfig {
        WebhookConfig {
            url: self.webhook_url.clone(),
            max_retries: self.webhook_max_retries,
            retry_base_seconds: self.webhook_retry_base_seconds,
            timeout_seconds: self.webhook_timeout_seconds,
        }
    }
}

impl WebhookConfig {
    /// Configured endpoint, or `None` when delivery is disabled.
    pub fn endpoint(&self) -> Option<&str> {
        let url = self.url.trim();
        (!url.is_empty()).then_some(url)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            retry_base: Duration::from_secs(self.retry_base_seconds),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}
