use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::db::IncidentSource;
use crate::error::AppError;
use crate::models::incident::Incident;

/// Key of the cached active-incident snapshot. The whole set is invalidated at once.
pub const ACTIVE_INCIDENTS_KEY: &str = "cache:active_incidents";

/// String key-value store with expiry.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

/// Read-through cache of the active-incident set.
///
/// Absent, expired, corrupt and unreadable entries are all treated as a miss:
/// the set is reloaded from the source and written back best-effort. Only a
/// source failure is returned to the caller.
pub struct ActiveIncidentCache {
    source: Arc<dyn IncidentSource>,
    store: Option<Arc<dyn CacheStore>>,
    ttl: Duration,
}

impl ActiveIncidentCache {
    /// Caching is disabled when `store` is `None` or `ttl` is zero.
    pub fn new(
        source: Arc<dyn IncidentSource>,
        store: Option<Arc<dyn CacheStore>>,
        ttl: Duration,
    ) -> Self {
        Self { source, store, ttl }
    }

    pub fn is_enabled(&self) -> bool {
        self.live_store().is_some()
    }

    fn live_store(&self) -> Option<&Arc<dyn CacheStore>> {
        self.store.as_ref().filter(|_| !self.ttl.is_zero())
    }

    /// Active incidents, served from cache when a valid entry exists.
    pub async fn get_active(&self) -> Result<Vec<Incident>, AppError> {
        let Some(store) = self.live_store() else {
            return self.source.list_active().await;
        };

        match store.get(ACTIVE_INCIDENTS_KEY).await {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<Incident>>(&raw) {
                Ok(incidents) => {
                    metrics::counter!("incident_cache_hits_total").increment(1);
                    return Ok(incidents);
                }
                Err(e) => {
                    warn!(error = %e, "Discarding corrupt active incident cache entry");
                    evict(store.as_ref()).await;
                }
            },
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "Active incident cache read failed, reloading from source");
                evict(store.as_ref()).await;
            }
        }

        metrics::counter!("incident_cache_misses_total").increment(1);
        let incidents = self.source.list_active().await?;

        match serde_json::to_string(&incidents) {
            Ok(snapshot) => {
                if let Err(e) = store.set_ex(ACTIVE_INCIDENTS_KEY, &snapshot, self.ttl).await {
                    warn!(error = %e, "Failed to write active incident cache");
                } else {
                    debug!(count = incidents.len(), "Active incident cache refreshed");
                }
            }
            Err(e) => warn!(error = %e, "Failed to serialize active incidents for cache"),
        }

        Ok(incidents)
    }

    /// Drops the cached snapshot. Called after every incident mutation.
    pub async fn invalidate(&self) {
        if let Some(store) = &self.store {
            evict(store.as_ref()).await;
        }
    }
}

async fn evict(store: &dyn CacheStore) {
    if let Err(e) = store.delete(ACTIVE_INCIDENTS_KEY).await {
        warn!(error = %e, "Failed to delete active incident cache entry");
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Cache backend unavailable: {0}")]
    Unavailable(String),
}
