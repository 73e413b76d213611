use sqlx::PgPool;
use std::sync::Arc;

use crate::services::{
    incidents::IncidentService, locations::LocationService, recorder::CheckRecorder,
    redis_store::RedisStore,
};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// `None` when Redis is not reachable; caching and webhooks are then disabled.
    pub redis: Option<RedisStore>,
    pub incidents: Arc<IncidentService>,
    pub locations: Arc<LocationService>,
    pub recorder: CheckRecorder,
    pub operator_key: Arc<str>,
    pub stats_window_minutes: i64,
}

impl AppState {
    pub fn new(
        db: PgPool,
        redis: Option<RedisStore>,
        incidents: Arc<IncidentService>,
        locations: Arc<LocationService>,
        recorder: CheckRecorder,
        operator_key: &str,
        stats_window_minutes: i64,
    ) -> Self {
        Self {
            db,
            redis,
            incidents,
            locations,
            recorder,
            operator_key: Arc::from(operator_key),
            stats_window_minutes,
        }
    }
}
