use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;

use crate::error::AppError;
use crate::models::incident::{Incident, IncidentInput};
use crate::models::location::NewLocationCheck;

pub mod incident_queries;
pub mod location_queries;

pub use incident_queries::PgIncidentRepository;
pub use location_queries::PgCheckHistory;

/// Initialize PostgreSQL connection pool
pub async fn init_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(database_url)
        .await
}

/// Run database migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| sqlx::Error::Migrate(Box::new(e)))
}

/// Source of truth for the active-incident set.
#[async_trait]
pub trait IncidentSource: Send + Sync {
    /// All active incidents, newest id first.
    async fn list_active(&self) -> Result<Vec<Incident>, AppError>;
}

/// Incident persistence used by the operator API.
#[async_trait]
pub trait IncidentRepository: IncidentSource {
    async fn create(&self, input: &IncidentInput) -> Result<Incident, AppError>;

    async fn get_by_id(&self, id: i64) -> Result<Incident, AppError>;

    /// One page of incidents plus the total count matching the filter.
    async fn list(
        &self,
        limit: i64,
        offset: i64,
        only_active: bool,
    ) -> Result<(Vec<Incident>, i64), AppError>;

    async fn update(&self, id: i64, input: &IncidentInput) -> Result<Incident, AppError>;

    /// Deactivates an active incident. `NotFound` if missing or already inactive.
    async fn deactivate(&self, id: i64) -> Result<Incident, AppError>;
}

/// Append-only history of location checks.
#[async_trait]
pub trait CheckHistory: Send + Sync {
    /// Stores the check and returns its id.
    async fn save(&self, check: &NewLocationCheck) -> Result<i64, AppError>;

    async fn count_unique_users_since(&self, since: DateTime<Utc>) -> Result<i64, AppError>;
}
