use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::CheckHistory;
use crate::error::AppError;
use crate::models::location::NewLocationCheck;

/// PostgreSQL-backed location check history.
#[derive(Clone)]
pub struct PgCheckHistory {
    pool: PgPool,
}

impl PgCheckHistory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CheckHistory for PgCheckHistory {
    async fn save(&self, check: &NewLocationCheck) -> Result<i64, AppError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO location_checks (user_id, latitude, longitude, has_danger)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(&check.user_id)
        .bind(check.latitude)
        .bind(check.longitude)
        .bind(check.has_danger)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn count_unique_users_since(&self, since: DateTime<Utc>) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(DISTINCT user_id) FROM location_checks WHERE created_at >= $1",
        )
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}
