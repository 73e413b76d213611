use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use super::{IncidentRepository, IncidentSource};
use crate::error::AppError;
use crate::models::incident::{Incident, IncidentInput};

const INCIDENT_COLUMNS: &str =
    "id, title, description, latitude, longitude, danger_radius_m, is_active, created_at, updated_at";

/// PostgreSQL-backed incident store.
#[derive(Clone)]
pub struct PgIncidentRepository {
    pool: PgPool,
}

impl PgIncidentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn incident_from_row(row: &PgRow) -> Result<Incident, sqlx::Error> {
    Ok(Incident {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        latitude: row.try_get("latitude")?,
        longitude: row.try_get("longitude")?,
        danger_radius_m: row.try_get("danger_radius_m")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn not_found(id: i64) -> AppError {
    AppError::NotFound(format!("incident {id} not found"))
}

#[async_trait]
impl IncidentSource for PgIncidentRepository {
    async fn list_active(&self) -> Result<Vec<Incident>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {INCIDENT_COLUMNS} FROM incidents WHERE is_active = TRUE ORDER BY id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(incident_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }
}

#[async_trait]
impl IncidentRepository for PgIncidentRepository {
    async fn create(&self, input: &IncidentInput) -> Result<Incident, AppError> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO incidents (title, description, latitude, longitude, danger_radius_m, is_active)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {INCIDENT_COLUMNS}
            "#
        ))
        .bind(&input.title)
        .bind(&input.description)
        .bind(input.latitude)
        .bind(input.longitude)
        .bind(input.danger_radius_m)
        .bind(input.is_active)
        .fetch_one(&self.pool)
        .await?;

        Ok(incident_from_row(&row)?)
    }

    async fn get_by_id(&self, id: i64) -> Result<Incident, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {INCIDENT_COLUMNS} FROM incidents WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| not_found(id))?;

        Ok(incident_from_row(&row)?)
    }

    async fn list(
        &self,
        limit: i64,
        offset: i64,
        only_active: bool,
    ) -> Result<(Vec<Incident>, i64), AppError> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(1) FROM incidents WHERE ($1 = FALSE) OR (is_active = TRUE)",
        )
        .bind(only_active)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query(&format!(
            r#"
            SELECT {INCIDENT_COLUMNS}
            FROM incidents
            WHERE ($1 = FALSE) OR (is_active = TRUE)
            ORDER BY id DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(only_active)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let items = rows
            .iter()
            .map(incident_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok((items, total))
    }

    async fn update(&self, id: i64, input: &IncidentInput) -> Result<Incident, AppError> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE incidents
            SET title = $2,
                description = $3,
                latitude = $4,
                longitude = $5,
                danger_radius_m = $6,
                is_active = $7,
                deactivated_at = CASE
                    WHEN $7 THEN NULL
                    WHEN is_active THEN NOW()
                    ELSE deactivated_at
                END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {INCIDENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&input.title)
        .bind(&input.description)
        .bind(input.latitude)
        .bind(input.longitude)
        .bind(input.danger_radius_m)
        .bind(input.is_active)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| not_found(id))?;

        Ok(incident_from_row(&row)?)
    }

    async fn deactivate(&self, id: i64) -> Result<Incident, AppError> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE incidents
            SET is_active = FALSE,
                deactivated_at = NOW(),
                updated_at = NOW()
            WHERE id = $1 AND is_active = TRUE
            RETURNING {INCIDENT_COLUMNS}
            "#
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| not_found(id))?;

        Ok(incident_from_row(&row)?)
    }
}
