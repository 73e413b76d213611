use std::sync::Arc;
use tracing::info;

use super::incident_cache::ActiveIncidentCache;
use crate::db::IncidentRepository;
use crate::error::AppError;
use crate::models::incident::{Incident, IncidentInput, IncidentPage};

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 200;

/// Operator-facing incident management.
///
/// Every successful mutation invalidates the active-incident cache before returning.
pub struct IncidentService {
    repo: Arc<dyn IncidentRepository>,
    cache: Arc<ActiveIncidentCache>,
}

impl IncidentService {
    pub fn new(repo: Arc<dyn IncidentRepository>, cache: Arc<ActiveIncidentCache>) -> Self {
        Self { repo, cache }
    }

    pub async fn create(&self, input: IncidentInput) -> Result<Incident, AppError> {
        validate_incident(&input)?;
        let incident = self.repo.create(&input).await?;
        self.cache.invalidate().await;
        info!(incident_id = incident.id, "Incident created");
        Ok(incident)
    }

    pub async fn get(&self, id: i64) -> Result<Incident, AppError> {
        validate_id(id)?;
        self.repo.get_by_id(id).await
    }

    /// Pages are 1-based; out-of-range paging parameters are clamped, not rejected.
    pub async fn list(
        &self,
        page: i64,
        page_size: i64,
        only_active: bool,
    ) -> Result<IncidentPage, AppError> {
        let page = if page <= 0 { 1 } else { page };
        let page_size = match page_size {
            n if n <= 0 => DEFAULT_PAGE_SIZE,
            n => n.min(MAX_PAGE_SIZE),
        };
        let offset = (page - 1) * page_size;

        let (items, total) = self.repo.list(page_size, offset, only_active).await?;
        Ok(IncidentPage {
            items,
            total,
            page,
            page_size,
        })
    }

    pub async fn update(&self, id: i64, input: IncidentInput) -> Result<Incident, AppError> {
        validate_id(id)?;
        validate_incident(&input)?;
        let incident = self.repo.update(id, &input).await?;
        self.cache.invalidate().await;
        info!(incident_id = id, is_active = incident.is_active, "Incident updated");
        Ok(incident)
    }

    pub async fn deactivate(&self, id: i64) -> Result<Incident, AppError> {
        validate_id(id)?;
        let incident = self.repo.deactivate(id).await?;
        self.cache.invalidate().await;
        info!(incident_id = id, "Incident deactivated");
        Ok(incident)
    }
}

fn validate_id(id: i64) -> Result<(), AppError> {
    if id <= 0 {
        return Err(AppError::InvalidInput(format!("invalid incident id {id}")));
    }
    Ok(())
}

fn validate_incident(input: &IncidentInput) -> Result<(), AppError> {
    if input.title.trim().is_empty() {
        return Err(AppError::InvalidInput("title is required".to_string()));
    }
    if !(-90.0..=90.0).contains(&input.latitude) {
        return Err(AppError::InvalidInput("latitude out of range".to_string()));
    }
    if !(-180.0..=180.0).contains(&input.longitude) {
        return Err(AppError::InvalidInput("longitude out of range".to_string()));
    }
    if input.danger_radius_m <= 0 {
        return Err(AppError::InvalidInput("danger_radius_m must be > 0".to_string()));
    }
    Ok(())
}
