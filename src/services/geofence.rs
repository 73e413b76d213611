use std::sync::Arc;

use super::geo::distance_within;
use super::incident_cache::ActiveIncidentCache;
use crate::error::AppError;
use crate::models::incident::Incident;
use crate::models::location::{CheckResult, IncidentDistance};

/// Evaluates a position against the active danger zones.
pub struct GeofenceChecker {
    cache: Arc<ActiveIncidentCache>,
}

impl GeofenceChecker {
    pub fn new(cache: Arc<ActiveIncidentCache>) -> Self {
        Self { cache }
    }

    /// Validates the input, loads active incidents and returns every zone containing
    /// the position. Performs no retries; cache faults are absorbed by the cache.
    pub async fn check(&self, user_id: &str, lat: f64, lon: f64) -> Result<CheckResult, AppError> {
        validate_position(user_id, lat, lon)?;

        let incidents = self
            .cache
            .get_active()
            .await
            .map_err(AppError::into_internal)?;

        let result = evaluate(lat, lon, &incidents);
        metrics::counter!(
            "geofence_checks_total",
            "dangerous" => result.dangerous.to_string()
        )
        .increment(1);

        Ok(result)
    }
}

/// Rejects an empty user id and coordinates outside the valid ranges.
pub fn validate_position(user_id: &str, lat: f64, lon: f64) -> Result<(), AppError> {
    if user_id.is_empty() {
        return Err(AppError::InvalidInput("user_id is required".to_string()));
    }
    if !(-90.0..=90.0).contains(&lat) {
        return Err(AppError::InvalidInput("latitude out of range".to_string()));
    }
    if !(-180.0..=180.0).contains(&lon) {
        return Err(AppError::InvalidInput("longitude out of range".to_string()));
    }
    Ok(())
}

/// Matches a position against `incidents`.
///
/// Matches are ordered by distance ascending, then by incident id ascending.
pub fn evaluate(lat: f64, lon: f64, incidents: &[Incident]) -> CheckResult {
    let mut matches: Vec<IncidentDistance> = incidents
        .iter()
        .filter_map(|inc| {
            let radius_m = f64::from(inc.danger_radius_m);
            let distance_m = distance_within(lat, lon, inc.latitude, inc.longitude, radius_m)?;
            Some(IncidentDistance {
                incident_id: inc.id,
                title: inc.title.clone(),
                description: inc.description.clone(),
                latitude: inc.latitude,
                longitude: inc.longitude,
                danger_radius_m: inc.danger_radius_m,
                distance_m,
            })
        })
        .collect();

    matches.sort_by(|a, b| {
        a.distance_m
            .total_cmp(&b.distance_m)
            .then(a.incident_id.cmp(&b.incident_id))
    });

    CheckResult {
        dangerous: !matches.is_empty(),
        incidents: matches,
    }
}
