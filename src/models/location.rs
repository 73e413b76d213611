use serde::{Deserialize, Serialize};

/// Location check about to be saved.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLocationCheck {
    pub user_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub has_danger: bool,
}

/// An incident that contains the checked position, with the computed distance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IncidentDistance {
    #[serde(rename = "id")]
    pub incident_id: i64,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub danger_radius_m: i32,
    pub distance_m: f64,
}

/// Result of a geofence check. `incidents` is sorted by distance, then by id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckResult {
    pub dangerous: bool,
    pub incidents: Vec<IncidentDistance>,
}

/// POST /api/v1/location/check body.
#[derive(Debug, Clone, Deserialize)]
pub struct LocationCheckRequest {
    pub user_id: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// GET /api/v1/incidents/stats response.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    pub user_count: i64,
}
