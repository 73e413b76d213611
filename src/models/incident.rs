use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};

/// Radius applied when a create request omits one or sends a non-positive value.
pub const DEFAULT_DANGER_RADIUS_M: i32 = 100;

/// A circular danger zone.
///
/// The same shape is cached in Redis as the active-incident snapshot, so it must
/// round-trip through JSON without loss.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Incident {
    pub id: i64,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub danger_radius_m: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Writable incident fields, shared by create and update.
#[derive(Debug, Clone, PartialEq)]
pub struct IncidentInput {
    pub title: String,
    pub description: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub danger_radius_m: i32,
    pub is_active: bool,
}

/// POST /api/v1/incidents body.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateIncidentRequest {
    #[garde(length(min = 1, max = 200))]
    pub title: String,

    #[garde(length(max = 2000))]
    pub description: Option<String>,

    #[garde(range(min = -90.0, max = 90.0))]
    pub latitude: f64,

    #[garde(range(min = -180.0, max = 180.0))]
    pub longitude: f64,

    #[garde(skip)]
    pub danger_radius_m: Option<i32>,

    #[garde(skip)]
    pub is_active: Option<bool>,
}

impl CreateIncidentRequest {
    pub fn into_input(self) -> IncidentInput {
        IncidentInput {
            title: self.title,
            description: self.description,
            latitude: self.latitude,
            longitude: self.longitude,
            danger_radius_m: self
                .danger_radius_m
                .filter(|r| *r > 0)
                .unwrap_or(DEFAULT_DANGER_RADIUS_M),
            is_active: self.is_active.unwrap_or(true),
        }
    }
}

/// PUT /api/v1/incidents/{id} body. Every field is replaced.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateIncidentRequest {
    #[garde(length(min = 1, max = 200))]
    pub title: String,

    #[garde(length(max = 2000))]
    pub description: Option<String>,

    #[garde(range(min = -90.0, max = 90.0))]
    pub latitude: f64,

    #[garde(range(min = -180.0, max = 180.0))]
    pub longitude: f64,

    #[garde(range(min = 1))]
    pub danger_radius_m: i32,

    #[garde(skip)]
    pub is_active: bool,
}

impl UpdateIncidentRequest {
    pub fn into_input(self) -> IncidentInput {
        IncidentInput {
            title: self.title,
            description: self.description,
            latitude: self.latitude,
            longitude: self.longitude,
            danger_radius_m: self.danger_radius_m,
            is_active: self.is_active,
        }
    }
}

/// Query string of GET /api/v1/incidents.
#[derive(Debug, Default, Deserialize)]
pub struct ListIncidentsQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub only_active: Option<String>,
}

impl ListIncidentsQuery {
    pub fn only_active(&self) -> bool {
        matches!(self.only_active.as_deref(), Some("true") | Some("1"))
    }
}

/// One page of incidents.
#[derive(Debug, Serialize, Deserialize)]
pub struct IncidentPage {
    pub items: Vec<Incident>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}
