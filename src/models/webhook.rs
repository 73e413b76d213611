use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::location::IncidentDistance;

/// Matched incident as delivered to the notification endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PayloadIncident {
    pub id: i64,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub danger_radius_m: i32,
    pub distance_m: f64,
}

impl From<&IncidentDistance> for PayloadIncident {
    fn from(inc: &IncidentDistance) -> Self {
        Self {
            id: inc.incident_id,
            title: inc.title.clone(),
            description: inc.description.clone(),
            latitude: inc.latitude,
            longitude: inc.longitude,
            danger_radius_m: inc.danger_radius_m,
            distance_m: inc.distance_m,
        }
    }
}

/// JSON body POSTed to the webhook endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payload {
    pub check_id: i64,
    pub user_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub incidents: Vec<PayloadIncident>,
    pub created_at: DateTime<Utc>,
}

impl Payload {
    pub fn for_check(
        check_id: i64,
        user_id: &str,
        latitude: f64,
        longitude: f64,
        incidents: &[IncidentDistance],
    ) -> Self {
        Self {
            check_id,
            user_id: user_id.to_string(),
            latitude,
            longitude,
            incidents: incidents.iter().map(PayloadIncident::from).collect(),
            created_at: Utc::now(),
        }
    }
}

/// Queue entry: the payload plus the number of failed deliveries so far.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebhookJob {
    pub payload: Payload,
    pub attempt: u32,
}

impl WebhookJob {
    pub fn new(payload: Payload) -> Self {
        Self {
            payload,
            attempt: 0,
        }
    }
}
