//! Shared fixtures for router tests: in-memory repositories and an app builder.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use geofence_alerts::{
    app_state::AppState,
    db::{CheckHistory, IncidentRepository, IncidentSource},
    error::AppError,
    models::incident::{Incident, IncidentInput},
    models::location::NewLocationCheck,
    routes,
    services::{
        geofence::GeofenceChecker, incident_cache::ActiveIncidentCache,
        incidents::IncidentService, locations::LocationService, queue::WebhookQueue,
        recorder::CheckRecorder,
    },
};

pub const OPERATOR_KEY: &str = "test-operator-key";

#[derive(Default)]
pub struct MemoryIncidents {
    rows: Mutex<Vec<Incident>>,
}

impl MemoryIncidents {
    pub fn insert(&self, title: &str, lat: f64, lon: f64, radius: i32) -> Incident {
        let mut rows = self.rows.lock().unwrap();
        let now = Utc::now();
        let incident = Incident {
            id: rows.len() as i64 + 1,
            title: title.to_string(),
            description: None,
            latitude: lat,
            longitude: lon,
            danger_radius_m: radius,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        rows.push(incident.clone());
        incident
    }
}

#[async_trait]
impl IncidentSource for MemoryIncidents {
    async fn list_active(&self) -> Result<Vec<Incident>, AppError> {
        let mut active: Vec<Incident> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|i| i.is_active)
            .cloned()
            .collect();
        active.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(active)
    }
}

#[async_trait]
impl IncidentRepository for MemoryIncidents {
    async fn create(&self, input: &IncidentInput) -> Result<Incident, AppError> {
        let mut incident = self.insert(
            &input.title,
            input.latitude,
            input.longitude,
            input.danger_radius_m,
        );
        incident.description = input.description.clone();
        incident.is_active = input.is_active;
        let mut rows = self.rows.lock().unwrap();
        let last = rows.len() - 1;
        rows[last] = incident.clone();
        Ok(incident)
    }

    async fn get_by_id(&self, id: i64) -> Result<Incident, AppError> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .find(|i| i.id == id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("incident not found".to_string()))
    }

    async fn list(
        &self,
        limit: i64,
        offset: i64,
        only_active: bool,
    ) -> Result<(Vec<Incident>, i64), AppError> {
        let mut rows: Vec<Incident> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|i| !only_active || i.is_active)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.id.cmp(&a.id));
        let total = rows.len() as i64;
        let page = rows
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        Ok((page, total))
    }

    async fn update(&self, id: i64, input: &IncidentInput) -> Result<Incident, AppError> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| AppError::NotFound("incident not found".to_string()))?;
        row.title = input.title.clone();
        row.description = input.description.clone();
        row.latitude = input.latitude;
        row.longitude = input.longitude;
        row.danger_radius_m = input.danger_radius_m;
        row.is_active = input.is_active;
        row.updated_at = Utc::now();
        Ok(row.clone())
    }

    async fn deactivate(&self, id: i64) -> Result<Incident, AppError> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|i| i.id == id && i.is_active)
            .ok_or_else(|| AppError::NotFound("incident not found".to_string()))?;
        row.is_active = false;
        row.updated_at = Utc::now();
        Ok(row.clone())
    }
}

#[derive(Default)]
pub struct MemoryHistory {
    saved: Mutex<Vec<(NewLocationCheck, DateTime<Utc>)>>,
}

impl MemoryHistory {
    pub fn saved(&self) -> Vec<NewLocationCheck> {
        self.saved
            .lock()
            .unwrap()
            .iter()
            .map(|(check, _)| check.clone())
            .collect()
    }
}

#[async_trait]
impl CheckHistory for MemoryHistory {
    async fn save(&self, check: &NewLocationCheck) -> Result<i64, AppError> {
        let mut saved = self.saved.lock().unwrap();
        saved.push((check.clone(), Utc::now()));
        Ok(saved.len() as i64)
    }

    async fn count_unique_users_since(&self, since: DateTime<Utc>) -> Result<i64, AppError> {
        let saved = self.saved.lock().unwrap();
        let mut users: Vec<&str> = saved
            .iter()
            .filter(|(_, at)| *at >= since)
            .map(|(check, _)| check.user_id.as_str())
            .collect();
        users.sort_unstable();
        users.dedup();
        Ok(users.len() as i64)
    }
}

pub struct TestApp {
    pub router: Router,
    pub incidents: Arc<MemoryIncidents>,
    pub history: Arc<MemoryHistory>,
    pub shutdown: CancellationToken,
}

/// Builds the API router over in-memory storage, with caching and webhooks disabled.
/// The Postgres pool is lazy and never connected; only the health route touches it.
pub fn test_app() -> TestApp {
    let incidents = Arc::new(MemoryIncidents::default());
    let history = Arc::new(MemoryHistory::default());

    let cache = Arc::new(ActiveIncidentCache::new(
        incidents.clone() as Arc<dyn IncidentSource>,
        None,
        std::time::Duration::from_secs(60),
    ));
    let locations = Arc::new(LocationService::new(
        GeofenceChecker::new(cache.clone()),
        history.clone() as Arc<dyn CheckHistory>,
        WebhookQueue::disabled(),
    ));
    let incident_service = Arc::new(IncidentService::new(
        incidents.clone() as Arc<dyn IncidentRepository>,
        cache,
    ));

    let shutdown = CancellationToken::new();
    let (recorder, _handle) = CheckRecorder::spawn(locations.clone(), 16, shutdown.clone());

    let pool = PgPoolOptions::new()
        .connect_lazy("postgres://localhost/geofence_test")
        .expect("lazy pool");

    let state = AppState::new(
        pool,
        None,
        incident_service,
        locations,
        recorder,
        OPERATOR_KEY,
        60,
    );

    TestApp {
        router: routes::api_router(state),
        incidents,
        history,
        shutdown,
    }
}

/// Sends one request through the router and returns the status and parsed JSON body.
pub async fn send(
    router: &Router,
    method: &str,
    uri: &str,
    api_key: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(key) = api_key {
        builder = builder.header("x-api-key", key);
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

/// Sends a raw body with an explicit content type; returns status, content type and body text.
pub async fn send_raw(
    router: &Router,
    method: &str,
    uri: &str,
    content_type: Option<&str>,
    body: &str,
) -> (StatusCode, String, String) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-api-key", OPERATOR_KEY);
    if let Some(content_type) = content_type {
        builder = builder.header("content-type", content_type);
    }
    let request = builder.body(Body::from(body.to_string())).unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, content_type, String::from_utf8_lossy(&bytes).into_owned())
}
