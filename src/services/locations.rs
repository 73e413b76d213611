use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, warn};

use super::geofence::GeofenceChecker;
use super::queue::WebhookQueue;
use crate::db::CheckHistory;
use crate::error::AppError;
use crate::models::location::{CheckResult, IncidentDistance, NewLocationCheck};
use crate::models::webhook::Payload;

/// Work handed from the request path to the check recorder.
#[derive(Debug, Clone)]
pub struct RecordTask {
    pub user_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub incidents: Vec<IncidentDistance>,
}

impl RecordTask {
    pub fn new(user_id: &str, latitude: f64, longitude: f64, result: &CheckResult) -> Self {
        Self {
            user_id: user_id.to_string(),
            latitude,
            longitude,
            incidents: result.incidents.clone(),
        }
    }

    pub fn is_dangerous(&self) -> bool {
        !self.incidents.is_empty()
    }
}

/// Location check use case.
///
/// [`LocationService::check`] is the synchronous half answered to the caller;
/// [`LocationService::record`] is the follow-up run by the check recorder.
pub struct LocationService {
    checker: GeofenceChecker,
    history: Arc<dyn CheckHistory>,
    webhooks: WebhookQueue,
}

impl LocationService {
    pub fn new(
        checker: GeofenceChecker,
        history: Arc<dyn CheckHistory>,
        webhooks: WebhookQueue,
    ) -> Self {
        Self {
            checker,
            history,
            webhooks,
        }
    }

    pub async fn check(&self, user_id: &str, lat: f64, lon: f64) -> Result<CheckResult, AppError> {
        self.checker.check(user_id, lat, lon).await
    }

    /// Saves the check and, when dangerous, enqueues a webhook for it.
    /// A failed enqueue is logged; only a failed save is returned.
    pub async fn record(&self, task: &RecordTask) -> Result<i64, AppError> {
        let check_id = self
            .history
            .save(&NewLocationCheck {
                user_id: task.user_id.clone(),
                latitude: task.latitude,
                longitude: task.longitude,
                has_danger: task.is_dangerous(),
            })
            .await?;

        if task.is_dangerous() {
            let payload = Payload::for_check(
                check_id,
                &task.user_id,
                task.latitude,
                task.longitude,
                &task.incidents,
            );
            if let Err(e) = self.webhooks.enqueue(payload).await {
                warn!(check_id, error = %e, "Failed to enqueue webhook");
            }
        }

        debug!(check_id, dangerous = task.is_dangerous(), "Location check recorded");
        Ok(check_id)
    }

    /// Distinct users that checked a location within the last `window_minutes`.
    pub async fn stats(&self, window_minutes: i64) -> Result<i64, AppError> {
        if window_minutes <= 0 {
            return Err(AppError::InvalidInput("stats window must be > 0".to_string()));
        }
        let since = Utc::now() - chrono::Duration::minutes(window_minutes);
        self.history.count_unique_users_since(since).await
    }
}
