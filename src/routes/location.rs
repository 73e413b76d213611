use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;

use crate::app_state::AppState;
use crate::error::AppError;
use crate::models::location::{CheckResult, LocationCheckRequest, StatsResponse};
use crate::services::locations::RecordTask;

/// POST /api/v1/location/check: report a position and learn whether it is dangerous.
///
/// Recording the check and notifying the webhook happen after the response is
/// built and never affect it.
pub async fn check_location(
    State(state): State<AppState>,
    body: Result<Json<LocationCheckRequest>, JsonRejection>,
) -> Result<Json<CheckResult>, AppError> {
    let Json(req) = body?;
    let result = state
        .locations
        .check(&req.user_id, req.latitude, req.longitude)
        .await?;

    state.recorder.submit(RecordTask::new(
        &req.user_id,
        req.latitude,
        req.longitude,
        &result,
    ));

    Ok(Json(result))
}

/// GET /api/v1/incidents/stats: distinct users checked in the configured window.
pub async fn stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, AppError> {
    let user_count = state.locations.stats(state.stats_window_minutes).await?;
    Ok(Json(StatsResponse { user_count }))
}
