use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use garde::Validate;

use crate::app_state::AppState;
use crate::error::AppError;
use crate::models::incident::{
    CreateIncidentRequest, Incident, IncidentPage, ListIncidentsQuery, UpdateIncidentRequest,
};

fn parse_id(raw: &str) -> Result<i64, AppError> {
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(AppError::InvalidInput("invalid id".to_string())),
    }
}

/// POST /api/v1/incidents
pub async fn create_incident(
    State(state): State<AppState>,
    body: Result<Json<CreateIncidentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Incident>), AppError> {
    let Json(req) = body?;
    req.validate()
        .map_err(|e| AppError::InvalidInput(e.to_string()))?;

    let incident = state.incidents.create(req.into_input()).await?;
    Ok((StatusCode::CREATED, Json(incident)))
}

/// GET /api/v1/incidents?page=&page_size=&only_active=
pub async fn list_incidents(
    State(state): State<AppState>,
    query: Result<Query<ListIncidentsQuery>, QueryRejection>,
) -> Result<Json<IncidentPage>, AppError> {
    let Query(query) = query?;
    let page = state
        .incidents
        .list(
            query.page.unwrap_or(1),
            query.page_size.unwrap_or(0),
            query.only_active(),
        )
        .await?;
    Ok(Json(page))
}

/// GET /api/v1/incidents/{id}
pub async fn get_incident(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Incident>, AppError> {
    let id = parse_id(&id)?;
    Ok(Json(state.incidents.get(id).await?))
}

/// PUT /api/v1/incidents/{id}
pub async fn update_incident(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<UpdateIncidentRequest>, JsonRejection>,
) -> Result<Json<Incident>, AppError> {
    let id = parse_id(&id)?;
    let Json(req) = body?;
    req.validate()
        .map_err(|e| AppError::InvalidInput(e.to_string()))?;

    Ok(Json(state.incidents.update(id, req.into_input()).await?))
}

/// DELETE /api/v1/incidents/{id}: deactivates, the row is kept.
pub async fn deactivate_incident(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Incident>, AppError> {
    let id = parse_id(&id)?;
    Ok(Json(state.incidents.deactivate(id).await?))
}
