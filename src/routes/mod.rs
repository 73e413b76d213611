use axum::routing::{get, post};
use axum::{middleware, Router};

use crate::app_state::AppState;

pub mod auth;
pub mod health;
pub mod incidents;
pub mod location;
pub mod metrics;

/// API routes. Incident management and stats require the operator API key.
pub fn api_router(state: AppState) -> Router {
    let operator = Router::new()
        .route(
            "/api/v1/incidents",
            post(incidents::create_incident).get(incidents::list_incidents),
        )
        .route("/api/v1/incidents/stats", get(location::stats))
        .route(
            "/api/v1/incidents/{id}",
            get(incidents::get_incident)
                .put(incidents::update_incident)
                .delete(incidents::deactivate_incident),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_operator_key,
        ));

    Router::new()
        .route("/api/v1/location/check", post(location::check_location))
        .route("/api/v1/system/health", get(health::health_check))
        .merge(operator)
        .with_state(state)
}
