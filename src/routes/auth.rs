use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::app_state::AppState;

/// Rejects requests without the operator API key.
///
/// The key is read from `x-api-key`, falling back to `Authorization: ApiKey <key>`.
pub async fn require_operator_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let authorized = matches!(
        extract_api_key(request.headers()),
        Some(key) if key == state.operator_key.as_ref()
    );

    if !authorized {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "unauthorized" })),
        )
            .into_response();
    }

    next.run(request).await
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn extract_api_key(headers: &HeaderMap) -> Option<&str> {
    if let Some(key) = header_value(headers, "x-api-key") {
        return Some(key);
    }

    let auth = header_value(headers, "authorization")?;
    let (scheme, key) = auth.split_once(' ')?;
    let key = key.trim();
    (scheme.eq_ignore_ascii_case("apikey") && !key.is_empty()).then_some(key)
}
