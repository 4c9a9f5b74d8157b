use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::app_state::AppState;
use crate::services::{auth, runner};

/// POST /api/v1/sync — run one translation sync invocation.
///
/// Called by the external scheduler with the shared cron secret. Normal and
/// skipped runs both return 200 with the run summary; an unexpected
/// top-level failure returns 500 with the counters accumulated so far.
pub async fn trigger_sync(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let header_value = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    if !auth::is_authorized(header_value, &state.cron_secret) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": "unauthorized" })),
        )
            .into_response();
    }

    match runner::run_sync(&state.db, state.translator.as_ref(), &state.sync_options).await {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(aborted) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({
                "error": aborted.error.to_string(),
                "summary": aborted.summary,
            })),
        )
            .into_response(),
    }
}
