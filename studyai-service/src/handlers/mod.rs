pub mod check;
pub mod generate;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::services::get_metrics;
use crate::startup::AppState;

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let (status, provider) = match state.provider.health_check().await {
        Ok(()) => (StatusCode::OK, "reachable"),
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "unreachable"),
    };

    (
        status,
        Json(json!({
            "status": if status == StatusCode::OK { "ok" } else { "degraded" },
            "service": "studyai-service",
            "version": env!("CARGO_PKG_VERSION"),
            "provider": provider,
        })),
    )
}

pub async fn metrics() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        get_metrics(),
    )
}
