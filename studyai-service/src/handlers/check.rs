use axum::{extract::State, Json};
use serde::Deserialize;
use validator::Validate;

use crate::models::WorkCheck;
use crate::services::{prompts, record_generation};
use crate::startup::AppState;
use service_core::error::AppError;

#[derive(Debug, Deserialize, Validate)]
pub struct WorkCheckRequest {
    #[validate(length(min = 1, message = "Problem cannot be empty"))]
    pub problem: String,
    #[validate(length(min = 1, message = "Student work cannot be empty"))]
    pub student_work: String,
}

#[tracing::instrument(skip(state, request))]
pub async fn check_work(
    State(state): State<AppState>,
    Json(request): Json<WorkCheckRequest>,
) -> Result<Json<WorkCheck>, AppError> {
    request.validate()?;

    let combined_len = request.problem.chars().count() + request.student_work.chars().count();
    if combined_len > prompts::MAX_INPUT_CHARS {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Input is too long: limit is {} characters",
            prompts::MAX_INPUT_CHARS
        )));
    }

    let prompt = prompts::work_check_prompt(&request.problem, &request.student_work);
    let result = state
        .engine
        .generate::<WorkCheck>(&prompt, "work_check", prompts::work_check_schema())
        .await;

    record_generation("work_check", if result.is_ok() { "ok" } else { "error" });
    result.map(Json)
}
