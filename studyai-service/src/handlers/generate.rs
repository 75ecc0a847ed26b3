use axum::{extract::State, Json};
use serde::Deserialize;
use validator::Validate;

use crate::models::{FlashcardSet, Quiz, StepByStepSolution, Summary};
use crate::services::{prompts, record_generation};
use crate::startup::AppState;
use service_core::error::AppError;

const DEFAULT_FLASHCARD_COUNT: usize = 10;
const MAX_FLASHCARD_COUNT: usize = 30;
const DEFAULT_QUESTION_COUNT: usize = 5;
const MAX_QUESTION_COUNT: usize = 20;

fn check_input_length(input: &str) -> Result<(), AppError> {
    if input.chars().count() > prompts::MAX_INPUT_CHARS {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Input is too long: limit is {} characters",
            prompts::MAX_INPUT_CHARS
        )));
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate)]
pub struct FlashcardsRequest {
    #[validate(length(min = 1, message = "Text cannot be empty"))]
    pub text: String,
    pub count: Option<usize>,
}

#[tracing::instrument(skip(state, request))]
pub async fn flashcards(
    State(state): State<AppState>,
    Json(request): Json<FlashcardsRequest>,
) -> Result<Json<FlashcardSet>, AppError> {
    request.validate()?;
    check_input_length(&request.text)?;

    let count = request
        .count
        .unwrap_or(DEFAULT_FLASHCARD_COUNT)
        .clamp(1, MAX_FLASHCARD_COUNT);

    let prompt = prompts::flashcards_prompt(&request.text, count);
    let result = state
        .engine
        .generate::<FlashcardSet>(&prompt, "flashcards", prompts::flashcards_schema())
        .await;

    record_generation("flashcards", if result.is_ok() { "ok" } else { "error" });
    result.map(Json)
}

#[derive(Debug, Deserialize, Validate)]
pub struct QuizRequest {
    #[validate(length(min = 1, message = "Text cannot be empty"))]
    pub text: String,
    pub question_count: Option<usize>,
}

#[tracing::instrument(skip(state, request))]
pub async fn quiz(
    State(state): State<AppState>,
    Json(request): Json<QuizRequest>,
) -> Result<Json<Quiz>, AppError> {
    request.validate()?;
    check_input_length(&request.text)?;

    let question_count = request
        .question_count
        .unwrap_or(DEFAULT_QUESTION_COUNT)
        .clamp(1, MAX_QUESTION_COUNT);

    let prompt = prompts::quiz_prompt(&request.text, question_count);
    let result = state
        .engine
        .generate::<Quiz>(&prompt, "quiz", prompts::quiz_schema())
        .await;

    record_generation("quiz", if result.is_ok() { "ok" } else { "error" });
    result.map(Json)
}

#[derive(Debug, Deserialize, Validate)]
pub struct SummaryRequest {
    #[validate(length(min = 1, message = "Text cannot be empty"))]
    pub text: String,
    pub max_points: Option<usize>,
}

#[tracing::instrument(skip(state, request))]
pub async fn summary(
    State(state): State<AppState>,
    Json(request): Json<SummaryRequest>,
) -> Result<Json<Summary>, AppError> {
    request.validate()?;
    check_input_length(&request.text)?;

    let prompt = prompts::summary_prompt(&request.text, request.max_points);
    let result = state
        .engine
        .generate::<Summary>(&prompt, "summary", prompts::summary_schema())
        .await;

    record_generation("summary", if result.is_ok() { "ok" } else { "error" });
    result.map(Json)
}

#[derive(Debug, Deserialize, Validate)]
pub struct StepsRequest {
    #[validate(length(min = 1, message = "Problem cannot be empty"))]
    pub problem: String,
}

#[tracing::instrument(skip(state, request))]
pub async fn steps(
    State(state): State<AppState>,
    Json(request): Json<StepsRequest>,
) -> Result<Json<StepByStepSolution>, AppError> {
    request.validate()?;
    check_input_length(&request.problem)?;

    let prompt = prompts::steps_prompt(&request.problem);
    let result = state
        .engine
        .generate::<StepByStepSolution>(&prompt, "steps", prompts::steps_schema())
        .await;

    record_generation("steps", if result.is_ok() { "ok" } else { "error" });
    result.map(Json)
}
