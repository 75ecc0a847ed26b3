//! Stripe webhook endpoint.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
};
use service_core::error::AppError;

use crate::services::record_webhook_event;
use crate::AppState;

/// Receive and process a Stripe webhook.
///
/// Verification failure returns 400 so the provider retries; a verified
/// event is always acknowledged with 200, whether it was processed,
/// a duplicate, or an unhandled type. Only a failed primary write turns
/// into a 5xx, which asks the provider to redeliver.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<StatusCode, AppError> {
    let signature = headers
        .get("Stripe-Signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            tracing::warn!("Missing Stripe-Signature header");
            AppError::BadRequest(anyhow::anyhow!("Missing webhook signature"))
        })?;

    let is_valid = state
        .stripe
        .verify_webhook_signature(&body, signature)
        .map_err(|e| {
            tracing::warn!(error = %e, "Webhook signature verification error");
            AppError::BadRequest(anyhow::anyhow!("Malformed webhook signature"))
        })?;

    if !is_valid {
        tracing::warn!("Invalid webhook signature");
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Invalid webhook signature"
        )));
    }

    let event = state.stripe.parse_webhook_event(&body).map_err(|e| {
        tracing::error!(error = %e, "Failed to parse webhook event");
        AppError::BadRequest(anyhow::anyhow!("Invalid webhook payload"))
    })?;

    tracing::info!(
        event_id = %event.id,
        event_type = %event.event_type,
        "Processing webhook event"
    );

    let outcome = state.reconciler.process_event(&event).await?;
    record_webhook_event(&event.event_type, outcome.as_str());

    Ok(StatusCode::OK)
}
