//! User-triggered subscription operations.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use validator::Validate;

use service_core::error::AppError;

use crate::models::{SubscriptionState, SubscriptionStatus};
use crate::services::repository::BillingStore;
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CancelSubscriptionRequest {
    #[validate(length(min = 1, message = "user_id cannot be empty"))]
    pub user_id: String,
}

#[derive(Debug, Serialize)]
pub struct CancelSubscriptionResponse {
    pub user_id: String,
    pub subscription_status: SubscriptionStatus,
    pub is_pro: bool,
}

/// Cancel a user's subscription immediately.
///
/// The provider cancellation must succeed before any local state is
/// touched; the webhook for the deletion will arrive later and is a no-op
/// thanks to the already-canceled local state.
pub async fn cancel_subscription(
    State(state): State<AppState>,
    Json(payload): Json<CancelSubscriptionRequest>,
) -> Result<Json<CancelSubscriptionResponse>, AppError> {
    payload.validate()?;

    let profile = state
        .repository
        .find_profile(&payload.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Profile not found")))?;

    let subscription_id = profile.provider_subscription_id.as_deref().ok_or_else(|| {
        AppError::NotFound(anyhow::anyhow!("No subscription on record for this user"))
    })?;

    state
        .stripe
        .cancel_subscription(subscription_id)
        .await
        .map_err(|e| {
            tracing::error!(
                user_id = %payload.user_id,
                error = %e,
                "Provider cancellation failed"
            );
            AppError::BadGateway(format!("Provider cancellation failed: {}", e))
        })?;

    let state_update = SubscriptionState {
        status: SubscriptionStatus::Canceled,
        is_pro: false,
        trial_ends_utc: None,
        trial_started: false,
        provider_customer_id: None,
        provider_subscription_id: None,
        email: None,
    };

    state
        .repository
        .apply_subscription_state(&payload.user_id, state_update)
        .await?;

    tracing::info!(user_id = %payload.user_id, "Subscription canceled");

    Ok(Json(CancelSubscriptionResponse {
        user_id: payload.user_id,
        subscription_status: SubscriptionStatus::Canceled,
        is_pro: false,
    }))
}
