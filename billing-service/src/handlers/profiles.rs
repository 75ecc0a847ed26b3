//! Profile and purchase read endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use service_core::error::AppError;

use crate::models::{Profile, Purchase, SubscriptionStatus};
use crate::services::repository::BillingStore;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub subscription_status: SubscriptionStatus,
    /// Evaluated against the current time, so an expired trial reads as
    /// not-pro before any webhook arrives.
    pub is_pro: bool,
    pub trial_used: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trial_ends_utc: Option<DateTime<Utc>>,
    pub xp: u64,
    pub level: u32,
}

impl From<Profile> for ProfileResponse {
    fn from(p: Profile) -> Self {
        let is_pro = p.is_pro_now();
        let level = p.level();
        Self {
            user_id: p.user_id,
            email: p.email,
            subscription_status: p.subscription_status,
            is_pro,
            trial_used: p.trial_used,
            trial_ends_utc: p.trial_ends_utc,
            xp: p.xp,
            level,
        }
    }
}

pub async fn get_profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<ProfileResponse>, AppError> {
    let profile = state
        .repository
        .find_profile(&user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Profile not found")))?;

    Ok(Json(ProfileResponse::from(profile)))
}

#[derive(Debug, Serialize)]
pub struct PurchaseResponse {
    pub id: uuid::Uuid,
    pub note_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seller_id: Option<String>,
    pub price: f64,
    pub currency: String,
    pub created_utc: DateTime<Utc>,
}

impl From<Purchase> for PurchaseResponse {
    fn from(p: Purchase) -> Self {
        Self {
            id: p.id,
            note_id: p.note_id,
            seller_id: p.seller_id,
            price: p.price,
            currency: p.currency,
            created_utc: p.created_utc,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListPurchasesResponse {
    pub purchases: Vec<PurchaseResponse>,
    pub count: usize,
}

pub async fn list_purchases(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<ListPurchasesResponse>, AppError> {
    let purchases = state.repository.list_purchases(&user_id).await?;

    let purchases: Vec<PurchaseResponse> =
        purchases.into_iter().map(PurchaseResponse::from).collect();
    let count = purchases.len();

    Ok(Json(ListPurchasesResponse { purchases, count }))
}
