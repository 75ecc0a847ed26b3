use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;

use crate::models::Notification;
use crate::services::record_notification;
use crate::startup::AppState;
use service_core::error::AppError;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateNotificationRequest {
    #[validate(length(min = 1, message = "user_id cannot be empty"))]
    pub user_id: String,
    #[validate(length(min = 1, message = "Title cannot be empty"))]
    pub title: String,
    #[validate(length(min = 1, message = "Body cannot be empty"))]
    pub body: String,
    pub kind: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct CreateNotificationResponse {
    pub notification_id: String,
    pub status: String,
    pub channel: String,
}

#[derive(Debug, Serialize)]
pub struct NotificationResponse {
    pub notification_id: String,
    pub title: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub read: bool,
    pub created_utc: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_utc: Option<DateTime<Utc>>,
}

impl From<Notification> for NotificationResponse {
    fn from(n: Notification) -> Self {
        Self {
            notification_id: n.notification_id,
            title: n.subject.unwrap_or_default(),
            body: n.body.unwrap_or_default(),
            kind: n.kind,
            read: n.read_utc.is_some(),
            created_utc: n.created_utc,
            read_utc: n.read_utc,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListNotificationsQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Serialize)]
pub struct ListNotificationsResponse {
    pub notifications: Vec<NotificationResponse>,
    pub count: usize,
}

#[tracing::instrument(skip(state, request))]
pub async fn create_notification(
    State(state): State<AppState>,
    Json(request): Json<CreateNotificationRequest>,
) -> Result<(StatusCode, Json<CreateNotificationResponse>), AppError> {
    request.validate()?;

    let notification = Notification::new_in_app(
        request.user_id,
        request.title,
        request.body,
        request.kind,
        request.metadata,
    );

    state.db.insert(&notification).await?;
    record_notification("inapp", "sent");

    tracing::info!(
        notification_id = %notification.notification_id,
        user_id = %notification.recipient,
        "In-app notification created"
    );

    Ok((
        StatusCode::CREATED,
        Json(CreateNotificationResponse {
            notification_id: notification.notification_id,
            status: notification.status.to_string(),
            channel: "inapp".to_string(),
        }),
    ))
}

#[tracing::instrument(skip(state))]
pub async fn list_notifications(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<ListNotificationsQuery>,
) -> Result<Json<ListNotificationsResponse>, AppError> {
    let limit = query.limit.clamp(1, 100);

    let notifications = state.db.list_for_user(&user_id, limit).await?;

    let responses: Vec<NotificationResponse> = notifications
        .into_iter()
        .map(NotificationResponse::from)
        .collect();
    let count = responses.len();

    Ok(Json(ListNotificationsResponse {
        notifications: responses,
        count,
    }))
}

#[tracing::instrument(skip(state))]
pub async fn mark_read(
    State(state): State<AppState>,
    Path(notification_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let updated = state.db.mark_read(&notification_id).await?;
    if !updated {
        return Err(AppError::NotFound(anyhow::anyhow!(
            "Notification not found: {}",
            notification_id
        )));
    }
    Ok(StatusCode::NO_CONTENT)
}
