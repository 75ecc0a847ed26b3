use crate::models::{Channel, Notification, NotificationStatus};
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, DateTime as BsonDateTime},
    options::IndexOptions,
    Client as MongoClient, Collection, Database, IndexModel,
};
use service_core::error::AppError;

#[derive(Clone)]
pub struct NotificationDb {
    client: MongoClient,
    db: Database,
}

impl NotificationDb {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, AppError> {
        tracing::info!(uri = %uri, "Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to connect to MongoDB at {}: {}", uri, e);
            AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
        })?;
        let db = client.database(database);
        tracing::info!(database = %database, "Successfully connected to MongoDB database");
        Ok(Self { client, db })
    }

    pub async fn initialize_indexes(&self) -> Result<(), AppError> {
        tracing::info!("Creating MongoDB indexes for notification-service");

        let notifications = self.notifications();

        let indexes = [
            IndexModel::builder()
                .keys(doc! { "notification_id": 1 })
                .options(
                    IndexOptions::builder()
                        .name("notification_id_idx".to_string())
                        .unique(true)
                        .build(),
                )
                .build(),
            // In-app feed reads: per-recipient, newest first.
            IndexModel::builder()
                .keys(doc! { "recipient": 1, "created_utc": -1 })
                .options(
                    IndexOptions::builder()
                        .name("recipient_created_idx".to_string())
                        .build(),
                )
                .build(),
            IndexModel::builder()
                .keys(doc! { "status": 1 })
                .options(
                    IndexOptions::builder()
                        .name("status_idx".to_string())
                        .build(),
                )
                .build(),
            IndexModel::builder()
                .keys(doc! { "channel": 1 })
                .options(
                    IndexOptions::builder()
                        .name("channel_idx".to_string())
                        .build(),
                )
                .build(),
        ];

        for index in indexes {
            notifications.create_index(index, None).await.map_err(|e| {
                tracing::error!("Failed to create notification index: {}", e);
                AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
            })?;
        }

        tracing::info!("Successfully created all MongoDB indexes");
        Ok(())
    }

    pub async fn health_check(&self) -> Result<(), AppError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!("MongoDB health check failed: {}", e);
                AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
            })?;
        Ok(())
    }

    pub fn notifications(&self) -> Collection<Notification> {
        self.db.collection("notifications")
    }

    pub async fn insert(&self, notification: &Notification) -> Result<(), AppError> {
        self.notifications()
            .insert_one(notification, None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to insert notification: {}", e);
                AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
            })?;
        Ok(())
    }

    pub async fn update_status(
        &self,
        notification_id: &str,
        status: NotificationStatus,
        provider_id: Option<&str>,
        error_message: Option<&str>,
    ) -> Result<(), AppError> {
        let now = BsonDateTime::now();

        let mut set = doc! { "status": status.to_string() };
        match status {
            NotificationStatus::Sent => {
                set.insert("sent_utc", now);
                if let Some(pid) = provider_id {
                    set.insert("provider_id", pid);
                }
            }
            NotificationStatus::Failed => {
                set.insert("failed_utc", now);
                if let Some(err) = error_message {
                    set.insert("error_message", err);
                }
            }
            NotificationStatus::Read => {
                set.insert("read_utc", now);
            }
            NotificationStatus::Queued => {}
        }

        self.notifications()
            .update_one(
                doc! { "notification_id": notification_id },
                doc! { "$set": set },
                None,
            )
            .await
            .map_err(|e| {
                tracing::error!("Failed to update notification status: {}", e);
                AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
            })?;

        Ok(())
    }

    /// Mark an in-app notification read. Returns false when no such row exists.
    pub async fn mark_read(&self, notification_id: &str) -> Result<bool, AppError> {
        let result = self
            .notifications()
            .update_one(
                doc! {
                    "notification_id": notification_id,
                    "channel": Channel::InApp.to_string(),
                },
                doc! { "$set": {
                    "status": NotificationStatus::Read.to_string(),
                    "read_utc": BsonDateTime::now(),
                } },
                None,
            )
            .await
            .map_err(|e| {
                tracing::error!("Failed to mark notification read: {}", e);
                AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
            })?;
        Ok(result.matched_count > 0)
    }

    /// In-app notifications for a user, newest first.
    pub async fn list_for_user(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<Notification>, AppError> {
        let find_options = mongodb::options::FindOptions::builder()
            .sort(doc! { "created_utc": -1 })
            .limit(limit)
            .build();

        let cursor = self
            .notifications()
            .find(
                doc! {
                    "recipient": user_id,
                    "channel": Channel::InApp.to_string(),
                },
                find_options,
            )
            .await
            .map_err(|e| {
                tracing::error!("Failed to list notifications: {}", e);
                AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
            })?;

        cursor.try_collect().await.map_err(|e| {
            tracing::error!("Failed to collect notifications: {}", e);
            AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
        })
    }
}
