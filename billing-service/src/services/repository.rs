//! Persistence for billing state.
//!
//! `BillingStore` is the seam the reconciliation logic works against; the
//! MongoDB implementation lives here, an in-memory one backs the tests.

use async_trait::async_trait;
use mongodb::bson::{doc, Bson};
use mongodb::options::{FindOptions, IndexOptions, UpdateOptions};
use mongodb::{Collection, Database, IndexModel};
use service_core::error::AppError;

use crate::models::{Profile, Purchase, SubscriptionState, SubscriptionStatus, WebhookEventRecord};

#[async_trait]
pub trait BillingStore: Send + Sync {
    /// Record a webhook event id. Returns false when the event was already
    /// recorded, in which case the caller must skip processing.
    async fn mark_event_processed(&self, record: WebhookEventRecord) -> Result<bool, AppError>;

    /// Release a previously recorded event id so provider redelivery gets
    /// another processing attempt after a failure.
    async fn unmark_event(&self, event_id: &str) -> Result<(), AppError>;

    /// Upsert the subscription fields of a profile located by user id.
    /// `trial_used` is only ever set to true here, never cleared.
    async fn apply_subscription_state(
        &self,
        user_id: &str,
        state: SubscriptionState,
    ) -> Result<(), AppError>;

    /// Patch the subscription fields of a profile located by provider
    /// customer id. Returns false when no such profile exists.
    async fn apply_subscription_state_by_customer(
        &self,
        customer_id: &str,
        state: SubscriptionState,
    ) -> Result<bool, AppError>;

    /// Insert a purchase. Returns false when a row for the same
    /// (buyer, note) pair already exists.
    async fn record_purchase(&self, purchase: Purchase) -> Result<bool, AppError>;

    async fn add_xp(&self, user_id: &str, amount: u64) -> Result<(), AppError>;

    async fn find_profile(&self, user_id: &str) -> Result<Option<Profile>, AppError>;

    async fn find_profile_by_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<Profile>, AppError>;

    async fn list_purchases(&self, buyer_id: &str) -> Result<Vec<Purchase>, AppError>;
}

#[derive(Clone)]
pub struct BillingRepository {
    profiles: Collection<Profile>,
    purchases: Collection<Purchase>,
    webhook_events: Collection<WebhookEventRecord>,
}

impl BillingRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            profiles: db.collection("profiles"),
            purchases: db.collection("purchases"),
            webhook_events: db.collection("webhook_events"),
        }
    }

    /// Create the indexes the invariants rely on. The unique indexes on
    /// `webhook_events.event_id` and `purchases.(buyer_id, note_id)` are
    /// what makes duplicate webhook delivery harmless.
    pub async fn init_indexes(&self) -> Result<(), AppError> {
        let user_idx = IndexModel::builder()
            .keys(doc! { "user_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("profile_user_idx".to_string())
                    .unique(true)
                    .build(),
            )
            .build();

        let customer_idx = IndexModel::builder()
            .keys(doc! { "provider_customer_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("profile_customer_idx".to_string())
                    .sparse(true)
                    .build(),
            )
            .build();

        self.profiles
            .create_indexes([user_idx, customer_idx], None)
            .await?;

        let buyer_note_idx = IndexModel::builder()
            .keys(doc! { "buyer_id": 1, "note_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("purchase_buyer_note_idx".to_string())
                    .unique(true)
                    .build(),
            )
            .build();

        self.purchases.create_index(buyer_note_idx, None).await?;

        let event_idx = IndexModel::builder()
            .keys(doc! { "event_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("webhook_event_idx".to_string())
                    .unique(true)
                    .build(),
            )
            .build();

        self.webhook_events.create_index(event_idx, None).await?;

        tracing::info!("Billing service indexes initialized");
        Ok(())
    }

    fn subscription_update(state: &SubscriptionState) -> mongodb::bson::Document {
        let mut set = doc! {
            "subscription_status": state.status.to_string(),
            "is_pro": state.is_pro,
            "updated_utc": mongodb::bson::DateTime::now(),
        };

        match state.trial_ends_utc {
            Some(end) => {
                set.insert("trial_ends_utc", mongodb::bson::DateTime::from_chrono(end));
            }
            None => {
                set.insert("trial_ends_utc", Bson::Null);
            }
        }

        // Monotonic: the flag is only ever raised.
        if state.trial_started {
            set.insert("trial_used", true);
        }
        if let Some(ref customer) = state.provider_customer_id {
            set.insert("provider_customer_id", customer.clone());
        }
        if let Some(ref subscription) = state.provider_subscription_id {
            set.insert("provider_subscription_id", subscription.clone());
        }
        if let Some(ref email) = state.email {
            set.insert("email", email.clone());
        }

        set
    }
}

/// True when a MongoDB write failed because of a unique index collision.
pub fn is_duplicate_key_error(err: &mongodb::error::Error) -> bool {
    match *err.kind {
        mongodb::error::ErrorKind::Write(mongodb::error::WriteFailure::WriteError(ref we)) => {
            we.code == 11000
        }
        _ => false,
    }
}

#[async_trait]
impl BillingStore for BillingRepository {
    async fn mark_event_processed(&self, record: WebhookEventRecord) -> Result<bool, AppError> {
        match self.webhook_events.insert_one(record, None).await {
            Ok(_) => Ok(true),
            Err(e) if is_duplicate_key_error(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn unmark_event(&self, event_id: &str) -> Result<(), AppError> {
        self.webhook_events
            .delete_one(doc! { "event_id": event_id }, None)
            .await?;
        Ok(())
    }

    async fn apply_subscription_state(
        &self,
        user_id: &str,
        state: SubscriptionState,
    ) -> Result<(), AppError> {
        let set = Self::subscription_update(&state);
        let update = doc! {
            "$set": set,
            "$setOnInsert": {
                "user_id": user_id,
                "xp": 0i64,
                "created_utc": mongodb::bson::DateTime::now(),
            },
        };

        let options = UpdateOptions::builder().upsert(true).build();
        self.profiles
            .update_one(doc! { "user_id": user_id }, update, options)
            .await?;
        Ok(())
    }

    async fn apply_subscription_state_by_customer(
        &self,
        customer_id: &str,
        state: SubscriptionState,
    ) -> Result<bool, AppError> {
        let set = Self::subscription_update(&state);
        let result = self
            .profiles
            .update_one(
                doc! { "provider_customer_id": customer_id },
                doc! { "$set": set },
                None,
            )
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn record_purchase(&self, purchase: Purchase) -> Result<bool, AppError> {
        match self.purchases.insert_one(purchase, None).await {
            Ok(_) => Ok(true),
            Err(e) if is_duplicate_key_error(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn add_xp(&self, user_id: &str, amount: u64) -> Result<(), AppError> {
        // A purchase can land before any subscription webhook, so the
        // profile row may not exist yet. `$inc` starts from 0 on upsert.
        let now = mongodb::bson::DateTime::now();
        let update = doc! {
            "$inc": { "xp": amount as i64 },
            "$setOnInsert": {
                "user_id": user_id,
                "subscription_status": SubscriptionStatus::None.to_string(),
                "is_pro": false,
                "created_utc": now,
                "updated_utc": now,
            },
        };

        let options = UpdateOptions::builder().upsert(true).build();
        self.profiles
            .update_one(doc! { "user_id": user_id }, update, options)
            .await?;
        Ok(())
    }

    async fn find_profile(&self, user_id: &str) -> Result<Option<Profile>, AppError> {
        Ok(self
            .profiles
            .find_one(doc! { "user_id": user_id }, None)
            .await?)
    }

    async fn find_profile_by_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<Profile>, AppError> {
        Ok(self
            .profiles
            .find_one(doc! { "provider_customer_id": customer_id }, None)
            .await?)
    }

    async fn list_purchases(&self, buyer_id: &str) -> Result<Vec<Purchase>, AppError> {
        use futures::TryStreamExt;

        let options = FindOptions::builder()
            .sort(doc! { "created_utc": -1 })
            .build();

        let cursor = self
            .purchases
            .find(doc! { "buyer_id": buyer_id }, options)
            .await?;

        Ok(cursor.try_collect().await?)
    }
}
