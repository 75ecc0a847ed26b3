//! Shared test fixtures: an in-memory billing store and scripted provider.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use billing_service::models::{Profile, Purchase, SubscriptionState, WebhookEventRecord};
use billing_service::services::repository::BillingStore;
use billing_service::services::stripe::{StripeEvent, StripeSubscription};
use billing_service::services::SubscriptionProvider;
use service_core::error::AppError;

#[derive(Default)]
pub struct InMemoryStore {
    pub events: Mutex<HashSet<String>>,
    pub profiles: Mutex<HashMap<String, Profile>>,
    pub purchases: Mutex<Vec<Purchase>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn profile(&self, user_id: &str) -> Option<Profile> {
        self.profiles.lock().unwrap().get(user_id).cloned()
    }

    pub fn purchase_count(&self) -> usize {
        self.purchases.lock().unwrap().len()
    }

    fn apply_state(profile: &mut Profile, state: SubscriptionState) {
        profile.subscription_status = state.status;
        profile.is_pro = state.is_pro;
        profile.trial_ends_utc = state.trial_ends_utc;
        if state.trial_started {
            profile.trial_used = true;
        }
        if let Some(customer) = state.provider_customer_id {
            profile.provider_customer_id = Some(customer);
        }
        if let Some(subscription) = state.provider_subscription_id {
            profile.provider_subscription_id = Some(subscription);
        }
        if let Some(email) = state.email {
            profile.email = Some(email);
        }
        profile.updated_utc = Utc::now();
    }
}

#[async_trait]
impl BillingStore for InMemoryStore {
    async fn mark_event_processed(&self, record: WebhookEventRecord) -> Result<bool, AppError> {
        Ok(self.events.lock().unwrap().insert(record.event_id))
    }

    async fn unmark_event(&self, event_id: &str) -> Result<(), AppError> {
        self.events.lock().unwrap().remove(event_id);
        Ok(())
    }

    async fn apply_subscription_state(
        &self,
        user_id: &str,
        state: SubscriptionState,
    ) -> Result<(), AppError> {
        let mut profiles = self.profiles.lock().unwrap();
        let profile = profiles
            .entry(user_id.to_string())
            .or_insert_with(|| Profile::new(user_id.to_string()));
        Self::apply_state(profile, state);
        Ok(())
    }

    async fn apply_subscription_state_by_customer(
        &self,
        customer_id: &str,
        state: SubscriptionState,
    ) -> Result<bool, AppError> {
        let mut profiles = self.profiles.lock().unwrap();
        for profile in profiles.values_mut() {
            if profile.provider_customer_id.as_deref() == Some(customer_id) {
                Self::apply_state(profile, state);
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn record_purchase(&self, purchase: Purchase) -> Result<bool, AppError> {
        let mut purchases = self.purchases.lock().unwrap();
        let exists = purchases
            .iter()
            .any(|p| p.buyer_id == purchase.buyer_id && p.note_id == purchase.note_id);
        if exists {
            return Ok(false);
        }
        purchases.push(purchase);
        Ok(true)
    }

    async fn add_xp(&self, user_id: &str, amount: u64) -> Result<(), AppError> {
        let mut profiles = self.profiles.lock().unwrap();
        let profile = profiles
            .entry(user_id.to_string())
            .or_insert_with(|| Profile::new(user_id.to_string()));
        profile.xp += amount;
        Ok(())
    }

    async fn find_profile(&self, user_id: &str) -> Result<Option<Profile>, AppError> {
        Ok(self.profiles.lock().unwrap().get(user_id).cloned())
    }

    async fn find_profile_by_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<Profile>, AppError> {
        Ok(self
            .profiles
            .lock()
            .unwrap()
            .values()
            .find(|p| p.provider_customer_id.as_deref() == Some(customer_id))
            .cloned())
    }

    async fn list_purchases(&self, buyer_id: &str) -> Result<Vec<Purchase>, AppError> {
        Ok(self
            .purchases
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.buyer_id == buyer_id)
            .cloned()
            .collect())
    }
}

/// Scripted provider subscription source.
#[derive(Default)]
pub struct MockSubscriptions {
    response: Mutex<Option<StripeSubscription>>,
    fail: AtomicBool,
}

impl MockSubscriptions {
    pub fn returning(subscription: StripeSubscription) -> Self {
        Self {
            response: Mutex::new(Some(subscription)),
            fail: AtomicBool::new(false),
        }
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl SubscriptionProvider for MockSubscriptions {
    async fn fetch_subscription(
        &self,
        _subscription_id: &str,
    ) -> anyhow::Result<StripeSubscription> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("provider unavailable");
        }
        self.response
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| anyhow::anyhow!("no scripted subscription"))
    }
}

pub fn subscription_object(status: &str, trial_end: Option<i64>) -> StripeSubscription {
    serde_json::from_value(serde_json::json!({
        "id": "sub_1",
        "status": status,
        "customer": "cus_1",
        "trial_end": trial_end,
        "current_period_end": null,
    }))
    .unwrap()
}

pub fn event(event_id: &str, event_type: &str, object: serde_json::Value) -> StripeEvent {
    serde_json::from_value(serde_json::json!({
        "id": event_id,
        "type": event_type,
        "data": { "object": object },
    }))
    .unwrap()
}

pub fn subscription_checkout_event(event_id: &str, user_id: &str) -> StripeEvent {
    event(
        event_id,
        "checkout.session.completed",
        serde_json::json!({
            "id": "cs_1",
            "mode": "subscription",
            "client_reference_id": user_id,
            "customer": "cus_1",
            "subscription": "sub_1",
            "customer_details": { "email": "student@example.com" },
        }),
    )
}

pub fn purchase_event(event_id: &str, buyer_id: &str, note_id: &str, amount: u64) -> StripeEvent {
    event(
        event_id,
        "checkout.session.completed",
        serde_json::json!({
            "id": "cs_2",
            "mode": "payment",
            "client_reference_id": buyer_id,
            "amount_total": amount,
            "currency": "eur",
            "metadata": { "note_id": note_id, "seller_id": "seller-1" },
        }),
    )
}
