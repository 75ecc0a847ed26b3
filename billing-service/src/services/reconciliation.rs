//! Webhook reconciliation.
//!
//! Maps verified provider events onto local subscription and purchase
//! state. The primary write must succeed or the provider is asked to
//! redeliver; notification and email side effects are best-effort and
//! never influence the outcome.

use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;

use service_core::error::AppError;

use crate::models::{
    is_pro, leveling, price_from_minor_units, Purchase, SubscriptionState, SubscriptionStatus,
    WebhookEventRecord,
};
use crate::services::notifier::Notifier;
use crate::services::repository::BillingStore;
use crate::services::stripe::{CheckoutSession, StripeEvent, StripeSubscription};

/// How an event was handled, for logging and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Processed,
    Duplicate,
    Ignored,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Processed => "processed",
            Outcome::Duplicate => "duplicate",
            Outcome::Ignored => "ignored",
        }
    }
}

/// Source of provider subscription objects, so reconciliation can be
/// exercised without the live API.
#[async_trait::async_trait]
pub trait SubscriptionProvider: Send + Sync {
    async fn fetch_subscription(&self, subscription_id: &str)
        -> anyhow::Result<StripeSubscription>;
}

#[async_trait::async_trait]
impl SubscriptionProvider for crate::services::stripe::StripeClient {
    async fn fetch_subscription(
        &self,
        subscription_id: &str,
    ) -> anyhow::Result<StripeSubscription> {
        self.get_subscription(subscription_id).await
    }
}

/// Derive the local subscription fields from a provider subscription object.
pub fn subscription_state_from(
    subscription: &StripeSubscription,
    email: Option<String>,
    now: DateTime<Utc>,
) -> SubscriptionState {
    let status = SubscriptionStatus::from_provider(&subscription.status);

    let trial_ends_utc = if status == SubscriptionStatus::Trialing {
        subscription
            .trial_end
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
    } else {
        None
    };

    SubscriptionState {
        status,
        is_pro: is_pro(status, trial_ends_utc, now),
        trial_ends_utc,
        trial_started: status == SubscriptionStatus::Trialing,
        provider_customer_id: Some(subscription.customer.clone()),
        provider_subscription_id: Some(subscription.id.clone()),
        email,
    }
}

fn canceled_state() -> SubscriptionState {
    SubscriptionState {
        status: SubscriptionStatus::Canceled,
        is_pro: false,
        trial_ends_utc: None,
        trial_started: false,
        provider_customer_id: None,
        provider_subscription_id: None,
        email: None,
    }
}

pub struct Reconciler {
    store: Arc<dyn BillingStore>,
    subscriptions: Arc<dyn SubscriptionProvider>,
    notifier: Arc<dyn Notifier>,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn BillingStore>,
        subscriptions: Arc<dyn SubscriptionProvider>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            subscriptions,
            notifier,
        }
    }

    /// Process a verified webhook event.
    ///
    /// The event id is recorded up front; a duplicate means the event was
    /// already handled and is skipped. If processing then fails, the record
    /// is removed again so provider redelivery gets another attempt.
    pub async fn process_event(&self, event: &StripeEvent) -> Result<Outcome, AppError> {
        let first_delivery = self
            .store
            .mark_event_processed(WebhookEventRecord::new(
                event.id.clone(),
                event.event_type.clone(),
            ))
            .await?;

        if !first_delivery {
            tracing::info!(event_id = %event.id, "Webhook event already processed, skipping");
            return Ok(Outcome::Duplicate);
        }

        let result = self.dispatch(event).await;

        if result.is_err() {
            if let Err(e) = self.store.unmark_event(&event.id).await {
                tracing::error!(
                    event_id = %event.id,
                    error = %e,
                    "Failed to release webhook event record after processing error"
                );
            }
        }

        result
    }

    async fn dispatch(&self, event: &StripeEvent) -> Result<Outcome, AppError> {
        match event.event_type.as_str() {
            "checkout.session.completed" => {
                let session: CheckoutSession = serde_json::from_value(event.data.object.clone())
                    .map_err(|e| {
                        AppError::BadRequest(anyhow::anyhow!("Malformed checkout session: {}", e))
                    })?;

                match session.mode.as_str() {
                    "subscription" => self.handle_subscription_checkout(event, &session).await,
                    "payment" => self.handle_purchase(event, &session).await,
                    other => {
                        tracing::debug!(mode = %other, "Unhandled checkout mode");
                        Ok(Outcome::Ignored)
                    }
                }
            }
            "customer.subscription.updated" => {
                let subscription: StripeSubscription =
                    serde_json::from_value(event.data.object.clone()).map_err(|e| {
                        AppError::BadRequest(anyhow::anyhow!("Malformed subscription: {}", e))
                    })?;
                self.handle_subscription_updated(&subscription).await
            }
            "customer.subscription.deleted" => {
                let subscription: StripeSubscription =
                    serde_json::from_value(event.data.object.clone()).map_err(|e| {
                        AppError::BadRequest(anyhow::anyhow!("Malformed subscription: {}", e))
                    })?;
                self.handle_subscription_deleted(&subscription).await
            }
            other => {
                tracing::debug!(event_type = %other, "Unhandled webhook event type");
                Ok(Outcome::Ignored)
            }
        }
    }

    async fn handle_subscription_checkout(
        &self,
        event: &StripeEvent,
        session: &CheckoutSession,
    ) -> Result<Outcome, AppError> {
        let Some(user_id) = session.local_user_id() else {
            // Retrying cannot attach a user, so acknowledge and move on.
            tracing::warn!(
                event_id = %event.id,
                session_id = %session.id,
                "Subscription checkout without user reference"
            );
            return Ok(Outcome::Ignored);
        };

        let Some(subscription_id) = session.subscription.as_deref() else {
            tracing::warn!(
                event_id = %event.id,
                session_id = %session.id,
                "Subscription checkout without subscription id"
            );
            return Ok(Outcome::Ignored);
        };

        let subscription = self
            .subscriptions
            .fetch_subscription(subscription_id)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to fetch subscription from provider");
                AppError::BadGateway(format!("Provider subscription fetch failed: {}", e))
            })?;

        let email = session
            .customer_details
            .as_ref()
            .and_then(|d| d.email.clone());

        let state = subscription_state_from(&subscription, email.clone(), Utc::now());
        let status = state.status;

        self.store
            .apply_subscription_state(user_id, state)
            .await?;

        tracing::info!(
            user_id = %user_id,
            subscription_id = %subscription.id,
            status = %status,
            "Subscription checkout reconciled"
        );

        // Best-effort side channel.
        if let Err(e) = self
            .notifier
            .notify(
                user_id,
                "Vitaj v Študko Pro!",
                "Tvoje predplatné je aktívne. Veľa šťastia pri učení!",
                "subscription",
            )
            .await
        {
            tracing::warn!(user_id = %user_id, error = %e, "Welcome notification failed");
        }

        if let Some(email) = email {
            if let Err(e) = self
                .notifier
                .send_email(
                    &email,
                    "Vitaj v Študko Pro",
                    "Tvoje predplatné Študko Pro je aktívne.",
                )
                .await
            {
                tracing::warn!(user_id = %user_id, error = %e, "Welcome email failed");
            }
        }

        Ok(Outcome::Processed)
    }

    async fn handle_subscription_updated(
        &self,
        subscription: &StripeSubscription,
    ) -> Result<Outcome, AppError> {
        let state = subscription_state_from(subscription, None, Utc::now());
        let status = state.status;

        let matched = self
            .store
            .apply_subscription_state_by_customer(&subscription.customer, state)
            .await?;

        if !matched {
            tracing::warn!(
                customer_id = %subscription.customer,
                "Subscription update for unknown customer"
            );
            return Ok(Outcome::Ignored);
        }

        tracing::info!(
            customer_id = %subscription.customer,
            status = %status,
            "Subscription update reconciled"
        );

        Ok(Outcome::Processed)
    }

    async fn handle_subscription_deleted(
        &self,
        subscription: &StripeSubscription,
    ) -> Result<Outcome, AppError> {
        let profile = self
            .store
            .find_profile_by_customer(&subscription.customer)
            .await?;

        let matched = self
            .store
            .apply_subscription_state_by_customer(&subscription.customer, canceled_state())
            .await?;

        if !matched {
            tracing::warn!(
                customer_id = %subscription.customer,
                "Subscription deletion for unknown customer"
            );
            return Ok(Outcome::Ignored);
        }

        tracing::info!(
            customer_id = %subscription.customer,
            "Subscription deletion reconciled"
        );

        if let Some(email) = profile.and_then(|p| p.email) {
            if let Err(e) = self
                .notifier
                .send_email(
                    &email,
                    "Predplatné Študko Pro zrušené",
                    "Tvoje predplatné bolo zrušené. Budeme radi, keď sa vrátiš.",
                )
                .await
            {
                tracing::warn!(error = %e, "Cancellation email failed");
            }
        }

        Ok(Outcome::Processed)
    }

    async fn handle_purchase(
        &self,
        event: &StripeEvent,
        session: &CheckoutSession,
    ) -> Result<Outcome, AppError> {
        let Some(buyer_id) = session.local_user_id() else {
            tracing::warn!(
                event_id = %event.id,
                session_id = %session.id,
                "Purchase checkout without buyer reference"
            );
            return Ok(Outcome::Ignored);
        };

        let Some(note_id) = session.metadata.get("note_id") else {
            tracing::warn!(
                event_id = %event.id,
                session_id = %session.id,
                "Purchase checkout without note_id metadata"
            );
            return Ok(Outcome::Ignored);
        };

        let price = match session.amount_total {
            Some(amount) => price_from_minor_units(amount),
            None => {
                tracing::warn!(
                    session_id = %session.id,
                    "Purchase checkout without amount_total, recording zero price"
                );
                0.0
            }
        };

        let currency = session.currency.clone();
        let purchase = Purchase {
            id: uuid::Uuid::new_v4(),
            buyer_id: buyer_id.to_string(),
            note_id: note_id.clone(),
            seller_id: session.metadata.get("seller_id").cloned(),
            price,
            currency: currency.clone(),
            provider_event_id: event.id.clone(),
            created_utc: Utc::now(),
        };

        let inserted = self.store.record_purchase(purchase).await?;

        if !inserted {
            tracing::info!(
                buyer_id = %buyer_id,
                note_id = %note_id,
                "Purchase already recorded for this buyer and note, skipping"
            );
            return Ok(Outcome::Duplicate);
        }

        self.store.add_xp(buyer_id, leveling::PURCHASE_XP).await?;
        crate::services::metrics::record_purchase(&currency);

        tracing::info!(
            buyer_id = %buyer_id,
            note_id = %note_id,
            price,
            "Purchase recorded"
        );

        if let Err(e) = self
            .notifier
            .notify(
                buyer_id,
                "Nákup poznámok",
                "Tvoj nákup poznámok bol úspešný.",
                "purchase",
            )
            .await
        {
            tracing::warn!(buyer_id = %buyer_id, error = %e, "Purchase notification failed");
        }

        Ok(Outcome::Processed)
    }
}
