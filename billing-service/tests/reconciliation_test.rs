mod common;

use std::sync::Arc;

use billing_service::models::{leveling, SubscriptionStatus};
use billing_service::services::{MockNotifier, Outcome, Reconciler};
use chrono::{Duration, Utc};

use common::{
    event, purchase_event, subscription_checkout_event, subscription_object, InMemoryStore,
    MockSubscriptions,
};

fn reconciler_with(
    store: Arc<InMemoryStore>,
    subscriptions: Arc<MockSubscriptions>,
    notifier: Arc<MockNotifier>,
) -> Reconciler {
    Reconciler::new(store, subscriptions, notifier)
}

#[tokio::test]
async fn subscription_checkout_activates_profile() {
    let store = Arc::new(InMemoryStore::new());
    let subscriptions = Arc::new(MockSubscriptions::returning(subscription_object(
        "active", None,
    )));
    let notifier = Arc::new(MockNotifier::new());
    let reconciler = reconciler_with(store.clone(), subscriptions, notifier.clone());

    let outcome = reconciler
        .process_event(&subscription_checkout_event("evt_1", "user-1"))
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Processed);

    let profile = store.profile("user-1").expect("profile should exist");
    assert_eq!(profile.subscription_status, SubscriptionStatus::Active);
    assert!(profile.is_pro);
    assert!(!profile.trial_used);
    assert_eq!(profile.provider_customer_id.as_deref(), Some("cus_1"));
    assert_eq!(profile.provider_subscription_id.as_deref(), Some("sub_1"));
    assert_eq!(profile.email.as_deref(), Some("student@example.com"));

    assert_eq!(notifier.notification_count(), 1);
    assert_eq!(notifier.email_count(), 1);
}

#[tokio::test]
async fn trialing_checkout_sets_trial_flag_and_expiry() {
    let trial_end = (Utc::now() + Duration::days(7)).timestamp();
    let store = Arc::new(InMemoryStore::new());
    let subscriptions = Arc::new(MockSubscriptions::returning(subscription_object(
        "trialing",
        Some(trial_end),
    )));
    let notifier = Arc::new(MockNotifier::new());
    let reconciler = reconciler_with(store.clone(), subscriptions, notifier);

    reconciler
        .process_event(&subscription_checkout_event("evt_1", "user-1"))
        .await
        .unwrap();

    let profile = store.profile("user-1").unwrap();
    assert_eq!(profile.subscription_status, SubscriptionStatus::Trialing);
    assert!(profile.is_pro);
    assert!(profile.trial_used);
    assert_eq!(
        profile.trial_ends_utc.map(|t| t.timestamp()),
        Some(trial_end)
    );
}

#[tokio::test]
async fn trial_flag_is_never_cleared() {
    let trial_end = (Utc::now() + Duration::days(7)).timestamp();
    let store = Arc::new(InMemoryStore::new());
    let subscriptions = Arc::new(MockSubscriptions::returning(subscription_object(
        "trialing",
        Some(trial_end),
    )));
    let notifier = Arc::new(MockNotifier::new());
    let reconciler = reconciler_with(store.clone(), subscriptions, notifier);

    reconciler
        .process_event(&subscription_checkout_event("evt_1", "user-1"))
        .await
        .unwrap();
    assert!(store.profile("user-1").unwrap().trial_used);

    // Trial converts to a paid subscription.
    reconciler
        .process_event(&event(
            "evt_2",
            "customer.subscription.updated",
            serde_json::to_value(subscription_object("active", None)).unwrap(),
        ))
        .await
        .unwrap();
    assert!(store.profile("user-1").unwrap().trial_used);

    // And is later canceled.
    reconciler
        .process_event(&event(
            "evt_3",
            "customer.subscription.deleted",
            serde_json::to_value(subscription_object("canceled", None)).unwrap(),
        ))
        .await
        .unwrap();

    let profile = store.profile("user-1").unwrap();
    assert!(profile.trial_used);
    assert_eq!(profile.subscription_status, SubscriptionStatus::Canceled);
    assert!(!profile.is_pro);
}

#[tokio::test]
async fn replayed_event_is_a_noop() {
    let store = Arc::new(InMemoryStore::new());
    let subscriptions = Arc::new(MockSubscriptions::returning(subscription_object(
        "active", None,
    )));
    let notifier = Arc::new(MockNotifier::new());
    let reconciler = reconciler_with(store.clone(), subscriptions, notifier.clone());

    let event = subscription_checkout_event("evt_1", "user-1");

    assert_eq!(
        reconciler.process_event(&event).await.unwrap(),
        Outcome::Processed
    );
    assert_eq!(
        reconciler.process_event(&event).await.unwrap(),
        Outcome::Duplicate
    );

    // Side effects fired exactly once.
    assert_eq!(notifier.notification_count(), 1);
    assert_eq!(notifier.email_count(), 1);
}

#[tokio::test]
async fn duplicate_purchase_yields_single_row() {
    let store = Arc::new(InMemoryStore::new());
    let subscriptions = Arc::new(MockSubscriptions::default());
    let notifier = Arc::new(MockNotifier::new());
    let reconciler = reconciler_with(store.clone(), subscriptions, notifier);

    assert_eq!(
        reconciler
            .process_event(&purchase_event("evt_1", "buyer-1", "note-1", 500))
            .await
            .unwrap(),
        Outcome::Processed
    );

    // The provider redelivers under a fresh event id.
    assert_eq!(
        reconciler
            .process_event(&purchase_event("evt_2", "buyer-1", "note-1", 500))
            .await
            .unwrap(),
        Outcome::Duplicate
    );

    assert_eq!(store.purchase_count(), 1);
    assert_eq!(
        store.profile("buyer-1").map(|p| p.xp),
        Some(leveling::PURCHASE_XP)
    );
}

#[tokio::test]
async fn first_purchase_creates_profile_and_awards_xp() {
    let store = Arc::new(InMemoryStore::new());
    let subscriptions = Arc::new(MockSubscriptions::default());
    let notifier = Arc::new(MockNotifier::new());
    let reconciler = reconciler_with(store.clone(), subscriptions, notifier);

    // No subscription webhook has ever arrived for this buyer.
    assert!(store.profile("buyer-1").is_none());

    assert_eq!(
        reconciler
            .process_event(&purchase_event("evt_1", "buyer-1", "note-1", 500))
            .await
            .unwrap(),
        Outcome::Processed
    );

    let profile = store.profile("buyer-1").expect("profile should be created");
    assert_eq!(profile.xp, leveling::PURCHASE_XP);
    assert_eq!(profile.subscription_status, SubscriptionStatus::None);
    assert!(!profile.is_pro);
}

#[tokio::test]
async fn purchase_price_converted_from_minor_units() {
    let store = Arc::new(InMemoryStore::new());
    let subscriptions = Arc::new(MockSubscriptions::default());
    let notifier = Arc::new(MockNotifier::new());
    let reconciler = reconciler_with(store.clone(), subscriptions, notifier);

    reconciler
        .process_event(&purchase_event("evt_1", "buyer-1", "note-1", 1000))
        .await
        .unwrap();

    let purchases = store.purchases.lock().unwrap();
    assert_eq!(purchases.len(), 1);
    assert_eq!(purchases[0].price, 10.00);
    assert_eq!(purchases[0].currency, "eur");
    assert_eq!(purchases[0].seller_id.as_deref(), Some("seller-1"));
}

#[tokio::test]
async fn failing_notifier_does_not_fail_reconciliation() {
    let store = Arc::new(InMemoryStore::new());
    let subscriptions = Arc::new(MockSubscriptions::returning(subscription_object(
        "active", None,
    )));
    let notifier = Arc::new(MockNotifier::failing());
    let reconciler = reconciler_with(store.clone(), subscriptions, notifier);

    let outcome = reconciler
        .process_event(&subscription_checkout_event("evt_1", "user-1"))
        .await
        .unwrap();

    // Primary write landed even though every side effect failed.
    assert_eq!(outcome, Outcome::Processed);
    assert!(store.profile("user-1").unwrap().is_pro);
}

#[tokio::test]
async fn unhandled_event_types_are_ignored() {
    let store = Arc::new(InMemoryStore::new());
    let subscriptions = Arc::new(MockSubscriptions::default());
    let notifier = Arc::new(MockNotifier::new());
    let reconciler = reconciler_with(store.clone(), subscriptions, notifier);

    let outcome = reconciler
        .process_event(&event(
            "evt_1",
            "invoice.payment_succeeded",
            serde_json::json!({}),
        ))
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Ignored);
    assert!(store.profile("user-1").is_none());
}

#[tokio::test]
async fn subscription_update_for_unknown_customer_is_ignored() {
    let store = Arc::new(InMemoryStore::new());
    let subscriptions = Arc::new(MockSubscriptions::default());
    let notifier = Arc::new(MockNotifier::new());
    let reconciler = reconciler_with(store.clone(), subscriptions, notifier);

    let outcome = reconciler
        .process_event(&event(
            "evt_1",
            "customer.subscription.updated",
            serde_json::to_value(subscription_object("active", None)).unwrap(),
        ))
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Ignored);
}

#[tokio::test]
async fn provider_failure_releases_event_for_retry() {
    let store = Arc::new(InMemoryStore::new());
    let subscriptions = Arc::new(MockSubscriptions::returning(subscription_object(
        "active", None,
    )));
    subscriptions.set_fail(true);
    let notifier = Arc::new(MockNotifier::new());
    let reconciler = reconciler_with(store.clone(), subscriptions.clone(), notifier);

    let event = subscription_checkout_event("evt_1", "user-1");

    assert!(reconciler.process_event(&event).await.is_err());

    // Redelivery after the provider recovers must not be treated as a
    // duplicate of the failed attempt.
    subscriptions.set_fail(false);
    assert_eq!(
        reconciler.process_event(&event).await.unwrap(),
        Outcome::Processed
    );
    assert!(store.profile("user-1").unwrap().is_pro);
}

#[tokio::test]
async fn checkout_without_user_reference_is_acknowledged() {
    let store = Arc::new(InMemoryStore::new());
    let subscriptions = Arc::new(MockSubscriptions::default());
    let notifier = Arc::new(MockNotifier::new());
    let reconciler = reconciler_with(store.clone(), subscriptions, notifier);

    let outcome = reconciler
        .process_event(&event(
            "evt_1",
            "checkout.session.completed",
            serde_json::json!({ "id": "cs_1", "mode": "subscription", "subscription": "sub_1" }),
        ))
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Ignored);
}
