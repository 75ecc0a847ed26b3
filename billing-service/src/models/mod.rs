//! Billing domain models.

pub mod leveling;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Local subscription state, derived exclusively from payment provider events.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    None,
    Trialing,
    Active,
    Canceled,
}

impl SubscriptionStatus {
    /// Map a provider subscription status string onto the local enum.
    ///
    /// `past_due` and `incomplete` map to `None`: access is cut immediately
    /// but the subscription is not terminally canceled on the provider side.
    pub fn from_provider(status: &str) -> Self {
        match status {
            "active" => SubscriptionStatus::Active,
            "trialing" => SubscriptionStatus::Trialing,
            "canceled" | "unpaid" | "incomplete_expired" => SubscriptionStatus::Canceled,
            _ => SubscriptionStatus::None,
        }
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubscriptionStatus::None => write!(f, "none"),
            SubscriptionStatus::Trialing => write!(f, "trialing"),
            SubscriptionStatus::Active => write!(f, "active"),
            SubscriptionStatus::Canceled => write!(f, "canceled"),
        }
    }
}

/// Whether a user counts as "pro" for a given status and trial expiry,
/// evaluated at `now`.
pub fn is_pro(
    status: SubscriptionStatus,
    trial_ends_utc: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    match status {
        SubscriptionStatus::Active => true,
        SubscriptionStatus::Trialing => trial_ends_utc.map(|end| end > now).unwrap_or(false),
        _ => false,
    }
}

/// A user's billing profile.
///
/// `trial_used` is monotonic: once true it is never written back to false.
/// The repository enforces this by only ever setting it to true.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub subscription_status: SubscriptionStatus,
    pub is_pro: bool,
    #[serde(default)]
    pub trial_used: bool,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "opt_chrono_datetime_as_bson_datetime"
    )]
    pub trial_ends_utc: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_customer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_subscription_id: Option<String>,
    #[serde(default)]
    pub xp: u64,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_utc: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_utc: DateTime<Utc>,
}

impl Profile {
    pub fn new(user_id: String) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            email: None,
            subscription_status: SubscriptionStatus::None,
            is_pro: false,
            trial_used: false,
            trial_ends_utc: None,
            provider_customer_id: None,
            provider_subscription_id: None,
            xp: 0,
            created_utc: now,
            updated_utc: now,
        }
    }

    /// Pro status evaluated against the current time, so an expired trial
    /// reads as not-pro even before the provider delivers a webhook.
    pub fn is_pro_now(&self) -> bool {
        is_pro(self.subscription_status, self.trial_ends_utc, Utc::now())
    }

    pub fn level(&self) -> u32 {
        leveling::level_for_xp(self.xp)
    }
}

/// The subscription fields of a profile written during reconciliation.
#[derive(Debug, Clone)]
pub struct SubscriptionState {
    pub status: SubscriptionStatus,
    pub is_pro: bool,
    pub trial_ends_utc: Option<DateTime<Utc>>,
    /// Set true when the provider reports a trial; never used to clear the flag.
    pub trial_started: bool,
    pub provider_customer_id: Option<String>,
    pub provider_subscription_id: Option<String>,
    pub email: Option<String>,
}

/// A one-time note purchase. At most one row exists per (buyer, note);
/// a unique index backs this up against duplicate webhook delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Purchase {
    pub id: Uuid,
    pub buyer_id: String,
    pub note_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seller_id: Option<String>,
    /// Price in major currency units, converted from the provider's minor units.
    pub price: f64,
    pub currency: String,
    pub provider_event_id: String,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_utc: DateTime<Utc>,
}

/// Record of a processed webhook event, keyed by the provider event id.
/// The unique index on `event_id` is what makes webhook replay idempotent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEventRecord {
    pub event_id: String,
    pub event_type: String,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub received_utc: DateTime<Utc>,
}

impl WebhookEventRecord {
    pub fn new(event_id: String, event_type: String) -> Self {
        Self {
            event_id,
            event_type,
            received_utc: Utc::now(),
        }
    }
}

/// Convert a provider amount in minor units (cents) to major units.
pub fn price_from_minor_units(amount: u64) -> f64 {
    amount as f64 / 100.0
}

// Helper module for optional DateTime<Utc> as BSON DateTime
mod opt_chrono_datetime_as_bson_datetime {
    use chrono::{DateTime, Utc};
    use mongodb::bson;
    use serde::{self, Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(date: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match date {
            Some(dt) => {
                let bson_dt = bson::DateTime::from_chrono(*dt);
                bson_dt.serialize(serializer)
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt: Option<bson::DateTime> = Option::deserialize(deserializer)?;
        Ok(opt.map(|dt| dt.to_chrono()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn provider_status_mapping() {
        assert_eq!(
            SubscriptionStatus::from_provider("active"),
            SubscriptionStatus::Active
        );
        assert_eq!(
            SubscriptionStatus::from_provider("trialing"),
            SubscriptionStatus::Trialing
        );
        assert_eq!(
            SubscriptionStatus::from_provider("canceled"),
            SubscriptionStatus::Canceled
        );
        assert_eq!(
            SubscriptionStatus::from_provider("unpaid"),
            SubscriptionStatus::Canceled
        );
        assert_eq!(
            SubscriptionStatus::from_provider("incomplete_expired"),
            SubscriptionStatus::Canceled
        );
        assert_eq!(
            SubscriptionStatus::from_provider("past_due"),
            SubscriptionStatus::None
        );
        assert_eq!(
            SubscriptionStatus::from_provider("incomplete"),
            SubscriptionStatus::None
        );
        assert_eq!(
            SubscriptionStatus::from_provider("something_new"),
            SubscriptionStatus::None
        );
    }

    #[test]
    fn pro_derivation() {
        let now = Utc::now();
        assert!(is_pro(SubscriptionStatus::Active, None, now));
        assert!(is_pro(
            SubscriptionStatus::Trialing,
            Some(now + Duration::days(3)),
            now
        ));
        assert!(!is_pro(
            SubscriptionStatus::Trialing,
            Some(now - Duration::hours(1)),
            now
        ));
        assert!(!is_pro(SubscriptionStatus::Trialing, None, now));
        assert!(!is_pro(SubscriptionStatus::Canceled, None, now));
        assert!(!is_pro(SubscriptionStatus::None, None, now));
    }

    #[test]
    fn minor_unit_conversion() {
        assert_eq!(price_from_minor_units(1000), 10.00);
        assert_eq!(price_from_minor_units(0), 0.0);
        assert_eq!(price_from_minor_units(199), 1.99);
        assert_eq!(price_from_minor_units(50), 0.50);
    }
}
