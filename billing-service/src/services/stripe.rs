//! Stripe payment provider client.
//!
//! Implements webhook signature verification in Stripe's `t=...,v1=...`
//! header scheme and the small slice of the Subscriptions API the
//! reconciliation flow needs.

use crate::config::StripeConfig;
use anyhow::{anyhow, Result};
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::HashMap;

/// Stripe client for webhook verification and API calls.
#[derive(Clone)]
pub struct StripeClient {
    client: Client,
    config: StripeConfig,
}

/// A deserialized webhook event envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

/// Checkout session object carried by `checkout.session.completed`.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub mode: String,
    pub client_reference_id: Option<String>,
    pub customer: Option<String>,
    pub subscription: Option<String>,
    pub amount_total: Option<u64>,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub customer_details: Option<CustomerDetails>,
}

fn default_currency() -> String {
    "eur".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomerDetails {
    pub email: Option<String>,
}

impl CheckoutSession {
    /// Resolve the local user: `client_reference_id` first, then
    /// `metadata.user_id`.
    pub fn local_user_id(&self) -> Option<&str> {
        self.client_reference_id
            .as_deref()
            .or_else(|| self.metadata.get("user_id").map(|s| s.as_str()))
    }
}

/// Subscription object, from the API or from an event payload.
/// Serializes back to the wire shape so fixtures can round-trip it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeSubscription {
    pub id: String,
    pub status: String,
    pub customer: String,
    /// Trial end as unix seconds, present while trialing.
    pub trial_end: Option<i64>,
    pub current_period_end: Option<i64>,
}

impl StripeClient {
    pub fn new(config: StripeConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.config.secret_key.expose_secret().is_empty()
            && !self.config.webhook_secret.expose_secret().is_empty()
    }

    /// Verify a `Stripe-Signature` header against the raw request body.
    ///
    /// The header carries `t=<unix>,v1=<hex>[,v1=<hex>...]`; the expected
    /// signature is `HMAC-SHA256(webhook_secret, "{t}.{body}")`. Timestamps
    /// older than the configured tolerance are rejected to limit replay of
    /// captured payloads.
    pub fn verify_webhook_signature(&self, body: &str, header: &str) -> Result<bool> {
        self.verify_webhook_signature_at(body, header, Utc::now().timestamp())
    }

    fn verify_webhook_signature_at(&self, body: &str, header: &str, now_unix: i64) -> Result<bool> {
        let mut timestamp: Option<i64> = None;
        let mut candidates: Vec<&str> = Vec::new();

        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => timestamp = value.parse().ok(),
                Some(("v1", value)) => candidates.push(value),
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or_else(|| anyhow!("Malformed signature header"))?;
        if candidates.is_empty() {
            return Err(anyhow!("Malformed signature header"));
        }

        if (now_unix - timestamp).abs() > self.config.signature_tolerance_secs {
            tracing::warn!(timestamp, "Webhook timestamp outside tolerance");
            return Ok(false);
        }

        let payload = format!("{}.{}", timestamp, body);
        let expected =
            compute_signature(&payload, self.config.webhook_secret.expose_secret())?;

        let is_valid = candidates.iter().any(|c| *c == expected);
        if !is_valid {
            tracing::warn!("Webhook signature verification failed");
        }

        Ok(is_valid)
    }

    /// Parse a webhook event envelope from the raw body.
    pub fn parse_webhook_event(&self, body: &str) -> Result<StripeEvent> {
        let event: StripeEvent = serde_json::from_str(body)?;
        Ok(event)
    }

    /// Fetch a subscription object from the provider API.
    pub async fn get_subscription(&self, subscription_id: &str) -> Result<StripeSubscription> {
        if !self.is_configured() {
            return Err(anyhow!("Stripe credentials not configured"));
        }

        let url = format!("{}/subscriptions/{}", self.config.api_base_url, subscription_id);

        let response = self
            .client
            .get(&url)
            .bearer_auth(self.config.secret_key.expose_secret())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        tracing::debug!(status = %status, "Stripe get_subscription response");

        if status.is_success() {
            let subscription: StripeSubscription = serde_json::from_str(&body)?;
            Ok(subscription)
        } else {
            Err(anyhow!(
                "Stripe error fetching subscription {}: {} - {}",
                subscription_id,
                status,
                body
            ))
        }
    }

    /// Cancel a subscription immediately on the provider side.
    pub async fn cancel_subscription(&self, subscription_id: &str) -> Result<StripeSubscription> {
        if !self.is_configured() {
            return Err(anyhow!("Stripe credentials not configured"));
        }

        let url = format!("{}/subscriptions/{}", self.config.api_base_url, subscription_id);

        let response = self
            .client
            .delete(&url)
            .bearer_auth(self.config.secret_key.expose_secret())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            let subscription: StripeSubscription = serde_json::from_str(&body)?;
            tracing::info!(
                subscription_id = %subscription.id,
                status = %subscription.status,
                "Subscription canceled at provider"
            );
            Ok(subscription)
        } else {
            Err(anyhow!(
                "Stripe error canceling subscription {}: {} - {}",
                subscription_id,
                status,
                body
            ))
        }
    }
}

/// Compute HMAC-SHA256 over the payload, hex encoded.
fn compute_signature(payload: &str, secret: &str) -> Result<String> {
    type HmacSha256 = Hmac<Sha256>;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| anyhow!("Invalid key length"))?;
    mac.update(payload.as_bytes());
    let result = mac.finalize();
    Ok(hex::encode(result.into_bytes()))
}
