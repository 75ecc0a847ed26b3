//! Best-effort notification side channel.
//!
//! Reconciliation calls these after the primary state write; failures are
//! logged by the caller and swallowed, they never affect the webhook
//! response.

use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

use crate::config::NotifierConfig;

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Insert an in-app notification row for a user.
    async fn notify(&self, user_id: &str, title: &str, body: &str, kind: &str)
        -> anyhow::Result<()>;

    /// Send a transactional email.
    async fn send_email(&self, to: &str, subject: &str, body_text: &str) -> anyhow::Result<()>;
}

/// HTTP client for the notification-service.
#[derive(Clone)]
pub struct HttpNotifier {
    client: reqwest::Client,
    config: NotifierConfig,
}

impl HttpNotifier {
    pub fn new(config: NotifierConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        Self { client, config }
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn notify(
        &self,
        user_id: &str,
        title: &str,
        body: &str,
        kind: &str,
    ) -> anyhow::Result<()> {
        if !self.config.enabled {
            tracing::debug!(user_id = %user_id, "Notifier disabled, skipping notification");
            return Ok(());
        }

        let url = format!("{}/notifications", self.config.base_url);
        let response = self
            .client
            .post(&url)
            .json(&json!({
                "user_id": user_id,
                "title": title,
                "body": body,
                "kind": kind,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!(
                "notification-service returned {} for notification insert",
                response.status()
            );
        }

        Ok(())
    }

    async fn send_email(&self, to: &str, subject: &str, body_text: &str) -> anyhow::Result<()> {
        if !self.config.enabled {
            tracing::debug!(to = %to, "Notifier disabled, skipping email");
            return Ok(());
        }

        let url = format!("{}/emails", self.config.base_url);
        let response = self
            .client
            .post(&url)
            .json(&json!({
                "to": to,
                "subject": subject,
                "body_text": body_text,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!(
                "notification-service returned {} for email send",
                response.status()
            );
        }

        Ok(())
    }
}

/// Mock notifier for tests. Counts calls and can be made to fail to verify
/// the best-effort contract.
pub struct MockNotifier {
    fail: bool,
    notifications: std::sync::atomic::AtomicU64,
    emails: std::sync::atomic::AtomicU64,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self {
            fail: false,
            notifications: std::sync::atomic::AtomicU64::new(0),
            emails: std::sync::atomic::AtomicU64::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            notifications: std::sync::atomic::AtomicU64::new(0),
            emails: std::sync::atomic::AtomicU64::new(0),
        }
    }

    pub fn notification_count(&self) -> u64 {
        self.notifications.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub fn email_count(&self) -> u64 {
        self.emails.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl Default for MockNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn notify(
        &self,
        _user_id: &str,
        _title: &str,
        _body: &str,
        _kind: &str,
    ) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("mock notifier failure");
        }
        self.notifications
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }

    async fn send_email(&self, _to: &str, _subject: &str, _body_text: &str) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("mock notifier failure");
        }
        self.emails
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }
}
