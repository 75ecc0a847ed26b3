use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    InApp,
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::Email => write!(f, "email"),
            Channel::InApp => write!(f, "inapp"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Queued,
    Sent,
    Failed,
    Read,
}

impl std::fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationStatus::Queued => write!(f, "queued"),
            NotificationStatus::Sent => write!(f, "sent"),
            NotificationStatus::Failed => write!(f, "failed"),
            NotificationStatus::Read => write!(f, "read"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub notification_id: String,
    pub channel: Channel,
    pub status: NotificationStatus,
    /// Email address for `Channel::Email`, user id for `Channel::InApp`.
    pub recipient: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    /// Application category for in-app rows, e.g. "subscription" or "purchase".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_utc: DateTime<Utc>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "opt_chrono_datetime_as_bson_datetime"
    )]
    pub sent_utc: Option<DateTime<Utc>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "opt_chrono_datetime_as_bson_datetime"
    )]
    pub failed_utc: Option<DateTime<Utc>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "opt_chrono_datetime_as_bson_datetime"
    )]
    pub read_utc: Option<DateTime<Utc>>,
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

impl Notification {
    pub fn new_email(
        recipient: String,
        subject: String,
        body_text: Option<String>,
        body_html: Option<String>,
        from_name: Option<String>,
        reply_to: Option<String>,
        metadata: HashMap<String, String>,
    ) -> Self {
        Self {
            id: None,
            notification_id: uuid::Uuid::new_v4().to_string(),
            channel: Channel::Email,
            status: NotificationStatus::Queued,
            recipient,
            subject: Some(subject),
            body: body_text,
            body_html,
            from_name,
            reply_to,
            kind: None,
            metadata,
            provider_id: None,
            error_message: None,
            created_utc: Utc::now(),
            sent_utc: None,
            failed_utc: None,
            read_utc: None,
        }
    }

    pub fn new_in_app(
        user_id: String,
        title: String,
        body: String,
        kind: Option<String>,
        metadata: HashMap<String, String>,
    ) -> Self {
        Self {
            id: None,
            notification_id: uuid::Uuid::new_v4().to_string(),
            channel: Channel::InApp,
            status: NotificationStatus::Sent,
            recipient: user_id,
            subject: Some(title),
            body: Some(body),
            body_html: None,
            from_name: None,
            reply_to: None,
            kind,
            metadata,
            provider_id: None,
            error_message: None,
            created_utc: Utc::now(),
            sent_utc: Some(Utc::now()),
            failed_utc: None,
            read_utc: None,
        }
    }

    pub fn mark_sent(&mut self, provider_id: Option<String>) {
        self.status = NotificationStatus::Sent;
        self.sent_utc = Some(Utc::now());
        self.provider_id = provider_id;
    }

    pub fn mark_failed(&mut self, error: String) {
        self.status = NotificationStatus::Failed;
        self.failed_utc = Some(Utc::now());
        self.error_message = Some(error);
    }

    pub fn mark_read(&mut self) {
        self.status = NotificationStatus::Read;
        self.read_utc = Some(Utc::now());
    }

    pub fn is_read(&self) -> bool {
        self.read_utc.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_notification_starts_queued() {
        let n = Notification::new_email(
            "student@example.com".to_string(),
            "Vitaj".to_string(),
            Some("Ahoj".to_string()),
            None,
            None,
            None,
            HashMap::new(),
        );
        assert_eq!(n.channel, Channel::Email);
        assert_eq!(n.status, NotificationStatus::Queued);
        assert!(n.sent_utc.is_none());
    }

    #[test]
    fn in_app_notification_is_immediately_sent() {
        let n = Notification::new_in_app(
            "user-1".to_string(),
            "Nová platba".to_string(),
            "Tvoj nákup prebehol úspešne.".to_string(),
            Some("purchase".to_string()),
            HashMap::new(),
        );
        assert_eq!(n.channel, Channel::InApp);
        assert_eq!(n.status, NotificationStatus::Sent);
        assert!(n.sent_utc.is_some());
        assert!(!n.is_read());
    }

    #[test]
    fn mark_read_sets_timestamp_and_status() {
        let mut n = Notification::new_in_app(
            "user-1".to_string(),
            "t".to_string(),
            "b".to_string(),
            None,
            HashMap::new(),
        );
        n.mark_read();
        assert_eq!(n.status, NotificationStatus::Read);
        assert!(n.is_read());
    }

    #[test]
    fn mark_sent_records_provider_id() {
        let mut n = Notification::new_email(
            "x@example.com".to_string(),
            "s".to_string(),
            Some("b".to_string()),
            None,
            None,
            None,
            HashMap::new(),
        );
        n.mark_sent(Some("smtp-msg-1".to_string()));
        assert_eq!(n.status, NotificationStatus::Sent);
        assert_eq!(n.provider_id.as_deref(), Some("smtp-msg-1"));
        assert!(n.sent_utc.is_some());
    }

    #[test]
    fn mark_failed_records_error() {
        let mut n = Notification::new_email(
            "x@example.com".to_string(),
            "s".to_string(),
            Some("b".to_string()),
            None,
            None,
            None,
            HashMap::new(),
        );
        n.mark_failed("smtp timeout".to_string());
        assert_eq!(n.status, NotificationStatus::Failed);
        assert_eq!(n.error_message.as_deref(), Some("smtp timeout"));
    }
}
