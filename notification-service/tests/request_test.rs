use notification_service::handlers::email::SendEmailRequest;
use notification_service::handlers::in_app::CreateNotificationRequest;
use validator::Validate;

#[test]
fn email_request_requires_valid_address() {
    let request: SendEmailRequest = serde_json::from_value(serde_json::json!({
        "to": "not-an-email",
        "subject": "Hello",
        "body_text": "body",
    }))
    .unwrap();

    assert!(request.validate().is_err());
}

#[test]
fn email_request_accepts_well_formed_payload() {
    let request: SendEmailRequest = serde_json::from_value(serde_json::json!({
        "to": "student@example.com",
        "subject": "Vitaj v Študko Pro!",
        "body_text": "Ahoj!",
        "metadata": { "user_id": "user-1" },
    }))
    .unwrap();

    assert!(request.validate().is_ok());
    assert_eq!(request.metadata.get("user_id").map(String::as_str), Some("user-1"));
}

#[test]
fn in_app_request_rejects_empty_title() {
    let request: CreateNotificationRequest = serde_json::from_value(serde_json::json!({
        "user_id": "user-1",
        "title": "",
        "body": "Tvoj nákup prebehol úspešne.",
    }))
    .unwrap();

    assert!(request.validate().is_err());
}

#[test]
fn in_app_request_kind_is_optional() {
    let request: CreateNotificationRequest = serde_json::from_value(serde_json::json!({
        "user_id": "user-1",
        "title": "Nová platba",
        "body": "Tvoj nákup prebehol úspešne.",
        "kind": "purchase",
    }))
    .unwrap();

    assert!(request.validate().is_ok());
    assert_eq!(request.kind.as_deref(), Some("purchase"));
}
