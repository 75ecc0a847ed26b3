use billing_service::config::NotifierConfig;
use billing_service::services::{HttpNotifier, Notifier};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn notifier_for(server: &MockServer, enabled: bool) -> HttpNotifier {
    HttpNotifier::new(NotifierConfig {
        base_url: server.uri(),
        enabled,
    })
}

#[tokio::test]
async fn posts_in_app_notifications() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/notifications"))
        .and(body_partial_json(serde_json::json!({
            "user_id": "user-1",
            "title": "Vitaj v Študko Pro!",
            "kind": "subscription",
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let notifier = notifier_for(&server, true);
    notifier
        .notify("user-1", "Vitaj v Študko Pro!", "Predplatné je aktívne.", "subscription")
        .await
        .unwrap();
}

#[tokio::test]
async fn posts_transactional_emails() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/emails"))
        .and(body_partial_json(serde_json::json!({
            "to": "student@example.com",
            "subject": "Vitaj v Študko Pro!",
        })))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let notifier = notifier_for(&server, true);
    notifier
        .send_email("student@example.com", "Vitaj v Študko Pro!", "Ahoj!")
        .await
        .unwrap();
}

#[tokio::test]
async fn surfaces_downstream_errors_to_the_caller() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/notifications"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let notifier = notifier_for(&server, true);
    let result = notifier.notify("user-1", "t", "b", "subscription").await;

    assert!(result.is_err());
}

#[tokio::test]
async fn disabled_notifier_skips_the_wire() {
    let server = MockServer::start().await;
    // No mocks mounted: any request would 404 and fail the call.

    let notifier = notifier_for(&server, false);
    notifier.notify("user-1", "t", "b", "subscription").await.unwrap();
    notifier.send_email("a@b.sk", "s", "b").await.unwrap();

    assert!(server.received_requests().await.unwrap().is_empty());
}
