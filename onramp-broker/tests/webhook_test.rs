//! Tests for webhook delivery idempotency and reconciliation

mod common;

use common::create_test_server;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

fn terminal_event(event_id: &str) -> Value {
    json!({
        "event_id": event_id,
        "event_type": "identity_verification.updated",
        "payload": {
            "verification_guid": "ver-1",
            "customer_guid": "c1",
            "state": "completed",
            "outcome": "approved"
        }
    })
}

/// Test: the first delivery applies, the redelivery acknowledges as a
/// duplicate without re-applying
#[tokio::test]
async fn test_duplicate_delivery_is_acknowledged_not_reapplied() {
    let h = create_test_server().await;

    let first = h.server.post("/api/webhooks").json(&terminal_event("evt-1")).await;
    assert_eq!(first.status_code(), 200);
    let body: Value = first.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["duplicate"], false);

    let second = h.server.post("/api/webhooks").json(&terminal_event("evt-1")).await;
    assert_eq!(second.status_code(), 200);
    let body: Value = second.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["duplicate"], true);
}

/// Test: a webhook-delivered terminal state answers the next status query
/// locally, with no provider read
#[tokio::test]
async fn test_webhook_terminal_state_spares_the_provider_read() {
    let h = create_test_server().await;

    // the status route must not reach for the provider after the webhook
    Mock::given(method("GET"))
        .and(path("/api/identity_verifications/ver-1"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&h.provider)
        .await;

    let delivered = h.server.post("/api/webhooks").json(&terminal_event("evt-9")).await;
    assert_eq!(delivered.status_code(), 200);

    let status = h.server.get("/api/verifications/ver-1").await;
    assert_eq!(status.status_code(), 200);
    let body: Value = status.json();
    assert_eq!(body["status"], "approved");
    assert_eq!(body["outcome"], "approved");
}

/// Test: distinct event ids both apply
#[tokio::test]
async fn test_distinct_events_apply_independently() {
    let h = create_test_server().await;

    let rejected = json!({
        "event_id": "evt-a",
        "event_type": "identity_verification.updated",
        "payload": {
            "verification_guid": "ver-2",
            "customer_guid": "c2",
            "state": "completed",
            "outcome": "rejected"
        }
    });

    let first = h.server.post("/api/webhooks").json(&terminal_event("evt-b")).await;
    let second = h.server.post("/api/webhooks").json(&rejected).await;
    assert_eq!(first.status_code(), 200);
    assert_eq!(second.status_code(), 200);

    let status = h.server.get("/api/verifications/ver-2").await;
    let body: Value = status.json();
    assert_eq!(body["status"], "rejected");
}

/// Test: a non-terminal webhook update leaves the verification open
#[tokio::test]
async fn test_non_terminal_update_keeps_verification_open() {
    let h = create_test_server().await;

    let reviewing = json!({
        "event_id": "evt-c",
        "event_type": "identity_verification.updated",
        "payload": {
            "verification_guid": "ver-3",
            "customer_guid": "c3",
            "state": "reviewing"
        }
    });

    let delivered = h.server.post("/api/webhooks").json(&reviewing).await;
    assert_eq!(delivered.status_code(), 200);

    // a later status query still refreshes from the provider
    Mock::given(method("GET"))
        .and(path("/api/identity_verifications/ver-3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            common::verification_body("ver-3", "c3", "reviewing", None),
        ))
        .expect(1)
        .mount(&h.provider)
        .await;
    common::mount_token(&h.provider, "tok-1").await;

    let status = h.server.get("/api/verifications/ver-3").await;
    assert_eq!(status.status_code(), 200);
    let body: Value = status.json();
    assert_eq!(body["status"], "in_review");
}
