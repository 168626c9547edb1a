//! Tests for the identity-verification flow over the HTTP surface

mod common;

use common::{create_test_server, create_test_server_with, mount_empty_listing, mount_token, verification_body};
use onramp_broker::VerificationSettings;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

/// Test: a customer with no prior verification gets a hosted-flow URL after
/// one create and two status reads (creating, then waiting)
#[tokio::test]
async fn test_start_verification_polls_until_hosted_flow_is_ready() {
    let h = create_test_server().await;
    mount_token(&h.provider, "tok-1").await;
    mount_empty_listing(&h.provider).await;

    Mock::given(method("POST"))
        .and(path("/api/identity_verifications"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(verification_body("ver-1", "c1", "creating", None)),
        )
        .expect(1)
        .mount(&h.provider)
        .await;

    // first status read: still creating
    Mock::given(method("GET"))
        .and(path("/api/identity_verifications/ver-1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(verification_body("ver-1", "c1", "creating", None)),
        )
        .up_to_n_times(1)
        .expect(1)
        .mount(&h.provider)
        .await;

    // second status read: ready for the hosted flow
    Mock::given(method("GET"))
        .and(path("/api/identity_verifications/ver-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(verification_body(
            "ver-1",
            "c1",
            "waiting",
            Some("https://verify/abc"),
        )))
        .expect(1)
        .mount(&h.provider)
        .await;

    let response = h
        .server
        .post("/api/verifications")
        .json(&json!({ "customer_guid": "c1" }))
        .await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["verification_guid"], "ver-1");
    assert_eq!(body["inquiry_url"], "https://verify/abc");
}

/// Test: a second start call reuses the waiting verification — one create
/// call total, the same hosted-flow URL both times, no extra reads
#[tokio::test]
async fn test_second_start_reuses_the_waiting_verification() {
    let h = create_test_server().await;
    mount_token(&h.provider, "tok-1").await;
    mount_empty_listing(&h.provider).await;

    Mock::given(method("POST"))
        .and(path("/api/identity_verifications"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(verification_body("ver-1", "c1", "creating", None)),
        )
        .expect(1)
        .mount(&h.provider)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/identity_verifications/ver-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(verification_body(
            "ver-1",
            "c1",
            "waiting",
            Some("https://verify/abc"),
        )))
        .expect(1)
        .mount(&h.provider)
        .await;

    let first = h
        .server
        .post("/api/verifications")
        .json(&json!({ "customer_guid": "c1" }))
        .await;
    assert_eq!(first.status_code(), 200);

    let second = h
        .server
        .post("/api/verifications")
        .json(&json!({ "customer_guid": "c1" }))
        .await;
    assert_eq!(second.status_code(), 200);

    let first_body: Value = first.json();
    let second_body: Value = second.json();
    assert_eq!(first_body["inquiry_url"], second_body["inquiry_url"]);
    assert_eq!(second_body["verification_guid"], "ver-1");
}

/// Test: exhausting the poll budget surfaces a retryable timeout
#[tokio::test]
async fn test_poll_budget_exhaustion_is_a_gateway_timeout() {
    let h = create_test_server_with(VerificationSettings {
        poll_interval_ms: 5,
        max_poll_attempts: 3,
    })
    .await;
    mount_token(&h.provider, "tok-1").await;
    mount_empty_listing(&h.provider).await;

    Mock::given(method("POST"))
        .and(path("/api/identity_verifications"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(verification_body("ver-1", "c1", "creating", None)),
        )
        .expect(1)
        .mount(&h.provider)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/identity_verifications/ver-1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(verification_body("ver-1", "c1", "creating", None)),
        )
        .expect(3)
        .mount(&h.provider)
        .await;

    let response = h
        .server
        .post("/api/verifications")
        .json(&json!({ "customer_guid": "c1" }))
        .await;

    assert_eq!(response.status_code(), 504);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
}

/// Test: a verification that completes without ever exposing the hosted
/// flow is reported as a provider fault, not retried
#[tokio::test]
async fn test_completed_without_hosted_flow_is_reported() {
    let h = create_test_server().await;
    mount_token(&h.provider, "tok-1").await;
    mount_empty_listing(&h.provider).await;

    Mock::given(method("POST"))
        .and(path("/api/identity_verifications"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(verification_body("ver-1", "c1", "creating", None)),
        )
        .mount(&h.provider)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/identity_verifications/ver-1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(verification_body("ver-1", "c1", "completed", None)),
        )
        .expect(1)
        .mount(&h.provider)
        .await;

    let response = h
        .server
        .post("/api/verifications")
        .json(&json!({ "customer_guid": "c1" }))
        .await;

    assert_eq!(response.status_code(), 502);
}

/// Test: status of a verification still in motion costs one provider read
#[tokio::test]
async fn test_status_reads_provider_for_open_verification() {
    let h = create_test_server().await;
    mount_token(&h.provider, "tok-1").await;

    Mock::given(method("GET"))
        .and(path("/api/identity_verifications/ver-1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(verification_body("ver-1", "c1", "reviewing", None)),
        )
        .expect(1)
        .mount(&h.provider)
        .await;

    let response = h.server.get("/api/verifications/ver-1").await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["status"], "in_review");
}
