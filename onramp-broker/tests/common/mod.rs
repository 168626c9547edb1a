//! Common test utilities for broker integration tests

use std::sync::Arc;

use axum_test::TestServer;
use onramp_broker::{
    routes, AppState, InMemoryVerificationStore, InMemoryWebhookStore, ProviderGateway,
    ProviderSettings, TokenCache, VerificationSettings,
};
use onramp_core::{ProviderClient, ProviderClientConfig};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub struct TestHarness {
    pub server: TestServer,
    /// Plays the provider's OAuth and REST endpoints
    pub provider: MockServer,
}

/// Create a test server backed by a mock provider, with fast polling.
pub async fn create_test_server() -> TestHarness {
    create_test_server_with(VerificationSettings {
        poll_interval_ms: 10,
        max_poll_attempts: 5,
    })
    .await
}

pub async fn create_test_server_with(verification: VerificationSettings) -> TestHarness {
    let provider = MockServer::start().await;

    let settings = ProviderSettings {
        base_url: provider.uri(),
        client_id: "client-test".to_string(),
        client_secret: "secret-test".to_string(),
        scopes: vec!["customers:execute".to_string()],
        name: "cybrid".to_string(),
        environment: "sandbox".to_string(),
    };

    let client = ProviderClient::new(ProviderClientConfig::new(provider.uri())).unwrap();
    let tokens = Arc::new(TokenCache::new(120));
    let gateway = Arc::new(ProviderGateway::new(client, tokens.clone(), &settings));

    let state = Arc::new(AppState::new(
        gateway,
        tokens,
        Arc::new(InMemoryVerificationStore::new()),
        Arc::new(InMemoryWebhookStore::new()),
        &verification,
    ));

    let server =
        TestServer::new(routes::create_router(state)).expect("Failed to create test server");

    TestHarness { server, provider }
}

/// Mount the token endpoint returning a fixed bearer token.
pub async fn mount_token(provider: &MockServer, token: &str) {
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": token,
            "expires_in": 3600
        })))
        .mount(provider)
        .await;
}

/// Mount an empty verification listing for the reuse lookup.
pub async fn mount_empty_listing(provider: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/identity_verifications"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "objects": [] })))
        .mount(provider)
        .await;
}

/// Build a verification resource body the way the provider reports it.
pub fn verification_body(
    guid: &str,
    customer: &str,
    state: &str,
    inquiry_url: Option<&str>,
) -> serde_json::Value {
    let mut body = json!({
        "guid": guid,
        "customer_guid": customer,
        "state": state
    });
    if let Some(url) = inquiry_url {
        body["inquiry_url"] = json!(url);
    }
    body
}
