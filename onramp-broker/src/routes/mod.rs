//! HTTP routes for the broker

mod customer;
mod verification;
mod webhook;

pub use webhook::{WebhookEnvelope, WebhookPayload};

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::store::{VerificationStore, WebhookStore};

/// Create the router with all routes
pub fn create_router<V, W>(state: Arc<AppState<V, W>>) -> Router
where
    V: VerificationStore + 'static,
    W: WebhookStore + 'static,
{
    Router::new()
        .route("/api/verifications", post(verification::start_verification))
        .route(
            "/api/verifications/{guid}",
            get(verification::verification_status),
        )
        .route("/api/webhooks", post(webhook::receive_webhook))
        .route("/api/customers", post(customer::create_customer))
        .route(
            "/api/customers/{guid}/deposit_addresses",
            post(customer::create_deposit_address),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
