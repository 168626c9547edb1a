//! Webhook ingestion
//!
//! The provider delivers events at least once. The envelope's event id is
//! claimed before any side effect runs, so a redelivery is acknowledged
//! with success but applies nothing.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use onramp_core::{VerificationOutcome, VerificationState};

use crate::error::BrokerError;
use crate::orchestrator::{ReconcileOutcome, VerificationUpdate};
use crate::state::AppState;
use crate::store::{VerificationStore, WebhookEventRecord, WebhookStore};

#[derive(Debug, Deserialize, Serialize)]
pub struct WebhookEnvelope {
    pub event_id: String,
    pub event_type: String,
    pub payload: WebhookPayload,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebhookPayload {
    pub verification_guid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_guid: Option<String>,
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
}

#[derive(Serialize)]
pub struct WebhookResponse {
    pub success: bool,
    pub duplicate: bool,
}

/// POST /api/webhooks
pub async fn receive_webhook<V, W>(
    State(state): State<Arc<AppState<V, W>>>,
    Json(envelope): Json<WebhookEnvelope>,
) -> Result<Json<WebhookResponse>, BrokerError>
where
    V: VerificationStore,
    W: WebhookStore,
{
    let payload = serde_json::to_value(&envelope.payload)
        .map_err(|e| BrokerError::Internal(e.to_string()))?;
    let event = WebhookEventRecord::new(envelope.event_id, envelope.event_type, payload);

    let update = VerificationUpdate {
        verification_id: envelope.payload.verification_guid,
        customer_id: envelope.payload.customer_guid,
        state: VerificationState::parse(&envelope.payload.state),
        outcome: envelope
            .payload
            .outcome
            .as_deref()
            .and_then(VerificationOutcome::from_str),
    };

    let outcome = state.orchestrator.reconcile_from_webhook(event, update)?;

    Ok(Json(WebhookResponse {
        success: true,
        duplicate: outcome == ReconcileOutcome::Duplicate,
    }))
}
