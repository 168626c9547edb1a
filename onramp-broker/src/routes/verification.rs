//! Identity-verification endpoints

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use onramp_core::VerificationOutcome;

use crate::error::BrokerError;
use crate::orchestrator::CallerStatus;
use crate::state::AppState;
use crate::store::{VerificationStore, WebhookStore};

#[derive(Deserialize)]
pub struct StartVerificationRequest {
    pub customer_guid: String,
}

#[derive(Serialize)]
pub struct StartVerificationResponse {
    pub success: bool,
    pub verification_guid: String,
    /// URL the end user opens to complete the hosted verification step
    pub inquiry_url: String,
}

/// POST /api/verifications
pub async fn start_verification<V, W>(
    State(state): State<Arc<AppState<V, W>>>,
    Json(req): Json<StartVerificationRequest>,
) -> Result<Json<StartVerificationResponse>, BrokerError>
where
    V: VerificationStore,
    W: WebhookStore,
{
    let handle = state
        .orchestrator
        .start_or_resume(&req.customer_guid)
        .await?;

    Ok(Json(StartVerificationResponse {
        success: true,
        verification_guid: handle.verification_id,
        inquiry_url: handle.inquiry_url,
    }))
}

#[derive(Serialize)]
pub struct VerificationStatusResponse {
    pub success: bool,
    pub status: CallerStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<VerificationOutcome>,
}

/// GET /api/verifications/{guid}
pub async fn verification_status<V, W>(
    State(state): State<Arc<AppState<V, W>>>,
    Path(guid): Path<String>,
) -> Result<Json<VerificationStatusResponse>, BrokerError>
where
    V: VerificationStore,
    W: WebhookStore,
{
    let view = state.orchestrator.status(&guid).await?;

    Ok(Json(VerificationStatusResponse {
        success: true,
        status: view.status,
        outcome: view.outcome,
    }))
}
