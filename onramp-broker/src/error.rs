//! Broker error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("missing provider credential: {0}")]
    MissingCredentials(&'static str),

    #[error("provider rejected authentication: {0}")]
    AuthRejected(String),

    #[error("provider error: {0}")]
    Provider(onramp_core::Error),

    #[error("token refresh failed for {key}: {reason}")]
    TokenRefresh { key: String, reason: String },

    #[error("verification {verification_id} not ready after {attempts} status reads")]
    VerificationTimeout {
        verification_id: String,
        attempts: u32,
    },

    #[error("verification {verification_id} completed without ever exposing a hosted flow")]
    TerminalWithoutContinuation { verification_id: String },

    #[error("verification not found")]
    VerificationNotFound,

    #[error("storage error: {0}")]
    Store(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<onramp_core::Error> for BrokerError {
    fn from(err: onramp_core::Error) -> Self {
        match err {
            onramp_core::Error::MissingCredentials { field } => {
                BrokerError::MissingCredentials(field)
            }
            onramp_core::Error::AuthRejected { .. } => BrokerError::AuthRejected(err.to_string()),
            other => BrokerError::Provider(other),
        }
    }
}

impl IntoResponse for BrokerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            BrokerError::MissingCredentials(field) => {
                tracing::error!(field = *field, "provider credentials not configured");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Provider credentials not configured".to_string(),
                )
            }
            BrokerError::AuthRejected(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
            BrokerError::Provider(err) => {
                tracing::warn!(error = %err, "provider call failed");
                (StatusCode::BAD_GATEWAY, self.to_string())
            }
            BrokerError::TokenRefresh { .. } => (StatusCode::BAD_GATEWAY, self.to_string()),
            BrokerError::VerificationTimeout { .. } => {
                (StatusCode::GATEWAY_TIMEOUT, self.to_string())
            }
            BrokerError::TerminalWithoutContinuation { verification_id } => {
                tracing::error!(%verification_id, "verification completed without hosted flow");
                (StatusCode::BAD_GATEWAY, self.to_string())
            }
            BrokerError::VerificationNotFound => {
                (StatusCode::NOT_FOUND, "Verification not found".to_string())
            }
            BrokerError::Store(msg) | BrokerError::Internal(msg) => {
                tracing::error!("internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = json!({ "success": false, "reason": message });
        (status, axum::Json(body)).into_response()
    }
}
