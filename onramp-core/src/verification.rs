//! Identity-verification resources and their lifecycle state model
//!
//! The provider completes verifications asynchronously: a newly created
//! resource moves through `pending`/`creating` before it becomes `waiting`,
//! at which point it exposes the hosted-flow URL the end user needs. Only
//! `completed` is terminal; the `outcome` field is meaningful there.

use serde::{Deserialize, Serialize};

/// Normalized lifecycle state of a verification resource.
///
/// The wire value is an opaque string; anything unrecognized is carried
/// through as [`VerificationState::Unknown`] and treated as "still in
/// progress" by callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationState {
    Pending,
    Creating,
    Waiting,
    Reviewing,
    Completed,
    Unknown(String),
}

impl VerificationState {
    pub fn parse(s: &str) -> Self {
        match s {
            "pending" => VerificationState::Pending,
            "creating" => VerificationState::Creating,
            "waiting" => VerificationState::Waiting,
            "reviewing" => VerificationState::Reviewing,
            "completed" => VerificationState::Completed,
            other => VerificationState::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            VerificationState::Pending => "pending",
            VerificationState::Creating => "creating",
            VerificationState::Waiting => "waiting",
            VerificationState::Reviewing => "reviewing",
            VerificationState::Completed => "completed",
            VerificationState::Unknown(s) => s.as_str(),
        }
    }

    /// `completed` is the only terminal state; everything else can still
    /// make progress.
    pub fn is_terminal(&self) -> bool {
        matches!(self, VerificationState::Completed)
    }
}

/// Terminal classification of a completed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationOutcome {
    Approved,
    Rejected,
}

impl VerificationOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationOutcome::Approved => "approved",
            VerificationOutcome::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "approved" => Some(VerificationOutcome::Approved),
            "rejected" => Some(VerificationOutcome::Rejected),
            _ => None,
        }
    }
}

/// A verification resource as the provider reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResource {
    pub guid: String,
    pub customer_guid: String,
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
    /// URL of the hosted verification flow; present once `state` is
    /// `waiting`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inquiry_url: Option<String>,
}

impl VerificationResource {
    pub fn normalized_state(&self) -> VerificationState {
        VerificationState::parse(&self.state)
    }

    pub fn normalized_outcome(&self) -> Option<VerificationOutcome> {
        self.outcome.as_deref().and_then(VerificationOutcome::from_str)
    }
}

/// Request body for creating a verification resource.
#[derive(Debug, Clone, Serialize)]
pub struct CreateVerificationRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub method: String,
    pub customer_guid: String,
}

impl CreateVerificationRequest {
    /// The KYC flow used for end-user identity checks.
    pub fn kyc(customer_guid: impl Into<String>) -> Self {
        Self {
            kind: "kyc".to_string(),
            method: "id_and_selfie".to_string(),
            customer_guid: customer_guid.into(),
        }
    }
}

/// Paginated list envelope returned by the verification list endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct VerificationList {
    pub objects: Vec<VerificationResource>,
}
