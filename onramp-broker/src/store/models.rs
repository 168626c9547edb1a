//! Data models for broker storage

use chrono::{DateTime, Utc};
use onramp_core::{VerificationOutcome, VerificationResource, VerificationState};

/// Locally cached snapshot of one verification attempt for one customer.
///
/// The provider owns the resource; this record only mirrors the last state
/// the broker observed (by polling or webhook), so status queries on a
/// finished verification need no provider round-trip.
#[derive(Debug, Clone)]
pub struct VerificationRecord {
    pub verification_id: String,
    pub customer_id: String,
    pub state: VerificationState,
    pub outcome: Option<VerificationOutcome>,
    /// Hosted-flow URL handed to the end user; recorded on the first
    /// `waiting` observation and kept from then on.
    pub inquiry_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VerificationRecord {
    pub fn new(
        verification_id: impl Into<String>,
        customer_id: impl Into<String>,
        state: VerificationState,
    ) -> Self {
        let now = Utc::now();
        Self {
            verification_id: verification_id.into(),
            customer_id: customer_id.into(),
            state,
            outcome: None,
            inquiry_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Snapshot of a provider resource as reported on the wire.
    pub fn from_resource(resource: &VerificationResource) -> Self {
        let now = Utc::now();
        Self {
            verification_id: resource.guid.clone(),
            customer_id: resource.customer_guid.clone(),
            state: resource.normalized_state(),
            outcome: resource.normalized_outcome(),
            inquiry_url: resource.inquiry_url.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// A non-terminal record can be resumed instead of creating a duplicate
    /// verification for the customer.
    pub fn is_reusable(&self) -> bool {
        !self.is_terminal()
    }

    /// Merge this snapshot over what is already stored: a terminal record
    /// wins outright, and a recorded hosted-flow URL is never cleared by a
    /// later snapshot that lacks one.
    pub fn merged_over(mut self, existing: Option<&VerificationRecord>) -> VerificationRecord {
        if let Some(prev) = existing {
            if prev.is_terminal() {
                return prev.clone();
            }
            if self.inquiry_url.is_none() {
                self.inquiry_url = prev.inquiry_url.clone();
            }
            self.created_at = prev.created_at;
        }
        self.updated_at = Utc::now();
        self
    }
}

/// Receipt for one webhook delivery.
#[derive(Debug, Clone)]
pub struct WebhookEventRecord {
    pub event_id: String,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub processed_at: DateTime<Utc>,
}

impl WebhookEventRecord {
    pub fn new(
        event_id: impl Into<String>,
        event_type: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            event_type: event_type.into(),
            payload,
            processed_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_preserves_recorded_inquiry_url() {
        let mut stored = VerificationRecord::new("ver-1", "cus-1", VerificationState::Waiting);
        stored.inquiry_url = Some("https://verify.example.com/abc".to_string());

        let later = VerificationRecord::new("ver-1", "cus-1", VerificationState::Reviewing);
        let merged = later.merged_over(Some(&stored));

        assert_eq!(merged.state, VerificationState::Reviewing);
        assert_eq!(
            merged.inquiry_url.as_deref(),
            Some("https://verify.example.com/abc")
        );
    }

    #[test]
    fn test_merge_never_regresses_a_terminal_record() {
        let mut stored = VerificationRecord::new("ver-1", "cus-1", VerificationState::Completed);
        stored.outcome = Some(onramp_core::VerificationOutcome::Approved);

        let stale = VerificationRecord::new("ver-1", "cus-1", VerificationState::Reviewing);
        let merged = stale.merged_over(Some(&stored));

        assert_eq!(merged.state, VerificationState::Completed);
        assert_eq!(
            merged.outcome,
            Some(onramp_core::VerificationOutcome::Approved)
        );
    }
}
