//! Identity-verification orchestration
//!
//! Finds or creates a verification resource for a customer, polls the
//! provider until the hosted flow is ready for the end user, and
//! reconciles webhook-delivered outcomes exactly once.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use onramp_core::{VerificationOutcome, VerificationResource, VerificationState};
use serde::Serialize;

use crate::config::VerificationSettings;
use crate::error::BrokerError;
use crate::store::{VerificationRecord, VerificationStore, WebhookEventRecord, WebhookStore};

/// Provider verification operations the orchestrator depends on. The
/// gateway implements this against the live API; tests script it.
pub trait VerificationApi: Send + Sync {
    fn create_verification(
        &self,
        customer_id: &str,
    ) -> impl Future<Output = Result<VerificationResource, BrokerError>> + Send;

    fn get_verification(
        &self,
        verification_id: &str,
    ) -> impl Future<Output = Result<VerificationResource, BrokerError>> + Send;

    fn list_verifications(
        &self,
        customer_id: &str,
    ) -> impl Future<Output = Result<Vec<VerificationResource>, BrokerError>> + Send;
}

/// Allow sharing one provider handle between the orchestrator and routes
impl<T: VerificationApi> VerificationApi for Arc<T> {
    fn create_verification(
        &self,
        customer_id: &str,
    ) -> impl Future<Output = Result<VerificationResource, BrokerError>> + Send {
        (**self).create_verification(customer_id)
    }

    fn get_verification(
        &self,
        verification_id: &str,
    ) -> impl Future<Output = Result<VerificationResource, BrokerError>> + Send {
        (**self).get_verification(verification_id)
    }

    fn list_verifications(
        &self,
        customer_id: &str,
    ) -> impl Future<Output = Result<Vec<VerificationResource>, BrokerError>> + Send {
        (**self).list_verifications(customer_id)
    }
}

/// What a caller needs to send the end user into the hosted flow.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationHandle {
    pub verification_id: String,
    pub inquiry_url: String,
}

/// Caller-facing status categories, deliberately coarser than the
/// provider's lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallerStatus {
    Pending,
    InReview,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusView {
    pub status: CallerStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<VerificationOutcome>,
}

/// Result of applying one webhook delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The event id was already processed; nothing was applied.
    Duplicate,
    Applied {
        terminal: bool,
    },
}

/// Verification change carried by a webhook delivery.
#[derive(Debug, Clone)]
pub struct VerificationUpdate {
    pub verification_id: String,
    pub customer_id: Option<String>,
    pub state: VerificationState,
    pub outcome: Option<VerificationOutcome>,
}

pub struct VerificationOrchestrator<P, V, W> {
    provider: P,
    store: V,
    webhooks: W,
    poll_interval: Duration,
    max_poll_attempts: u32,
    customer_guards: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl<P, V, W> VerificationOrchestrator<P, V, W>
where
    P: VerificationApi,
    V: VerificationStore,
    W: WebhookStore,
{
    pub fn new(provider: P, store: V, webhooks: W, settings: &VerificationSettings) -> Self {
        Self {
            provider,
            store,
            webhooks,
            poll_interval: Duration::from_millis(settings.poll_interval_ms),
            max_poll_attempts: settings.max_poll_attempts,
            customer_guards: Mutex::new(HashMap::new()),
        }
    }

    /// Start verification for a customer, or resume the one already in
    /// flight. Returns once the hosted flow is ready.
    ///
    /// A timeout here is retryable: the non-terminal record is kept, so the
    /// next call resumes polling the same resource instead of creating a
    /// duplicate.
    pub async fn start_or_resume(
        &self,
        customer_id: &str,
    ) -> Result<VerificationHandle, BrokerError> {
        let guard = self.customer_guard(customer_id);

        // The find-or-create decision runs under a per-customer guard so
        // near-simultaneous calls cannot both create a resource. Polling
        // happens outside it.
        let verification_id = {
            let _held = guard.lock().await;

            if let Some(record) = self.store.find_reusable(customer_id)? {
                if record.state == VerificationState::Waiting {
                    if let Some(inquiry_url) = record.inquiry_url {
                        tracing::debug!(
                            verification_id = %record.verification_id,
                            "reusing verification already waiting on the hosted flow"
                        );
                        return Ok(VerificationHandle {
                            verification_id: record.verification_id,
                            inquiry_url,
                        });
                    }
                }
                record.verification_id
            } else if let Some(adopted) = self.adopt_from_provider(customer_id).await? {
                adopted
            } else {
                let resource = self.provider.create_verification(customer_id).await?;
                tracing::info!(
                    customer_id,
                    verification_id = %resource.guid,
                    "created identity verification"
                );
                self.store
                    .save_snapshot(VerificationRecord::from_resource(&resource))?;
                resource.guid
            }
        };

        self.poll_until_ready(&verification_id).await
    }

    /// Map the verification onto the caller's four-value status. A terminal
    /// snapshot is answered locally; anything still in motion costs one
    /// provider read.
    pub async fn status(&self, verification_id: &str) -> Result<StatusView, BrokerError> {
        if let Some(record) = self.store.get(verification_id)? {
            if record.is_terminal() {
                return Ok(classify(&record));
            }
        }

        let resource = self.provider.get_verification(verification_id).await?;
        self.store
            .save_snapshot(VerificationRecord::from_resource(&resource))?;

        // Read the merged record back so classification sees a previously
        // recorded hosted-flow URL.
        let record = self
            .store
            .get(verification_id)?
            .ok_or(BrokerError::VerificationNotFound)?;
        Ok(classify(&record))
    }

    /// Apply one webhook delivery at most once. The first claim updates the
    /// local snapshot (sparing the next status call a provider read) and
    /// reports whether the verification reached a terminal state; redelivery
    /// is a no-op.
    pub fn reconcile_from_webhook(
        &self,
        event: WebhookEventRecord,
        update: VerificationUpdate,
    ) -> Result<ReconcileOutcome, BrokerError> {
        let event_id = event.event_id.clone();
        if !self.webhooks.claim_event(event)? {
            tracing::debug!(event_id = %event_id, "skipping already-processed webhook event");
            return Ok(ReconcileOutcome::Duplicate);
        }

        let customer_id = match update.customer_id {
            Some(id) => id,
            None => self
                .store
                .get(&update.verification_id)?
                .map(|r| r.customer_id)
                .unwrap_or_default(),
        };

        let terminal = update.state.is_terminal();
        let mut record =
            VerificationRecord::new(update.verification_id.clone(), customer_id, update.state);
        record.outcome = update.outcome;
        self.store.save_snapshot(record)?;

        tracing::info!(
            event_id = %event_id,
            verification_id = %update.verification_id,
            terminal,
            "applied webhook verification update"
        );
        Ok(ReconcileOutcome::Applied { terminal })
    }

    /// The provider lists a customer's verifications; adopt a non-terminal
    /// one left over from before a restart rather than creating a duplicate.
    async fn adopt_from_provider(&self, customer_id: &str) -> Result<Option<String>, BrokerError> {
        let existing = self.provider.list_verifications(customer_id).await?;
        for resource in existing {
            if !resource.normalized_state().is_terminal() {
                tracing::debug!(
                    customer_id,
                    verification_id = %resource.guid,
                    "adopting in-flight verification found at the provider"
                );
                self.store
                    .save_snapshot(VerificationRecord::from_resource(&resource))?;
                return Ok(Some(resource.guid));
            }
        }
        Ok(None)
    }

    /// Poll the resource until its first `waiting` observation, which is
    /// authoritative: the hosted-flow URL it carries is returned immediately
    /// and later states never replace it.
    async fn poll_until_ready(
        &self,
        verification_id: &str,
    ) -> Result<VerificationHandle, BrokerError> {
        for attempt in 1..=self.max_poll_attempts {
            let resource = self.provider.get_verification(verification_id).await?;
            self.store
                .save_snapshot(VerificationRecord::from_resource(&resource))?;

            match resource.normalized_state() {
                VerificationState::Waiting => {
                    if let Some(inquiry_url) = resource.inquiry_url {
                        tracing::info!(
                            verification_id,
                            attempt,
                            "verification ready for the hosted flow"
                        );
                        return Ok(VerificationHandle {
                            verification_id: verification_id.to_string(),
                            inquiry_url,
                        });
                    }
                    // waiting, but the hosted-flow URL has not materialized
                }
                VerificationState::Completed => {
                    return Err(BrokerError::TerminalWithoutContinuation {
                        verification_id: verification_id.to_string(),
                    });
                }
                state => {
                    tracing::trace!(
                        verification_id,
                        attempt,
                        state = state.as_str(),
                        "verification not ready yet"
                    );
                }
            }

            if attempt < self.max_poll_attempts {
                tokio::time::sleep(self.poll_interval).await;
            }
        }

        Err(BrokerError::VerificationTimeout {
            verification_id: verification_id.to_string(),
            attempts: self.max_poll_attempts,
        })
    }

    fn customer_guard(&self, customer_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.customer_guards
            .lock()
            .unwrap()
            .entry(customer_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

fn classify(record: &VerificationRecord) -> StatusView {
    let status = match (&record.state, record.outcome) {
        (VerificationState::Completed, Some(VerificationOutcome::Approved)) => {
            CallerStatus::Approved
        }
        (VerificationState::Completed, Some(VerificationOutcome::Rejected)) => {
            CallerStatus::Rejected
        }
        // completed but the outcome has not landed yet: still under review
        // from the caller's perspective
        (VerificationState::Completed, None) => CallerStatus::InReview,
        (VerificationState::Reviewing, _) => CallerStatus::InReview,
        // waiting counts as in-review only once the hosted flow has been
        // handed out
        (VerificationState::Waiting, _) if record.inquiry_url.is_some() => CallerStatus::InReview,
        _ => CallerStatus::Pending,
    };

    StatusView {
        status,
        outcome: record.outcome,
    }
}
