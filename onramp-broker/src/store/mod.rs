//! Storage abstractions for the broker

pub mod memory;
pub mod models;
pub mod sqlite;

pub use memory::{InMemoryVerificationStore, InMemoryWebhookStore};
pub use models::{VerificationRecord, WebhookEventRecord};
pub use sqlite::SqliteStore;

use std::sync::Arc;

use crate::error::BrokerError;

/// Result type for store operations
pub type StoreResult<T> = Result<T, BrokerError>;

/// Trait for verification snapshot storage
pub trait VerificationStore: Send + Sync {
    /// Find the customer's reusable (non-terminal) verification, if any
    fn find_reusable(&self, customer_id: &str) -> StoreResult<Option<VerificationRecord>>;

    /// Get a verification snapshot by provider id
    fn get(&self, verification_id: &str) -> StoreResult<Option<VerificationRecord>>;

    /// Upsert the last-seen snapshot of a verification. A stored hosted-flow
    /// URL survives snapshots that lack one, and a terminal record is never
    /// regressed.
    fn save_snapshot(&self, record: VerificationRecord) -> StoreResult<()>;
}

/// Trait for webhook delivery receipts
pub trait WebhookStore: Send + Sync {
    /// Atomically record `record.event_id` as processed. Returns `true` if
    /// this is the first claim for the id; `false` means the event was
    /// already applied and the caller must skip its side effects.
    fn claim_event(&self, record: WebhookEventRecord) -> StoreResult<bool>;
}

/// Allow sharing a store across the orchestrator and routes via `Arc`
impl<T: VerificationStore> VerificationStore for Arc<T> {
    fn find_reusable(&self, customer_id: &str) -> StoreResult<Option<VerificationRecord>> {
        (**self).find_reusable(customer_id)
    }

    fn get(&self, verification_id: &str) -> StoreResult<Option<VerificationRecord>> {
        (**self).get(verification_id)
    }

    fn save_snapshot(&self, record: VerificationRecord) -> StoreResult<()> {
        (**self).save_snapshot(record)
    }
}

impl<T: WebhookStore> WebhookStore for Arc<T> {
    fn claim_event(&self, record: WebhookEventRecord) -> StoreResult<bool> {
        (**self).claim_event(record)
    }
}
