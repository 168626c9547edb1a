//! In-memory storage implementations

use std::collections::HashMap;
use std::sync::RwLock;

use super::{StoreResult, VerificationRecord, VerificationStore, WebhookEventRecord, WebhookStore};

/// In-memory verification snapshot store
pub struct InMemoryVerificationStore {
    records: RwLock<HashMap<String, VerificationRecord>>,
}

impl InMemoryVerificationStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryVerificationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl VerificationStore for InMemoryVerificationStore {
    fn find_reusable(&self, customer_id: &str) -> StoreResult<Option<VerificationRecord>> {
        let records = self.records.read().unwrap();
        Ok(records
            .values()
            .find(|r| r.customer_id == customer_id && r.is_reusable())
            .cloned())
    }

    fn get(&self, verification_id: &str) -> StoreResult<Option<VerificationRecord>> {
        Ok(self.records.read().unwrap().get(verification_id).cloned())
    }

    fn save_snapshot(&self, record: VerificationRecord) -> StoreResult<()> {
        let mut records = self.records.write().unwrap();
        let existing = records.get(&record.verification_id);
        let merged = record.merged_over(existing);
        records.insert(merged.verification_id.clone(), merged);
        Ok(())
    }
}

/// In-memory webhook delivery receipts
pub struct InMemoryWebhookStore {
    events: RwLock<HashMap<String, WebhookEventRecord>>,
}

impl InMemoryWebhookStore {
    pub fn new() -> Self {
        Self {
            events: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryWebhookStore {
    fn default() -> Self {
        Self::new()
    }
}

impl WebhookStore for InMemoryWebhookStore {
    fn claim_event(&self, record: WebhookEventRecord) -> StoreResult<bool> {
        let mut events = self.events.write().unwrap();
        if events.contains_key(&record.event_id) {
            return Ok(false);
        }
        events.insert(record.event_id.clone(), record);
        Ok(true)
    }
}
