//! Broker application state

use std::sync::Arc;

use crate::config::VerificationSettings;
use crate::gateway::ProviderGateway;
use crate::orchestrator::VerificationOrchestrator;
use crate::store::{VerificationStore, WebhookStore};
use crate::token_cache::TokenCache;

/// Broker application state, generic over the store implementations so the
/// binary and tests can pick theirs.
pub struct AppState<V, W> {
    pub orchestrator: VerificationOrchestrator<Arc<ProviderGateway>, V, W>,
    pub gateway: Arc<ProviderGateway>,
    pub tokens: Arc<TokenCache>,
}

impl<V, W> AppState<V, W>
where
    V: VerificationStore,
    W: WebhookStore,
{
    pub fn new(
        gateway: Arc<ProviderGateway>,
        tokens: Arc<TokenCache>,
        store: V,
        webhooks: W,
        verification: &VerificationSettings,
    ) -> Self {
        Self {
            orchestrator: VerificationOrchestrator::new(
                gateway.clone(),
                store,
                webhooks,
                verification,
            ),
            gateway,
            tokens,
        }
    }
}
