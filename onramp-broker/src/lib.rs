//! Onramp Broker
//!
//! Service layer between the platform and the financial-infrastructure
//! provider: caches short-lived OAuth access tokens per principal, drives
//! the asynchronous identity-verification workflow to the point where the
//! end user can take over, and reconciles webhook deliveries exactly once.

pub mod config;
pub mod error;
pub mod gateway;
pub mod orchestrator;
pub mod routes;
pub mod state;
pub mod store;
pub mod token_cache;

pub use config::{Config, ProviderSettings, TokenCacheSettings, VerificationSettings};
pub use error::BrokerError;
pub use gateway::ProviderGateway;
pub use orchestrator::{
    CallerStatus, ReconcileOutcome, VerificationApi, VerificationHandle, VerificationOrchestrator,
    VerificationUpdate,
};
pub use state::AppState;
pub use store::{
    InMemoryVerificationStore, InMemoryWebhookStore, SqliteStore, VerificationStore, WebhookStore,
};
pub use token_cache::{spawn_sweeper, TokenCache, TokenKey};
