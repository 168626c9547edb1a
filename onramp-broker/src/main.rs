//! Onramp Broker
//!
//! Service layer between the platform and the financial-infrastructure
//! provider: cached OAuth tokens, identity-verification orchestration, and
//! webhook reconciliation.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use onramp_broker::store::{VerificationStore, WebhookStore};
use onramp_broker::{
    routes, spawn_sweeper, AppState, Config, InMemoryVerificationStore, InMemoryWebhookStore,
    ProviderGateway, SqliteStore, TokenCache,
};
use onramp_core::{ProviderClient, ProviderClientConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "onramp_broker=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env();
    tracing::info!(
        port = config.port,
        provider = %config.provider.base_url,
        environment = %config.provider.environment,
        "Loaded configuration"
    );

    let client = ProviderClient::new(ProviderClientConfig::new(config.provider.base_url.clone()))?;

    let tokens = Arc::new(TokenCache::new(config.tokens.refresh_buffer_secs));
    spawn_sweeper(
        tokens.clone(),
        Duration::from_secs(config.tokens.sweep_interval_secs),
    );

    let gateway = Arc::new(ProviderGateway::new(client, tokens.clone(), &config.provider));

    match config.database.clone() {
        Some(path) => {
            tracing::info!(path = %path, "Using SQLite store");
            let store = Arc::new(SqliteStore::open(&path)?);
            let state = Arc::new(AppState::new(
                gateway,
                tokens,
                store.clone(),
                store,
                &config.verification,
            ));
            serve(state, config.port).await
        }
        None => {
            let state = Arc::new(AppState::new(
                gateway,
                tokens,
                Arc::new(InMemoryVerificationStore::new()),
                Arc::new(InMemoryWebhookStore::new()),
                &config.verification,
            ));
            serve(state, config.port).await
        }
    }
}

async fn serve<V, W>(state: Arc<AppState<V, W>>, port: u16) -> Result<()>
where
    V: VerificationStore + 'static,
    W: WebhookStore + 'static,
{
    let app = routes::create_router(state);

    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Broker listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
