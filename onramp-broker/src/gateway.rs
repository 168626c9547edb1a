//! Authenticated provider access
//!
//! Composes the token cache with the provider client: every outbound call
//! carries a cached bearer token, and an auth rejection invalidates that
//! token and retries exactly once with a freshly fetched one. A second
//! rejection surfaces to the caller unmodified.

use std::future::Future;
use std::sync::Arc;

use onramp_core::customer::{
    CreateAccountRequest, CreateCustomerRequest, CreateDepositAddressRequest,
};
use onramp_core::{
    AccountResource, ClientCredentials, CreateVerificationRequest, CustomerResource,
    DepositAddressResource, ProviderClient, VerificationResource,
};

use crate::config::ProviderSettings;
use crate::error::BrokerError;
use crate::orchestrator::VerificationApi;
use crate::token_cache::{TokenCache, TokenKey};

pub struct ProviderGateway {
    client: ProviderClient,
    tokens: Arc<TokenCache>,
    credentials: ClientCredentials,
    key: TokenKey,
}

impl ProviderGateway {
    pub fn new(client: ProviderClient, tokens: Arc<TokenCache>, settings: &ProviderSettings) -> Self {
        Self {
            client,
            tokens,
            credentials: ClientCredentials::new(
                settings.client_id.clone(),
                settings.client_secret.clone(),
                settings.scopes.clone(),
            ),
            key: TokenKey::platform(settings.name.clone(), settings.environment.clone()),
        }
    }

    async fn bearer(&self) -> Result<String, BrokerError> {
        self.tokens
            .get_or_refresh(&self.key, || async move {
                let response = self
                    .client
                    .exchange_client_credentials(&self.credentials)
                    .await?;
                Ok((response.access_token, response.expires_in))
            })
            .await
    }

    /// Run an authenticated provider call. On the first 401/403 the cached
    /// token is invalidated and `op` is retried once with a fresh token.
    pub async fn execute<T, F, Fut>(&self, op: F) -> Result<T, BrokerError>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = onramp_core::Result<T>>,
    {
        let token = self.bearer().await?;
        match op(token).await {
            Ok(value) => Ok(value),
            Err(err) if err.is_auth_rejected() => {
                tracing::warn!(key = %self.key, "provider rejected cached token, retrying with a fresh one");
                self.tokens.invalidate(&self.key);
                let token = self.bearer().await?;
                op(token).await.map_err(BrokerError::from)
            }
            Err(err) => Err(BrokerError::from(err)),
        }
    }

    pub async fn create_customer(&self) -> Result<CustomerResource, BrokerError> {
        let request = CreateCustomerRequest::individual();
        self.execute(|token| {
            let request = &request;
            async move { self.client.create_customer(&token, request).await }
        })
        .await
    }

    pub async fn create_account(
        &self,
        customer_guid: &str,
        asset: &str,
    ) -> Result<AccountResource, BrokerError> {
        let request = CreateAccountRequest::trading(customer_guid, asset);
        self.execute(|token| {
            let request = &request;
            async move { self.client.create_account(&token, request).await }
        })
        .await
    }

    pub async fn create_deposit_address(
        &self,
        account_guid: &str,
    ) -> Result<DepositAddressResource, BrokerError> {
        let request = CreateDepositAddressRequest {
            account_guid: account_guid.to_string(),
        };
        self.execute(|token| {
            let request = &request;
            async move { self.client.create_deposit_address(&token, request).await }
        })
        .await
    }
}

impl VerificationApi for ProviderGateway {
    fn create_verification(
        &self,
        customer_id: &str,
    ) -> impl Future<Output = Result<VerificationResource, BrokerError>> + Send {
        async move {
            let request = CreateVerificationRequest::kyc(customer_id);
            self.execute(|token| {
                let request = &request;
                async move { self.client.create_verification(&token, request).await }
            })
            .await
        }
    }

    fn get_verification(
        &self,
        verification_id: &str,
    ) -> impl Future<Output = Result<VerificationResource, BrokerError>> + Send {
        self.execute(move |token| async move {
            self.client.get_verification(&token, verification_id).await
        })
    }

    fn list_verifications(
        &self,
        customer_id: &str,
    ) -> impl Future<Output = Result<Vec<VerificationResource>, BrokerError>> + Send {
        self.execute(move |token| async move {
            self.client.list_verifications(&token, customer_id).await
        })
    }
}
