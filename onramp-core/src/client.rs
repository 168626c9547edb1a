//! HTTP client for the provider's OAuth and REST endpoints
//!
//! Wraps a `reqwest::Client` with the provider base URL and a per-request
//! timeout. Retry policy is NOT built in here — callers own retry decisions
//! (the broker retries once on auth rejection after invalidating its cached
//! token, and bounds verification polling by attempt count).

use std::time::Duration;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::customer::{
    AccountResource, CreateAccountRequest, CreateCustomerRequest, CreateDepositAddressRequest,
    CustomerResource, DepositAddressResource,
};
use crate::error::Error;
use crate::oauth::{ClientCredentials, TokenResponse};
use crate::verification::{CreateVerificationRequest, VerificationList, VerificationResource};
use crate::Result;

/// Configuration for [`ProviderClient`].
#[derive(Debug, Clone)]
pub struct ProviderClientConfig {
    /// Base URL of the provider API (e.g. `https://api.sandbox.example.com`).
    pub base_url: String,
    /// Request timeout in seconds (default: 10).
    pub timeout_secs: u64,
}

impl ProviderClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_secs: 10,
        }
    }
}

/// Client for the provider's token and resource endpoints.
pub struct ProviderClient {
    client: reqwest::Client,
    base_url: String,
}

impl ProviderClient {
    pub fn new(config: ProviderClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|source| Error::Http {
                endpoint: config.base_url.clone(),
                source,
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Perform the `client_credentials` exchange against the token endpoint.
    pub async fn exchange_client_credentials(
        &self,
        credentials: &ClientCredentials,
    ) -> Result<TokenResponse> {
        credentials.validate()?;

        let endpoint = format!("{}/oauth/token", self.base_url);
        let form = [
            ("grant_type", "client_credentials".to_string()),
            ("client_id", credentials.client_id.clone()),
            ("client_secret", credentials.client_secret.clone()),
            ("scope", credentials.scope_param()),
        ];

        let response = self
            .client
            .post(&endpoint)
            .form(&form)
            .send()
            .await
            .map_err(|source| Error::Http {
                endpoint: endpoint.clone(),
                source,
            })?;

        parse_response(&endpoint, response).await
    }

    pub async fn create_customer(
        &self,
        token: &str,
        request: &CreateCustomerRequest,
    ) -> Result<CustomerResource> {
        self.post("/api/customers", token, request).await
    }

    pub async fn create_account(
        &self,
        token: &str,
        request: &CreateAccountRequest,
    ) -> Result<AccountResource> {
        self.post("/api/accounts", token, request).await
    }

    pub async fn create_deposit_address(
        &self,
        token: &str,
        request: &CreateDepositAddressRequest,
    ) -> Result<DepositAddressResource> {
        self.post("/api/deposit_addresses", token, request).await
    }

    pub async fn create_verification(
        &self,
        token: &str,
        request: &CreateVerificationRequest,
    ) -> Result<VerificationResource> {
        self.post("/api/identity_verifications", token, request).await
    }

    pub async fn get_verification(&self, token: &str, guid: &str) -> Result<VerificationResource> {
        self.get(&format!("/api/identity_verifications/{guid}"), token)
            .await
    }

    /// List verifications for a customer, newest first per provider
    /// ordering.
    pub async fn list_verifications(
        &self,
        token: &str,
        customer_guid: &str,
    ) -> Result<Vec<VerificationResource>> {
        let endpoint = format!(
            "{}/api/identity_verifications?customer_guid={customer_guid}",
            self.base_url
        );
        let response = self
            .client
            .get(&endpoint)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|source| Error::Http {
                endpoint: endpoint.clone(),
                source,
            })?;

        let list: VerificationList = parse_response(&endpoint, response).await?;
        Ok(list.objects)
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        token: &str,
        body: &B,
    ) -> Result<T> {
        let endpoint = format!("{}{path}", self.base_url);
        let response = self
            .client
            .post(&endpoint)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(|source| Error::Http {
                endpoint: endpoint.clone(),
                source,
            })?;

        parse_response(&endpoint, response).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, token: &str) -> Result<T> {
        let endpoint = format!("{}{path}", self.base_url);
        let response = self
            .client
            .get(&endpoint)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|source| Error::Http {
                endpoint: endpoint.clone(),
                source,
            })?;

        parse_response(&endpoint, response).await
    }
}

/// Map a provider response to a typed value or a structured error. 401/403
/// are classified separately so callers can tell a bad token apart from a
/// bad request.
async fn parse_response<T: DeserializeOwned>(
    endpoint: &str,
    response: reqwest::Response,
) -> Result<T> {
    let status = response.status();

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(Error::AuthRejected {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
        });
    }

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        tracing::warn!(endpoint, status = status.as_u16(), "provider call failed");
        return Err(Error::Api {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            body,
        });
    }

    response
        .json()
        .await
        .map_err(|source| Error::Deserialization {
            endpoint: endpoint.to_string(),
            source,
        })
}
