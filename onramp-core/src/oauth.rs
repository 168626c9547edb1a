//! OAuth client-credentials types for the provider token endpoint

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Credentials for the `client_credentials` grant.
#[derive(Debug, Clone)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
    /// Scopes requested on each exchange, joined space-separated.
    pub scopes: Vec<String>,
}

impl ClientCredentials {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            scopes,
        }
    }

    /// Reject empty client id/secret before any network call is attempted.
    pub fn validate(&self) -> Result<(), Error> {
        if self.client_id.is_empty() {
            return Err(Error::MissingCredentials { field: "client_id" });
        }
        if self.client_secret.is_empty() {
            return Err(Error::MissingCredentials {
                field: "client_secret",
            });
        }
        Ok(())
    }

    pub fn scope_param(&self) -> String {
        self.scopes.join(" ")
    }
}

/// Response body of a successful token exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Seconds until the token expires, from the provider's clock.
    pub expires_in: u64,
}
