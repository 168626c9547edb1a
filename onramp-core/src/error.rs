//! Provider client error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("missing provider credential: {field}")]
    MissingCredentials { field: &'static str },

    #[error("HTTP error calling {endpoint}: {source}")]
    Http {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("provider {endpoint} returned {status}: {body}")]
    Api {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("provider {endpoint} rejected authentication ({status})")]
    AuthRejected { endpoint: String, status: u16 },

    #[error("failed to deserialize response from {endpoint}: {source}")]
    Deserialization {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
}

impl Error {
    /// Whether this error is a 401/403 from the provider, i.e. the bearer
    /// token (not the request itself) was the problem.
    pub fn is_auth_rejected(&self) -> bool {
        matches!(self, Error::AuthRejected { .. })
    }
}
