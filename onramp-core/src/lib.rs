//! Onramp Core Library
//!
//! Typed client for the upstream financial-infrastructure provider:
//! - OAuth client-credentials token exchange
//! - Customer, account, and deposit-address provisioning resources
//! - Asynchronous identity-verification resources and their state model

pub mod client;
pub mod customer;
pub mod error;
pub mod oauth;
pub mod verification;

pub use client::{ProviderClient, ProviderClientConfig};
pub use customer::{AccountResource, CustomerResource, DepositAddressResource};
pub use error::Error;
pub use oauth::{ClientCredentials, TokenResponse};
pub use verification::{
    CreateVerificationRequest, VerificationOutcome, VerificationResource, VerificationState,
};

/// Result type for onramp-core operations
pub type Result<T> = std::result::Result<T, Error>;
