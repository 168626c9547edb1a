//! Customer, account, and deposit-address provisioning resources

use serde::{Deserialize, Serialize};

/// A customer as the provider reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerResource {
    pub guid: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub state: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateCustomerRequest {
    #[serde(rename = "type")]
    pub kind: String,
}

impl CreateCustomerRequest {
    pub fn individual() -> Self {
        Self {
            kind: "individual".to_string(),
        }
    }
}

/// A ledger account attached to a customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountResource {
    pub guid: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub asset: String,
    pub customer_guid: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateAccountRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub asset: String,
    pub customer_guid: String,
}

impl CreateAccountRequest {
    pub fn trading(customer_guid: impl Into<String>, asset: impl Into<String>) -> Self {
        Self {
            kind: "trading".to_string(),
            asset: asset.into(),
            customer_guid: customer_guid.into(),
        }
    }
}

/// A deposit address provisioned against an account. The `address` field is
/// filled in asynchronously by the provider and may be absent right after
/// creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositAddressResource {
    pub guid: String,
    pub account_guid: String,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateDepositAddressRequest {
    pub account_guid: String,
}
