//! Customer provisioning endpoints

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::BrokerError;
use crate::state::AppState;
use crate::store::{VerificationStore, WebhookStore};

#[derive(Serialize)]
pub struct CreateCustomerResponse {
    pub success: bool,
    pub customer_guid: String,
}

/// POST /api/customers
pub async fn create_customer<V, W>(
    State(state): State<Arc<AppState<V, W>>>,
) -> Result<Json<CreateCustomerResponse>, BrokerError>
where
    V: VerificationStore,
    W: WebhookStore,
{
    let customer = state.gateway.create_customer().await?;

    Ok(Json(CreateCustomerResponse {
        success: true,
        customer_guid: customer.guid,
    }))
}

#[derive(Deserialize)]
pub struct CreateDepositAddressRequest {
    pub asset: String,
}

#[derive(Serialize)]
pub struct CreateDepositAddressResponse {
    pub success: bool,
    pub account_guid: String,
    pub address_guid: String,
    /// Provisioned asynchronously by the provider; may lag the account
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// POST /api/customers/{guid}/deposit_addresses
///
/// Provisions a trading account for the customer and a deposit address
/// against it, both through the authenticated gateway.
pub async fn create_deposit_address<V, W>(
    State(state): State<Arc<AppState<V, W>>>,
    Path(customer_guid): Path<String>,
    Json(req): Json<CreateDepositAddressRequest>,
) -> Result<Json<CreateDepositAddressResponse>, BrokerError>
where
    V: VerificationStore,
    W: WebhookStore,
{
    let account = state
        .gateway
        .create_account(&customer_guid, &req.asset)
        .await?;
    let deposit = state.gateway.create_deposit_address(&account.guid).await?;

    Ok(Json(CreateDepositAddressResponse {
        success: true,
        account_guid: account.guid,
        address_guid: deposit.guid,
        address: deposit.address,
    }))
}
