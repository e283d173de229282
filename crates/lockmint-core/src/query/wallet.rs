use alloy::primitives::Address;
use tracing::{info, instrument};

use super::client::ChainClient;
use crate::{error::ChainError, error::QueryError, state::ConnectionMethod};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletConnection {
    pub method: ConnectionMethod,
    pub chain_id: u64,
    pub selected_address: Address,
}

/// Read the chain id and selected account from the wallet.
#[instrument(skip(client))]
pub async fn init_wallet(
    client: &dyn ChainClient,
    method: ConnectionMethod,
) -> Result<WalletConnection, QueryError> {
    let chain_id = client.chain_id().await?;
    let selected_address = client
        .accounts()
        .await?
        .first()
        .copied()
        .ok_or(ChainError::NoAccounts)?;

    info!(chain_id, %selected_address, "Wallet connected");

    Ok(WalletConnection {
        method,
        chain_id,
        selected_address,
    })
}
