use std::sync::Arc;

use alloy::{
    primitives::{Address, Bytes, TxHash, U256},
    providers::{Provider, RootProvider},
    rpc::types::TransactionRequest,
    transports::BoxTransport,
};
use async_trait::async_trait;

use crate::{error::ChainError, interfaces::Multicall};

/// Result of `Multicall.aggregate`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateResult {
    pub block_number: U256,
    pub return_data: Vec<Bytes>,
}

/// Everything the query executors need from a wallet / JSON-RPC node.
#[async_trait]
pub trait ChainClient: Send + Sync + 'static {
    async fn chain_id(&self) -> Result<u64, ChainError>;

    /// Accounts the wallet exposes, selected account first.
    async fn accounts(&self) -> Result<Vec<Address>, ChainError>;

    /// Run `calls` through the multicall contract as one `eth_call`.
    async fn aggregate(
        &self,
        multicall: Address,
        calls: Vec<Multicall::Call>,
    ) -> Result<AggregateResult, ChainError>;

    async fn gas_price(&self) -> Result<u128, ChainError>;

    /// Submit a transaction for the wallet to sign.
    async fn send_transaction(&self, request: TransactionRequest) -> Result<TxHash, ChainError>;
}

/// [`ChainClient`] backed by an alloy provider. Transactions go out as
/// `eth_sendTransaction`, leaving signing to the wallet behind the endpoint.
#[derive(Debug, Clone)]
pub struct ProviderClient {
    provider: Arc<RootProvider<BoxTransport>>,
}

impl ProviderClient {
    pub fn new(provider: Arc<RootProvider<BoxTransport>>) -> Self {
        Self { provider }
    }
}

fn provider_error(err: impl std::fmt::Display) -> ChainError {
    ChainError::provider(err.to_string())
}

#[async_trait]
impl ChainClient for ProviderClient {
    async fn chain_id(&self) -> Result<u64, ChainError> {
        self.provider.get_chain_id().await.map_err(provider_error)
    }

    async fn accounts(&self) -> Result<Vec<Address>, ChainError> {
        self.provider.get_accounts().await.map_err(provider_error)
    }

    async fn aggregate(
        &self,
        multicall: Address,
        calls: Vec<Multicall::Call>,
    ) -> Result<AggregateResult, ChainError> {
        let multicall = Multicall::new(multicall, Arc::clone(&self.provider));

        let res = multicall
            .aggregate(calls)
            .call()
            .await
            .map_err(provider_error)?;

        Ok(AggregateResult {
            block_number: res.blockNumber,
            return_data: res.returnData,
        })
    }

    async fn gas_price(&self) -> Result<u128, ChainError> {
        self.provider.get_gas_price().await.map_err(provider_error)
    }

    async fn send_transaction(&self, request: TransactionRequest) -> Result<TxHash, ChainError> {
        let pending = self
            .provider
            .send_transaction(request)
            .await
            .map_err(provider_error)?;

        Ok(*pending.tx_hash())
    }
}
