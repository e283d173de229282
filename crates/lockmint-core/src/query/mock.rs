//! Scripted [`ChainClient`] for executor tests.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex,
};

use alloy::{
    dyn_abi::DynSolValue,
    primitives::{address, Address, Bytes, TxHash, U256},
    rpc::types::TransactionRequest,
};
use async_trait::async_trait;

use super::client::{AggregateResult, ChainClient};
use crate::{
    ecosystem::{Deployment, Deployments, Ecosystem, PoolConfig, PoolKind, L2_CHAIN_ID},
    error::ChainError,
    interfaces::Multicall,
};

pub(crate) const WALLET: Address = address!("00000000000000000000000000000000000000aa");
pub(crate) const ARBIFLUX_MARKET: Address = address!("00000000000000000000000000000000000000d1");
pub(crate) const LOCKQUIDITY_MARKET: Address = address!("00000000000000000000000000000000000000d2");

/// Pools and markets for the L2 ecosystems, as a deployments file would
/// provide them.
pub(crate) fn deployments() -> Deployments {
    Deployments::from([
        (
            Ecosystem::ArbiFlux,
            Deployment {
                mintable_pool: Some(PoolConfig {
                    address: address!("00000000000000000000000000000000000000e1"),
                    kind: PoolKind::UniswapV3,
                    token_is_token0: false,
                    fee: 10000,
                }),
                market: Some(ARBIFLUX_MARKET),
            },
        ),
        (
            Ecosystem::Lockquidity,
            Deployment {
                mintable_pool: Some(PoolConfig {
                    address: address!("00000000000000000000000000000000000000e2"),
                    kind: PoolKind::ReservePair,
                    token_is_token0: true,
                    fee: 3000,
                }),
                market: Some(LOCKQUIDITY_MARKET),
            },
        ),
    ])
}

/// Scripted client: answers `aggregate` with `respond`, or fails the
/// first `failures` calls.
pub(crate) struct MockClient {
    pub(crate) failures: usize,
    pub(crate) aggregate_calls: AtomicUsize,
    pub(crate) respond: Box<dyn Fn(&[Multicall::Call]) -> Vec<Bytes> + Send + Sync>,
    pub(crate) sent: Mutex<Vec<TransactionRequest>>,
    pub(crate) send_error: Option<String>,
    pub(crate) chain_id: u64,
}

impl MockClient {
    pub(crate) fn new(respond: impl Fn(&[Multicall::Call]) -> Vec<Bytes> + Send + Sync + 'static) -> Self {
        Self {
            failures: 0,
            aggregate_calls: AtomicUsize::new(0),
            respond: Box::new(respond),
            sent: Mutex::new(Vec::new()),
            send_error: None,
            chain_id: L2_CHAIN_ID,
        }
    }

    pub(crate) fn failing(failures: usize) -> Self {
        Self {
            failures,
            ..Self::new(|_| Vec::new())
        }
    }
}

#[async_trait]
impl ChainClient for MockClient {
    async fn chain_id(&self) -> Result<u64, ChainError> {
        Ok(self.chain_id)
    }

    async fn accounts(&self) -> Result<Vec<Address>, ChainError> {
        Ok(vec![WALLET])
    }

    async fn aggregate(
        &self,
        _multicall: Address,
        calls: Vec<Multicall::Call>,
    ) -> Result<AggregateResult, ChainError> {
        let n = self.aggregate_calls.fetch_add(1, Ordering::SeqCst);
        if n < self.failures {
            return Err(ChainError::provider("connection reset"));
        }
        Ok(AggregateResult {
            block_number: U256::from(100u64),
            return_data: (self.respond)(&calls),
        })
    }

    async fn gas_price(&self) -> Result<u128, ChainError> {
        Ok(1_000_000_000)
    }

    async fn send_transaction(&self, request: TransactionRequest) -> Result<TxHash, ChainError> {
        if let Some(message) = &self.send_error {
            return Err(ChainError::provider(message.clone()));
        }
        self.sent.lock().unwrap().push(request);
        Ok(TxHash::repeat_byte(0x11))
    }
}

pub(crate) fn encode(values: Vec<DynSolValue>) -> Bytes {
    Bytes::from(DynSolValue::Tuple(values).abi_encode_params())
}

pub(crate) fn uint(value: u64) -> DynSolValue {
    DynSolValue::Uint(U256::from(value), 256)
}

pub(crate) fn slot0(sqrt_price_x96: U256) -> Bytes {
    encode(vec![
        DynSolValue::Uint(sqrt_price_x96, 160),
        DynSolValue::Int(Default::default(), 24),
        DynSolValue::Uint(U256::ZERO, 16),
        DynSolValue::Uint(U256::ZERO, 16),
        DynSolValue::Uint(U256::ZERO, 16),
        DynSolValue::Uint(U256::ZERO, 8),
        DynSolValue::Bool(true),
    ])
}
