//! `FindAccountState`: balances, lock and mint details of one address plus
//! the pool prices needed to value them.

use std::collections::BTreeMap;

use alloy::{
    dyn_abi::DynSolValue,
    primitives::{Address, U256},
};
use tracing::{debug, instrument};

use super::{
    client::ChainClient,
    pricing::{eth_price_usd, pool_call, token_price_eth},
    retry::with_retries,
};
use crate::{
    ecosystem::{Ecosystem, EcosystemConfig, LayerConfig, PoolKind},
    error::{CodecError, QueryError},
    multicall::{address_at, bool_at, uint_at, MultiCallBatch, MultiCallParams, Returns},
    state::{AddressDetails, AddressLock, AddressTokenDetails, AppState, Balances, PoolSnapshot},
};

/// Decoded value of a single call in the account batch.
#[derive(Debug)]
enum AccountValue {
    Balance(U256),
    Lock(AddressLock),
    Details(AddressDetails),
    TokenDetails(AddressTokenDetails),
    Pool(PoolSnapshot),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AccountState {
    pub ecosystem: Ecosystem,
    /// `None` when neither an address override nor a wallet address was set.
    pub address: Option<Address>,
    /// Only set when the query asked for the ETH balance.
    pub eth_balance: Option<U256>,
    pub balances: Option<Balances>,
    pub address_lock: Option<AddressLock>,
    pub address_details: Option<AddressDetails>,
    pub address_token_details: Option<AddressTokenDetails>,
}

impl AccountState {
    fn no_selected_address(ecosystem: Ecosystem) -> Self {
        Self {
            ecosystem,
            address: None,
            eth_balance: None,
            balances: None,
            address_lock: None,
            address_details: None,
            address_token_details: None,
        }
    }
}

fn balance_of(token: Address, owner: Address, name: &'static str) -> Result<MultiCallParams<AccountValue>, CodecError> {
    MultiCallParams::new(
        token,
        "balanceOf(address)",
        vec![DynSolValue::Address(owner)],
        Returns::new(&["uint256"], move |values: &[DynSolValue]| {
            Ok(AccountValue::Balance(uint_at(values, 0, name)?))
        })?,
    )
}

/// Calls that make up one account lookup. Entries that do not apply to the
/// ecosystem are simply not pushed.
fn account_batch(
    config: &EcosystemConfig,
    layer: &LayerConfig,
    address: Address,
    update_eth_balance: bool,
) -> Result<MultiCallBatch<AccountValue>, CodecError> {
    let mut batch = MultiCallBatch::new();

    if update_eth_balance {
        batch.push(
            "ethBalance",
            MultiCallParams::new(
                layer.multicall_address,
                "getEthBalance(address)",
                vec![DynSolValue::Address(address)],
                Returns::new(&["uint256"], |values: &[DynSolValue]| {
                    Ok(AccountValue::Balance(uint_at(values, 0, "ethBalance")?))
                })?,
            )?,
        )?;
    }

    batch.push(
        "lockableBalance",
        balance_of(config.lockable_token, address, "lockableBalance")?,
    )?;
    batch.push(
        "mintableBalance",
        balance_of(config.mintable_token, address, "mintableBalance")?,
    )?;

    batch.push(
        "addressLock",
        MultiCallParams::new(
            config.mintable_token,
            "addressLocks(address)",
            vec![DynSolValue::Address(address)],
            Returns::new(
                &["uint256", "uint256", "uint256", "uint256", "address"],
                |values: &[DynSolValue]| {
                    let call = "addressLock";
                    Ok(AccountValue::Lock(AddressLock {
                        amount: uint_at(values, 0, call)?,
                        block_number: uint_at(values, 1, call)?,
                        burned_amount: uint_at(values, 2, call)?,
                        last_mint_block_number: uint_at(values, 3, call)?,
                        minter_address: address_at(values, 4, call)?,
                    }))
                },
            )?,
        )?,
    )?;

    batch.push(
        "addressDetails",
        MultiCallParams::new(
            config.mintable_token,
            "getAddressDetails(address)",
            vec![DynSolValue::Address(address)],
            Returns::new(&["uint256"; 6], |values: &[DynSolValue]| {
                let call = "addressDetails";
                Ok(AccountValue::Details(AddressDetails {
                    block_number: uint_at(values, 0, call)?,
                    mintable_balance: uint_at(values, 1, call)?,
                    mint_amount: uint_at(values, 2, call)?,
                    time_multiplier: uint_at(values, 3, call)?,
                    burn_multiplier: uint_at(values, 4, call)?,
                    global_burned_amount: uint_at(values, 5, call)?,
                }))
            })?,
        )?,
    )?;

    batch.push(
        "addressTokenDetails",
        MultiCallParams::new(
            config.mintable_token,
            "getAddressTokenDetails(address)",
            vec![DynSolValue::Address(address)],
            Returns::new(
                &["uint256", "bool", "uint256", "uint256", "uint256"],
                |values: &[DynSolValue]| {
                    let call = "addressTokenDetails";
                    Ok(AccountValue::TokenDetails(AddressTokenDetails {
                        block_number: uint_at(values, 0, call)?,
                        is_operator: bool_at(values, 1, call)?,
                        lockable_balance: uint_at(values, 2, call)?,
                        global_locked: uint_at(values, 3, call)?,
                        global_burned: uint_at(values, 4, call)?,
                    }))
                },
            )?,
        )?,
    )?;

    if let Some(pool) = &config.lockable_pool {
        batch.push(
            "lockablePool",
            pool_call(pool.address, pool.kind, "lockablePool", AccountValue::Pool)?,
        )?;
    }
    if let Some(pool) = &config.mintable_pool {
        batch.push(
            "mintablePool",
            pool_call(pool.address, pool.kind, "mintablePool", AccountValue::Pool)?,
        )?;
    }
    batch.push(
        "usdcEthPool",
        pool_call(
            layer.usdc_eth_pool.address,
            PoolKind::UniswapV3,
            "usdcEthPool",
            AccountValue::Pool,
        )?,
    )?;

    Ok(batch)
}

struct Decoded(BTreeMap<String, AccountValue>);

impl Decoded {
    fn take(&mut self, name: &str) -> Result<AccountValue, CodecError> {
        self.0
            .remove(name)
            .ok_or_else(|| CodecError::MissingResult(name.to_owned()))
    }

    fn balance(&mut self, name: &str) -> Result<U256, CodecError> {
        match self.take(name)? {
            AccountValue::Balance(value) => Ok(value),
            _ => Err(CodecError::MissingResult(name.to_owned())),
        }
    }

    fn pool(&mut self, name: &str) -> Result<PoolSnapshot, CodecError> {
        match self.take(name)? {
            AccountValue::Pool(value) => Ok(value),
            _ => Err(CodecError::MissingResult(name.to_owned())),
        }
    }
}

#[instrument(skip(client, state), fields(ecosystem = ?state.ecosystem))]
pub async fn find_account_state(
    client: &dyn ChainClient,
    state: &AppState,
    update_eth_balance: bool,
) -> Result<AccountState, QueryError> {
    let ecosystem = state.ecosystem;
    let Some(address) = state.selected_address() else {
        debug!("No selected address");
        return Ok(AccountState::no_selected_address(ecosystem));
    };

    let config = state.config();
    let layer = config.layer.config();
    let batch = account_batch(&config, layer, address, update_eth_balance)?;
    let calls = batch.encode()?;

    let batch = &batch;
    let calls = &calls;
    let multicall = layer.multicall_address;

    let decoded = with_retries("find account state", || async move {
        let res = client.aggregate(multicall, calls.clone()).await?;
        batch.decode(&res.return_data).map_err(QueryError::from)
    })
    .await
    .map_err(|err| QueryError::Rpc {
        err: err.to_string(),
        net_id: state.connection.chain_id.unwrap_or(layer.chain_id),
        network_type: config.layer,
    })?;

    let mut decoded = Decoded(decoded);

    let eth_balance = if update_eth_balance {
        Some(decoded.balance("ethBalance")?)
    } else {
        None
    };
    let lockable = decoded.balance("lockableBalance")?;
    let mintable = decoded.balance("mintableBalance")?;

    let address_lock = match decoded.take("addressLock")? {
        AccountValue::Lock(lock) => lock,
        _ => return Err(CodecError::MissingResult("addressLock".to_owned()).into()),
    };
    let address_details = match decoded.take("addressDetails")? {
        AccountValue::Details(details) => details,
        _ => return Err(CodecError::MissingResult("addressDetails".to_owned()).into()),
    };
    let address_token_details = match decoded.take("addressTokenDetails")? {
        AccountValue::TokenDetails(details) => details,
        _ => return Err(CodecError::MissingResult("addressTokenDetails".to_owned()).into()),
    };

    let lockable_pool = match config.lockable_pool {
        Some(_) => Some(decoded.pool("lockablePool")?),
        None => None,
    };
    let mintable_pool = match config.mintable_pool {
        Some(_) => Some(decoded.pool("mintablePool")?),
        None => None,
    };
    let usdc_eth_pool = decoded.pool("usdcEthPool")?;

    // Without a known pool the token is shown unpriced.
    let mintable_price_eth = match (&mintable_pool, &config.mintable_pool) {
        (Some(snapshot), Some(pool)) => token_price_eth(snapshot, pool),
        _ => 0.0,
    };
    let lockable_price_eth = match (&lockable_pool, &config.lockable_pool) {
        (Some(snapshot), Some(pool)) => token_price_eth(snapshot, pool),
        // Single-token ecosystems lock and mint the same asset.
        _ if config.lockable_token == config.mintable_token => mintable_price_eth,
        _ => 0.0,
    };
    let eth_price_usd = eth_price_usd(&usdc_eth_pool, &layer.usdc_eth_pool);

    let balances = Balances {
        eth: eth_balance.unwrap_or_default(),
        lockable,
        mintable,
        lockable_pool,
        mintable_pool,
        lockable_price_eth,
        mintable_price_eth,
        eth_price_usd,
        lockable_price_usd: lockable_price_eth * eth_price_usd,
        mintable_price_usd: mintable_price_eth * eth_price_usd,
    };

    Ok(AccountState {
        ecosystem,
        address: Some(address),
        eth_balance,
        balances: Some(balances),
        address_lock: Some(address_lock),
        address_details: Some(address_details),
        address_token_details: Some(address_token_details),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use alloy::primitives::Bytes;

    use super::*;
    use crate::{
        ecosystem::{Layer, L2_CHAIN_ID},
        interfaces::Multicall,
        query::mock::{deployments, encode, slot0, uint, MockClient, WALLET},
    };

    /// Mock answers for an ArbiFlux account batch without the ETH balance.
    fn arbiflux_responses(calls: &[Multicall::Call]) -> Vec<Bytes> {
        let one = U256::from(1u8) << 96usize;
        vec![
            encode(vec![uint(500)]),
            encode(vec![uint(42)]),
            encode(vec![
                uint(1000),
                uint(10),
                uint(0),
                uint(20),
                DynSolValue::Address(WALLET),
            ]),
            encode(vec![uint(120), uint(42), uint(7), uint(10_000), uint(10_000), uint(0)]),
            encode(vec![uint(120), DynSolValue::Bool(true), uint(500), uint(9_000), uint(0)]),
            slot0(one),
            slot0(one),
            slot0(one),
        ]
        .into_iter()
        .take(calls.len())
        .collect()
    }

    fn state_with_wallet() -> AppState {
        let mut state = AppState {
            ecosystem: Ecosystem::ArbiFlux,
            ..AppState::default()
        }
        .with_deployments(deployments());
        state.connection.selected_address = Some(WALLET);
        state
    }

    #[tokio::test]
    async fn test_no_selected_address() {
        let client = MockClient::failing(10);
        let state = AppState::default();

        let res = find_account_state(&client, &state, false).await.unwrap();

        assert_eq!(res.address, None);
        assert!(res.balances.is_none());
        assert!(res.address_lock.is_none());
        assert_eq!(client.aggregate_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_decodes_account_state() {
        let client = MockClient::new(arbiflux_responses);
        let state = state_with_wallet();

        let res = find_account_state(&client, &state, false).await.unwrap();

        assert_eq!(res.address, Some(WALLET));
        assert_eq!(res.eth_balance, None);

        let balances = res.balances.unwrap();
        assert_eq!(balances.lockable, U256::from(500u64));
        assert_eq!(balances.mintable, U256::from(42u64));
        assert!((balances.mintable_price_eth - 1.0).abs() < 1e-9);

        let lock = res.address_lock.unwrap();
        assert_eq!(lock.amount, U256::from(1000u64));
        assert_eq!(lock.last_mint_block_number, U256::from(20u64));
        assert_eq!(lock.minter_address, WALLET);

        assert_eq!(res.address_details.unwrap().mint_amount, U256::from(7u64));
        assert!(res.address_token_details.unwrap().is_operator);
    }

    #[tokio::test]
    async fn test_eth_balance_is_first_call() {
        let client = MockClient::new(|calls| {
            let mut responses = vec![encode(vec![uint(77)])];
            responses.extend(arbiflux_responses(&calls[1..]));
            responses
        });
        let state = state_with_wallet();

        let res = find_account_state(&client, &state, true).await.unwrap();

        assert_eq!(res.eth_balance, Some(U256::from(77u64)));
        assert_eq!(res.balances.unwrap().eth, U256::from(77u64));
    }

    #[tokio::test]
    async fn test_missing_mintable_pool_is_skipped() {
        let client = MockClient::new(|calls| {
            // Balances, lock, details, token details, lockable pool, USDC pool.
            assert_eq!(calls.len(), 7);
            arbiflux_responses(calls)
        });
        let mut state = state_with_wallet();
        state.deployments.clear();

        let res = find_account_state(&client, &state, false).await.unwrap();

        let balances = res.balances.unwrap();
        assert_eq!(balances.mintable_pool, None);
        assert_eq!(balances.mintable_price_eth, 0.0);
        assert!(balances.lockable_pool.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_then_escalates() {
        let client = MockClient::failing(4);
        let state = state_with_wallet();

        let err = find_account_state(&client, &state, false)
            .await
            .unwrap_err();

        assert_eq!(client.aggregate_calls.load(Ordering::SeqCst), 4);
        match err {
            QueryError::Rpc {
                err,
                net_id,
                network_type,
            } => {
                assert!(err.contains("connection reset"));
                assert_eq!(net_id, L2_CHAIN_ID);
                assert_eq!(network_type, Layer::L2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_within_retry_budget() {
        let mut client = MockClient::new(arbiflux_responses);
        client.failures = 3;
        let state = state_with_wallet();

        let res = find_account_state(&client, &state, false).await.unwrap();

        assert_eq!(client.aggregate_calls.load(Ordering::SeqCst), 4);
        assert!(res.balances.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_bad_layout_is_retried_like_rpc_failure() {
        let client = MockClient::new(|calls| vec![Bytes::new(); calls.len()]);
        let state = state_with_wallet();

        let err = find_account_state(&client, &state, false)
            .await
            .unwrap_err();

        assert_eq!(client.aggregate_calls.load(Ordering::SeqCst), 4);
        assert!(matches!(err, QueryError::Rpc { .. }));
    }
}
