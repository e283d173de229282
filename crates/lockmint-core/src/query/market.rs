//! `FindMarketAddresses`: per-address market game details.

use std::collections::BTreeMap;

use alloy::{
    dyn_abi::DynSolValue,
    primitives::{Address, U256},
};
use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

use super::{client::ChainClient, retry::with_retries};
use crate::{
    ecosystem::Ecosystem,
    error::{CodecError, QueryError},
    multicall::{address_at, bool_at, uint_at, MultiCallBatch, MultiCallParams, Returns},
    state::{AddressLock, AppState, MarketAddressDetails},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketAddresses {
    pub ecosystem: Ecosystem,
    pub block_number: U256,
    pub details: BTreeMap<Address, MarketAddressDetails>,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug)]
enum MarketValue {
    Market {
        rewards_amount: U256,
        rewards_percent: U256,
        min_block_number: U256,
        is_paused: bool,
        min_burn_amount: U256,
    },
    Lock(AddressLock),
    MintAmount(U256),
}

fn market_batch(
    market: Address,
    token: Address,
    addresses: &[Address],
) -> Result<MultiCallBatch<MarketValue>, CodecError> {
    let mut batch = MultiCallBatch::new();

    for address in addresses {
        batch.push(
            format!("market:{address}"),
            MultiCallParams::new(
                market,
                "marketAddressLocks(address)",
                vec![DynSolValue::Address(*address)],
                Returns::new(
                    &["uint256", "uint256", "uint256", "bool", "uint256"],
                    |values: &[DynSolValue]| {
                        let call = "marketAddressLocks";
                        Ok(MarketValue::Market {
                            rewards_amount: uint_at(values, 0, call)?,
                            rewards_percent: uint_at(values, 1, call)?,
                            min_block_number: uint_at(values, 2, call)?,
                            is_paused: bool_at(values, 3, call)?,
                            min_burn_amount: uint_at(values, 4, call)?,
                        })
                    },
                )?,
            )?,
        )?;
        batch.push(
            format!("lock:{address}"),
            MultiCallParams::new(
                token,
                "addressLocks(address)",
                vec![DynSolValue::Address(*address)],
                Returns::new(
                    &["uint256", "uint256", "uint256", "uint256", "address"],
                    |values: &[DynSolValue]| {
                        let call = "addressLocks";
                        Ok(MarketValue::Lock(AddressLock {
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
            format!("mint:{address}"),
            MultiCallParams::new(
                token,
                "getAddressDetails(address)",
                vec![DynSolValue::Address(*address)],
                Returns::new(&["uint256"; 6], |values: &[DynSolValue]| {
                    Ok(MarketValue::MintAmount(uint_at(values, 2, "getAddressDetails")?))
                })?,
            )?,
        )?;
    }

    Ok(batch)
}

#[instrument(skip(client, state, addresses), fields(count = addresses.len()))]
pub async fn find_market_addresses(
    client: &dyn ChainClient,
    state: &AppState,
    ecosystem: Ecosystem,
    addresses: &[Address],
) -> Result<MarketAddresses, QueryError> {
    let config = state.config_for(ecosystem);
    let market = config.market.ok_or(QueryError::Unsupported("Market"))?;
    let layer = config.layer.config();

    if addresses.is_empty() {
        debug!("No market addresses to look up");
        return Ok(MarketAddresses {
            ecosystem,
            block_number: U256::ZERO,
            details: BTreeMap::new(),
            fetched_at: Utc::now(),
        });
    }

    let batch = market_batch(market, config.mintable_token, addresses)?;
    let calls = batch.encode()?;

    let batch = &batch;
    let calls = &calls;
    let multicall = layer.multicall_address;

    let (block_number, mut decoded) = with_retries("find market addresses", || async move {
        let res = client.aggregate(multicall, calls.clone()).await?;
        let decoded = batch.decode(&res.return_data)?;
        Ok::<_, QueryError>((res.block_number, decoded))
    })
    .await
    .map_err(|err| QueryError::Rpc {
        err: err.to_string(),
        net_id: state.connection.chain_id.unwrap_or(layer.chain_id),
        network_type: config.layer,
    })?;

    let mut details = BTreeMap::new();
    for address in addresses {
        let missing = |prefix: &str| CodecError::MissingResult(format!("{prefix}:{address}"));

        let Some(MarketValue::Market {
            rewards_amount,
            rewards_percent,
            min_block_number,
            is_paused,
            min_burn_amount,
        }) = decoded.remove(&format!("market:{address}"))
        else {
            return Err(missing("market").into());
        };
        let Some(MarketValue::Lock(lock)) = decoded.remove(&format!("lock:{address}")) else {
            return Err(missing("lock").into());
        };
        let Some(MarketValue::MintAmount(mint_amount)) = decoded.remove(&format!("mint:{address}"))
        else {
            return Err(missing("mint").into());
        };

        details.insert(
            *address,
            MarketAddressDetails {
                rewards_amount,
                rewards_percent,
                min_block_number,
                min_burn_amount,
                is_paused,
                lock,
                mint_amount,
            },
        );
    }

    Ok(MarketAddresses {
        ecosystem,
        block_number,
        details,
        fetched_at: Utc::now(),
    })
}
