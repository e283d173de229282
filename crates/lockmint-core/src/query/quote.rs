//! `GetOutputQuote`: estimate a swap's output from live pool state.

use alloy::primitives::{Address, U256};
use tracing::{debug, instrument};

use super::{
    client::ChainClient,
    pricing::{
        pool_call, price_impact, reserve_output, reserve_spot_output, spot_output, token_price_eth,
    },
    retry::with_retries,
};
use crate::{
    ecosystem::{EcosystemConfig, PoolConfig},
    error::{CodecError, QueryError},
    multicall::MultiCallBatch,
    state::{AppState, PoolSnapshot, SwapQuote, SwapToken},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Leg {
    /// ETH in, token out.
    Buy(PoolConfig),
    /// Token in, ETH out.
    Sell(PoolConfig),
}

impl Leg {
    fn pool(&self) -> &PoolConfig {
        match self {
            Leg::Buy(pool) | Leg::Sell(pool) => pool,
        }
    }

    /// Output of this leg, and the output at spot price without fees. `None`
    /// when either amount would not fit in 256 bits.
    fn output(&self, snapshot: &PoolSnapshot, amount_in: U256) -> Option<(U256, U256)> {
        let pool = self.pool();
        match snapshot {
            PoolSnapshot::ReservePair { reserve0, reserve1 } => {
                let (token_reserve, eth_reserve) = if pool.token_is_token0 {
                    (*reserve0, *reserve1)
                } else {
                    (*reserve1, *reserve0)
                };
                let (reserve_in, reserve_out) = match self {
                    Leg::Buy(_) => (eth_reserve, token_reserve),
                    Leg::Sell(_) => (token_reserve, eth_reserve),
                };
                Some((
                    reserve_output(reserve_in, reserve_out, amount_in, pool.fee)?,
                    reserve_spot_output(reserve_in, reserve_out, amount_in)?,
                ))
            }
            PoolSnapshot::UniswapV3 { .. } => {
                let eth_per_token = token_price_eth(snapshot, pool);
                let price = match self {
                    Leg::Buy(_) if eth_per_token == 0.0 => 0.0,
                    Leg::Buy(_) => 1.0 / eth_per_token,
                    Leg::Sell(_) => eth_per_token,
                };
                Some((
                    spot_output(amount_in, price, pool.fee)?,
                    spot_output(amount_in, price, 0)?,
                ))
            }
        }
    }
}

fn token_address(config: &EcosystemConfig, token: SwapToken) -> Option<Address> {
    match token {
        SwapToken::Eth => None,
        SwapToken::Lockable => Some(config.lockable_token),
        SwapToken::Mintable => Some(config.mintable_token),
    }
}

fn token_pool(config: &EcosystemConfig, token: SwapToken) -> Result<PoolConfig, QueryError> {
    match token {
        SwapToken::Mintable => config
            .mintable_pool
            .ok_or(QueryError::Unsupported("Swapping the mintable token")),
        SwapToken::Lockable => config
            .lockable_pool
            .or_else(|| {
                (config.lockable_token == config.mintable_token)
                    .then_some(config.mintable_pool)
                    .flatten()
            })
            .ok_or(QueryError::Unsupported("Swapping the lockable token")),
        SwapToken::Eth => Err(QueryError::Unsupported("ETH pool")),
    }
}

fn route(config: &EcosystemConfig, input: SwapToken, output: SwapToken) -> Result<Vec<Leg>, QueryError> {
    Ok(match (input, output) {
        (SwapToken::Eth, token) => vec![Leg::Buy(token_pool(config, token)?)],
        (token, SwapToken::Eth) => vec![Leg::Sell(token_pool(config, token)?)],
        (from, to) => vec![
            Leg::Sell(token_pool(config, from)?),
            Leg::Buy(token_pool(config, to)?),
        ],
    })
}

/// Returns `None` when the quote is no longer wanted: a newer amount was
/// typed since this query was queued, or there is nothing to swap.
#[instrument(skip(client, state))]
pub async fn get_output_quote(
    client: &dyn ChainClient,
    state: &AppState,
    input_token: SwapToken,
    output_token: SwapToken,
    amount: U256,
    throttle: u64,
) -> Result<Option<SwapQuote>, QueryError> {
    if throttle != state.swap.last_swap_throttle {
        debug!(current = state.swap.last_swap_throttle, "Stale quote request");
        return Ok(None);
    }

    let config = state.config();
    if amount.is_zero()
        || input_token == output_token
        || token_address(&config, input_token) == token_address(&config, output_token)
    {
        return Ok(None);
    }

    let legs = route(&config, input_token, output_token)?;
    let layer = config.layer.config();

    let mut batch = MultiCallBatch::new();
    for (i, leg) in legs.iter().enumerate() {
        let pool = leg.pool();
        let name = if i == 0 { "pool0" } else { "pool1" };
        batch.push(name, pool_call(pool.address, pool.kind, name, |snapshot: PoolSnapshot| snapshot)?)?;
    }
    let calls = batch.encode()?;

    let batch = &batch;
    let calls = &calls;
    let multicall = layer.multicall_address;

    let snapshots = with_retries("get output quote", || async move {
        let res = client.aggregate(multicall, calls.clone()).await?;
        batch.decode(&res.return_data).map_err(QueryError::from)
    })
    .await
    .map_err(|err| QueryError::Rpc {
        err: err.to_string(),
        net_id: state.connection.chain_id.unwrap_or(layer.chain_id),
        network_type: config.layer,
    })?;

    let mut output_amount = amount;
    let mut ideal_amount = amount;
    for (i, leg) in legs.iter().enumerate() {
        let name = if i == 0 { "pool0" } else { "pool1" };
        let snapshot = snapshots
            .get(name)
            .ok_or_else(|| CodecError::MissingResult(name.to_owned()))?;
        output_amount = leg
            .output(snapshot, output_amount)
            .ok_or(QueryError::AmountTooLarge)?
            .0;
        ideal_amount = leg
            .output(snapshot, ideal_amount)
            .ok_or(QueryError::AmountTooLarge)?
            .1;
    }

    Ok(Some(SwapQuote {
        input_amount: amount,
        output_amount,
        price_impact: price_impact(ideal_amount, output_amount),
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use alloy::primitives::Bytes;

    use super::*;
    use crate::{
        ecosystem::{Ecosystem, TOKEN_DECIMALS},
        numeric::parse_units,
        query::mock::{deployments, encode, slot0, uint, MockClient},
    };

    fn lockquidity_state(throttle: u64) -> AppState {
        let mut state = AppState {
            ecosystem: Ecosystem::Lockquidity,
            ..AppState::default()
        }
        .with_deployments(deployments());
        state.swap.last_swap_throttle = throttle;
        state
    }

    #[tokio::test]
    async fn test_stale_throttle_is_empty() {
        let client = MockClient::failing(10);
        let state = lockquidity_state(5);

        let quote = get_output_quote(&client, &state, SwapToken::Eth, SwapToken::Mintable, U256::from(1u8), 4)
            .await
            .unwrap();

        assert_eq!(quote, None);
        assert_eq!(client.aggregate_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_zero_amount_is_empty() {
        let client = MockClient::failing(10);
        let state = lockquidity_state(1);

        let quote = get_output_quote(&client, &state, SwapToken::Eth, SwapToken::Mintable, U256::ZERO, 1)
            .await
            .unwrap();

        assert_eq!(quote, None);
    }

    #[tokio::test]
    async fn test_reserve_pair_quote() {
        // LOCK is token0: 1_000_000 LOCK against 1_000 ETH (raw units).
        let client = MockClient::new(|_| vec![encode(vec![uint(1_000_000), uint(1_000), uint(0)])]);
        let state = lockquidity_state(1);

        let quote = get_output_quote(
            &client,
            &state,
            SwapToken::Eth,
            SwapToken::Mintable,
            U256::from(10u64),
            1,
        )
        .await
        .unwrap()
        .unwrap();

        let expected =
            reserve_output(U256::from(1_000u64), U256::from(1_000_000u64), U256::from(10u64), 3000).unwrap();
        assert_eq!(quote.input_amount, U256::from(10u64));
        assert_eq!(quote.output_amount, expected);
        assert!(quote.price_impact > 0.0);
    }

    #[tokio::test]
    async fn test_two_leg_quote_uses_both_pools() {
        let client = MockClient::new(|calls| {
            assert_eq!(calls.len(), 2);
            vec![slot0(U256::from(1u8) << 96usize), slot0(U256::from(1u8) << 96usize)]
        });
        let mut state = lockquidity_state(3);
        state.ecosystem = Ecosystem::ArbiFlux;

        let quote = get_output_quote(
            &client,
            &state,
            SwapToken::Lockable,
            SwapToken::Mintable,
            U256::from(1_000_000u64),
            3,
        )
        .await
        .unwrap()
        .unwrap();

        // Price 1:1 on both legs; fees of 0.3% and 1% apply in turn.
        assert!(quote.output_amount < U256::from(1_000_000u64));
        assert!(quote.output_amount > U256::from(980_000u64));
    }

    #[tokio::test]
    async fn test_oversized_amount_is_rejected() {
        // uint112-sized reserves on both sides.
        let reserve = U256::from(1u8) << 111usize;
        let client = MockClient::new(move |_| {
            vec![encode(vec![
                alloy::dyn_abi::DynSolValue::Uint(reserve, 112),
                alloy::dyn_abi::DynSolValue::Uint(reserve, 112),
                uint(0),
            ])]
        });
        let state = lockquidity_state(1);
        let amount = parse_units(&"9".repeat(40), TOKEN_DECIMALS).unwrap();

        let err = get_output_quote(&client, &state, SwapToken::Eth, SwapToken::Mintable, amount, 1)
            .await
            .unwrap_err();

        assert!(matches!(err, QueryError::AmountTooLarge));
    }

    #[tokio::test]
    async fn test_missing_pool_is_unsupported() {
        let client = MockClient::failing(10);
        let mut state = lockquidity_state(1);
        state.deployments.clear();

        let err = get_output_quote(&client, &state, SwapToken::Eth, SwapToken::Mintable, U256::from(1u8), 1)
            .await
            .unwrap_err();

        assert!(matches!(err, QueryError::Unsupported(_)));
        assert_eq!(client.aggregate_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_same_token_is_empty() {
        let client = MockClient::new(|_| Vec::<Bytes>::new());
        let state = lockquidity_state(1);

        let quote = get_output_quote(
            &client,
            &state,
            SwapToken::Lockable,
            SwapToken::Mintable,
            U256::from(1u8),
            1,
        )
        .await
        .unwrap();

        assert_eq!(quote, None);
    }
}
