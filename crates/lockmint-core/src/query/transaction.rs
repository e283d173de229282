//! Transaction queries: build the call for the wallet and submit it.

use alloy::{
    network::TransactionBuilder,
    primitives::{Address, Bytes, TxHash},
    rpc::types::TransactionRequest,
    sol_types::SolCall,
};
use tracing::{info, instrument};

use super::{client::ChainClient, Query};
use crate::{
    ecosystem::EcosystemConfig,
    error::{ChainError, QueryError},
    interfaces::{LockableToken, Market, MintableToken},
    state::AppState,
};

fn market_address(config: &EcosystemConfig) -> Result<Address, QueryError> {
    config.market.ok_or(QueryError::Unsupported("Market"))
}

/// Target contract and call data of a transaction query.
fn encode_call(config: &EcosystemConfig, query: &Query) -> Result<(Address, Vec<u8>), QueryError> {
    let call = match query {
        Query::AuthorizeOperator => (
            config.lockable_token,
            LockableToken::authorizeOperatorCall {
                operator: config.mintable_token,
            }
            .abi_encode(),
        ),
        Query::Lock {
            amount,
            minter_address,
        } => (
            config.mintable_token,
            MintableToken::lockCall {
                minterAddress: *minter_address,
                amount: *amount,
            }
            .abi_encode(),
        ),
        Query::Unlock => (
            config.mintable_token,
            MintableToken::unlockCall {}.abi_encode(),
        ),
        Query::Mint {
            source_address,
            target_address,
            target_block,
        } => (
            config.mintable_token,
            MintableToken::mintToAddressCall {
                sourceAddress: *source_address,
                targetAddress: *target_address,
                targetBlock: *target_block,
            }
            .abi_encode(),
        ),
        Query::Burn {
            amount,
            target_address,
        } => (
            config.mintable_token,
            MintableToken::burnToAddressCall {
                targetAddress: *target_address,
                amount: *amount,
            }
            .abi_encode(),
        ),
        Query::MarketDeposit {
            amount,
            rewards_percent,
            min_block_number,
            min_burn_amount,
        } => (
            market_address(config)?,
            Market::depositCall {
                amountToDeposit: *amount,
                rewardsPercent: *rewards_percent,
                minBlockNumber: *min_block_number,
                minBurnAmount: *min_burn_amount,
            }
            .abi_encode(),
        ),
        Query::MarketWithdraw => (
            market_address(config)?,
            Market::withdrawAllCall {}.abi_encode(),
        ),
        Query::MarketBurnFromAddress {
            address_to_burn,
            amount,
        } => (
            market_address(config)?,
            Market::burnTokensCall {
                amountToBurn: *amount,
                burnToAddress: *address_to_burn,
            }
            .abi_encode(),
        ),
        Query::InitWallet { .. }
        | Query::FindAccountState { .. }
        | Query::GetOutputQuote { .. }
        | Query::FindMarketAddresses { .. } => {
            return Err(QueryError::Unsupported("Sending a read query as a transaction"))
        }
    };

    Ok(call)
}

/// Submit a transaction query from the wallet's selected account.
///
/// Legacy gas pricing is used when EIP-1559 is disabled in the client
/// settings, with the node's gas price scaled by the configured multiplier.
#[instrument(skip(client, state), fields(kind = query.kind()))]
pub async fn send_transaction(
    client: &dyn ChainClient,
    state: &AppState,
    query: &Query,
) -> Result<TxHash, QueryError> {
    let from = state
        .connection
        .selected_address
        .ok_or(QueryError::NoSelectedAddress)?;
    let config = state.config();
    let (to, input) = encode_call(&config, query)?;

    let mut request = TransactionRequest::default()
        .with_from(from)
        .with_to(to)
        .with_input(Bytes::from(input));

    let settings = &state.client_settings;
    if !settings.use_eip1559 {
        let gas_price = client.gas_price().await.map_err(ChainError::into_revert)?;
        let scaled = (gas_price as f64 * settings.price_multiplier) as u128;
        request = request.with_gas_price(scaled);
    }

    let hash = client
        .send_transaction(request)
        .await
        .map_err(ChainError::into_revert)?;

    info!(%hash, %to, "Transaction submitted");

    Ok(hash)
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{TxKind, U256};

    use super::*;
    use crate::{
        ecosystem::Ecosystem,
        query::mock::{deployments, MockClient, ARBIFLUX_MARKET, WALLET},
    };

    fn connected_state(ecosystem: Ecosystem) -> AppState {
        let mut state = AppState {
            ecosystem,
            ..AppState::default()
        };
        state.connection.selected_address = Some(WALLET);
        state
    }

    #[tokio::test]
    async fn test_lock_targets_mintable_token() {
        let client = MockClient::failing(0);
        let state = connected_state(Ecosystem::ArbiFlux);
        let query = Query::Lock {
            amount: U256::from(5u8),
            minter_address: WALLET,
        };

        let hash = send_transaction(&client, &state, &query).await.unwrap();
        assert_eq!(hash, TxHash::repeat_byte(0x11));

        let sent = client.sent.lock().unwrap();
        let request = &sent[0];
        let config = Ecosystem::ArbiFlux.config();
        assert_eq!(request.from, Some(WALLET));
        assert_eq!(request.to, Some(TxKind::Call(config.mintable_token)));
        assert_eq!(
            request.input.input().unwrap()[..4],
            MintableToken::lockCall::SELECTOR
        );
        assert_eq!(request.gas_price, None);
    }

    #[tokio::test]
    async fn test_authorize_operator_targets_lockable_token() {
        let client = MockClient::failing(0);
        let state = connected_state(Ecosystem::Flux);

        send_transaction(&client, &state, &Query::AuthorizeOperator)
            .await
            .unwrap();

        let sent = client.sent.lock().unwrap();
        let config = Ecosystem::Flux.config();
        assert_eq!(sent[0].to, Some(TxKind::Call(config.lockable_token)));
        let input = sent[0].input.input().unwrap();
        let decoded = LockableToken::authorizeOperatorCall::abi_decode(input, true).unwrap();
        assert_eq!(decoded.operator, config.mintable_token);
    }

    #[tokio::test]
    async fn test_legacy_gas_price_uses_multiplier() {
        let client = MockClient::failing(0);
        let mut state = connected_state(Ecosystem::ArbiFlux);
        state.client_settings.use_eip1559 = false;
        state.client_settings.price_multiplier = 1.5;

        send_transaction(&client, &state, &Query::Unlock)
            .await
            .unwrap();

        let sent = client.sent.lock().unwrap();
        assert_eq!(sent[0].gas_price, Some(1_500_000_000));
    }

    #[tokio::test]
    async fn test_requires_selected_address() {
        let client = MockClient::failing(0);
        let state = AppState::default();

        let err = send_transaction(&client, &state, &Query::Unlock)
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::NoSelectedAddress));
    }

    #[tokio::test]
    async fn test_market_transaction_without_market() {
        let client = MockClient::failing(0);
        let state = connected_state(Ecosystem::Flux);

        let err = send_transaction(&client, &state, &Query::MarketWithdraw)
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::Unsupported(_)));
        assert!(client.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_market_transaction_targets_deployed_market() {
        let client = MockClient::failing(0);
        let state = connected_state(Ecosystem::ArbiFlux).with_deployments(deployments());
        let query = Query::MarketDeposit {
            amount: U256::from(10u8),
            rewards_percent: U256::from(500u16),
            min_block_number: U256::from(1u8),
            min_burn_amount: U256::ZERO,
        };

        send_transaction(&client, &state, &query).await.unwrap();

        let sent = client.sent.lock().unwrap();
        assert_eq!(sent[0].to, Some(TxKind::Call(ARBIFLUX_MARKET)));
        let decoded = Market::depositCall::abi_decode(sent[0].input.input().unwrap(), true).unwrap();
        assert_eq!(decoded.amountToDeposit, U256::from(10u8));
        assert_eq!(decoded.rewardsPercent, U256::from(500u16));
    }

    #[tokio::test]
    async fn test_revert_reason_is_extracted() {
        let mut client = MockClient::failing(0);
        client.send_error = Some("execution reverted: Lock amount too low".to_owned());
        let state = connected_state(Ecosystem::ArbiFlux);

        let err = send_transaction(&client, &state, &Query::Unlock)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Lock amount too low");
    }
}
