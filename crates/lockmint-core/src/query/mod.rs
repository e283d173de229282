//! Deferred queries and their executors.
//!
//! The command reducer appends [`PendingQuery`] entries to the state; an
//! outside runner hands each one to [`execute`] together with the latest
//! state and folds the resulting [`QueryResponse`] back through the response
//! reducer.

pub mod account;
pub mod client;
pub mod market;
#[cfg(test)]
pub(crate) mod mock;
pub mod pricing;
pub mod quote;
pub mod retry;
pub mod transaction;
pub mod wallet;

use alloy::primitives::{Address, TxHash, U256};
use serde::Serialize;
use tracing::{debug, warn};

use crate::{
    ecosystem::Ecosystem,
    error::QueryError,
    state::{AppState, ConnectionMethod, SwapQuote, SwapToken},
};

pub use account::AccountState;
pub use client::{AggregateResult, ChainClient, ProviderClient};
pub use market::MarketAddresses;
pub use wallet::WalletConnection;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum Query {
    InitWallet {
        method: ConnectionMethod,
    },
    FindAccountState {
        update_eth_balance: bool,
    },
    GetOutputQuote {
        input_token: SwapToken,
        output_token: SwapToken,
        amount: U256,
        throttle: u64,
    },
    FindMarketAddresses {
        ecosystem: Ecosystem,
        addresses: Vec<Address>,
    },
    AuthorizeOperator,
    Lock {
        amount: U256,
        minter_address: Address,
    },
    Unlock,
    Mint {
        source_address: Address,
        target_address: Address,
        target_block: U256,
    },
    Burn {
        amount: U256,
        target_address: Address,
    },
    MarketDeposit {
        amount: U256,
        rewards_percent: U256,
        min_block_number: U256,
        min_burn_amount: U256,
    },
    MarketWithdraw,
    MarketBurnFromAddress {
        address_to_burn: Address,
        amount: U256,
    },
}

impl Query {
    pub fn kind(&self) -> &'static str {
        match self {
            Query::InitWallet { .. } => "InitWallet",
            Query::FindAccountState { .. } => "FindAccountState",
            Query::GetOutputQuote { .. } => "GetOutputQuote",
            Query::FindMarketAddresses { .. } => "FindMarketAddresses",
            Query::AuthorizeOperator => "AuthorizeOperator",
            Query::Lock { .. } => "Lock",
            Query::Unlock => "Unlock",
            Query::Mint { .. } => "Mint",
            Query::Burn { .. } => "Burn",
            Query::MarketDeposit { .. } => "MarketDeposit",
            Query::MarketWithdraw => "MarketWithdraw",
            Query::MarketBurnFromAddress { .. } => "MarketBurnFromAddress",
        }
    }

    /// Queries that submit a transaction rather than read chain state.
    pub fn is_transaction(&self) -> bool {
        matches!(
            self,
            Query::AuthorizeOperator
                | Query::Lock { .. }
                | Query::Unlock
                | Query::Mint { .. }
                | Query::Burn { .. }
                | Query::MarketDeposit { .. }
                | Query::MarketWithdraw
                | Query::MarketBurnFromAddress { .. }
        )
    }

    /// Transactions that move funds held by the market contract.
    pub fn touches_market(&self) -> bool {
        matches!(
            self,
            Query::MarketDeposit { .. } | Query::MarketWithdraw | Query::MarketBurnFromAddress { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingQuery {
    pub id: u64,
    pub query: Query,
}

#[derive(Debug)]
pub enum QueryResult {
    WalletConnection(WalletConnection),
    AccountState(AccountState),
    /// `None` means "keep whatever quote is displayed".
    OutputQuote(Option<SwapQuote>),
    MarketAddresses(MarketAddresses),
    Transaction(TxHash),
}

#[derive(Debug)]
pub struct QueryResponse {
    pub id: u64,
    pub query: Query,
    pub result: Result<QueryResult, QueryError>,
}

/// Run one pending query against the chain, given the state as it is when
/// the query starts.
pub async fn execute(client: &dyn ChainClient, state: &AppState, pending: PendingQuery) -> QueryResponse {
    let PendingQuery { id, query } = pending;
    debug!(id, kind = query.kind(), "Executing query");

    let result = match &query {
        Query::InitWallet { method } => wallet::init_wallet(client, *method)
            .await
            .map(QueryResult::WalletConnection),
        Query::FindAccountState { update_eth_balance } => account::find_account_state(client, state, *update_eth_balance)
            .await
            .map(QueryResult::AccountState),
        Query::GetOutputQuote {
            input_token,
            output_token,
            amount,
            throttle,
        } => quote::get_output_quote(client, state, *input_token, *output_token, *amount, *throttle)
            .await
            .map(QueryResult::OutputQuote),
        Query::FindMarketAddresses {
            ecosystem,
            addresses,
        } => market::find_market_addresses(client, state, *ecosystem, addresses)
            .await
            .map(QueryResult::MarketAddresses),
        other => transaction::send_transaction(client, state, other)
            .await
            .map(QueryResult::Transaction),
    };

    if let Err(err) = &result {
        warn!(id, kind = query.kind(), %err, "Query failed");
    }

    QueryResponse { id, query, result }
}
