//! Query response reducer: folds executor results back into the state.

use std::sync::Arc;

use tracing::{debug, info};

use crate::{
    ecosystem::Layer,
    query::{AccountState, MarketAddresses, Query, QueryResponse, QueryResult, WalletConnection},
    state::{AppState, ConnectionStatus, SwapQuote},
};

pub fn reduce_response(state: &Arc<AppState>, response: QueryResponse) -> Arc<AppState> {
    let QueryResponse { id, query, result } = response;

    let mut next = AppState::clone(state);
    next.pending_queries.retain(|pending| pending.id != id);

    match result {
        Err(err) => {
            if matches!(query, Query::InitWallet { .. }) {
                next.connection.status = ConnectionStatus::Disconnected;
            }
            next.error = Some(err.to_string());
        }
        Ok(QueryResult::WalletConnection(connection)) => apply_wallet_connection(&mut next, connection),
        Ok(QueryResult::AccountState(account)) => apply_account_state(&mut next, account),
        Ok(QueryResult::OutputQuote(quote)) => apply_quote(&mut next, &query, quote),
        Ok(QueryResult::MarketAddresses(market)) => apply_market_addresses(&mut next, market),
        Ok(QueryResult::Transaction(hash)) => {
            info!(%hash, kind = query.kind(), "Transaction confirmed by wallet");
            next.last_transaction = Some(hash);
            next.dialog = None;
            if next.account_refresh_pending() {
                debug!("Account refresh already pending");
            } else {
                next.enqueue(Query::FindAccountState {
                    update_eth_balance: true,
                });
            }

            if query.touches_market() {
                let ecosystem = next.ecosystem;
                let addresses = next.market().map(|market| market.addresses.clone()).unwrap_or_default();
                if !addresses.is_empty() {
                    next.enqueue(Query::FindMarketAddresses { ecosystem, addresses });
                }
            }
        }
    }

    if next == **state {
        Arc::clone(state)
    } else {
        Arc::new(next)
    }
}

/// Pick the ecosystem for the connected chain. An explicit choice on the
/// other layer is kept and flagged as a network mismatch instead.
fn apply_wallet_connection(state: &mut AppState, connection: WalletConnection) {
    let WalletConnection {
        method,
        chain_id,
        selected_address,
    } = connection;

    state.connection.status = ConnectionStatus::Connected;
    state.connection.method = Some(method);
    state.connection.chain_id = Some(chain_id);
    state.connection.selected_address = Some(selected_address);
    state.connection.expected_chain_id = None;

    let layer = Layer::from_chain_id(chain_id);
    let effective = match state.explicit_ecosystem {
        Some(explicit) if explicit.layer() != layer => {
            let expected = explicit.layer_config().chain_id;
            info!(chain_id, expected, "Wallet is on the wrong network");
            state.connection.expected_chain_id = Some(expected);
            return;
        }
        Some(explicit) => explicit,
        None if state.ecosystem.layer() == layer => state.ecosystem,
        None => layer.config().default_ecosystem,
    };

    if effective != state.ecosystem {
        debug!(?effective, "Switching ecosystem to match the wallet network");
        state.ecosystem = effective;
        state.balances = None;
        state.address_lock = None;
        state.address_details = None;
        state.address_token_details = None;
    }
    state.target_ecosystem = None;

    state.enqueue(Query::FindAccountState {
        update_eth_balance: true,
    });
}

fn apply_account_state(state: &mut AppState, account: AccountState) {
    if account.ecosystem != state.ecosystem {
        debug!(ecosystem = ?account.ecosystem, "Dropping account state for a previous ecosystem");
        return;
    }
    if account.address.is_some() && account.address != state.selected_address() {
        debug!("Dropping account state for a previous address");
        return;
    }

    let previous_eth = state.balances.as_ref().map(|balances| balances.eth);

    state.balances = account.balances.map(|mut balances| {
        if account.eth_balance.is_none() {
            balances.eth = previous_eth.unwrap_or_default();
        }
        balances
    });
    state.address_lock = account.address_lock;
    state.address_details = account.address_details;
    state.address_token_details = account.address_token_details;
}

/// Empty or stale quotes leave the displayed quote alone.
fn apply_quote(state: &mut AppState, query: &Query, quote: Option<SwapQuote>) {
    let Query::GetOutputQuote { throttle, .. } = query else {
        return;
    };
    if *throttle != state.swap.last_swap_throttle {
        return;
    }
    if let Some(quote) = quote {
        state.swap.quote = Some(quote);
    }
}

fn apply_market_addresses(state: &mut AppState, response: MarketAddresses) {
    let market = state.markets.entry(response.ecosystem).or_default();
    market.details.extend(response.details);
    if !response.block_number.is_zero() {
        market.block_number = Some(response.block_number);
    }
    market.last_refresh = Some(response.fetched_at);
}
