//! Command reducer: `(state, command) -> state`.
//!
//! Every transition clones the current state, patches the clone and returns
//! it as a new `Arc`. Transitions that change nothing hand back the same
//! `Arc`, so subscribers can skip work with a pointer comparison.

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::{
    ecosystem::{Ecosystem, Layer, TOKEN_DECIMALS},
    error::CommandError,
    numeric::{format_units, parse_units, sanitize_numeric_input},
    query::Query,
    state::{AppState, ClientSettings, ConnectionMethod, ConnectionStatus, Dialog, HelpArticle, SwapToken},
};

/// Minimum time between two unforced account refreshes.
pub const ACCOUNT_REFRESH_INTERVAL: Duration = Duration::seconds(10);

/// Lock amount a forecast starts from when the address has nothing locked.
pub const DEFAULT_FORECAST_LOCK_AMOUNT: &str = "1000";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Command {
    ConnectWallet {
        method: ConnectionMethod,
    },
    UpdateAddress {
        address: Option<Address>,
    },
    RefreshAccountState {
        #[serde(default)]
        force: bool,
        #[serde(default)]
        update_eth_balance: bool,
    },
    SetEcosystem {
        ecosystem: Ecosystem,
    },
    ToggleForecast,
    SetForecastLockAmount {
        amount: String,
    },
    SetForecastBlocks {
        blocks: u64,
    },
    SetForecastMultipliers {
        time_multiplier: u32,
        burn_multiplier: u32,
    },
    AuthorizeOperator,
    Lock {
        amount: String,
        /// Defaults to the selected address.
        #[serde(default)]
        minter_address: Option<Address>,
    },
    Unlock,
    Mint {
        #[serde(default)]
        target_address: Option<Address>,
        /// Defaults to the block of the last account refresh.
        #[serde(default)]
        target_block: Option<U256>,
    },
    Burn {
        amount: String,
        #[serde(default)]
        target_address: Option<Address>,
    },
    MarketDeposit {
        amount: String,
        rewards_percent: u64,
        min_block_number: u64,
        min_burn_amount: String,
    },
    MarketWithdraw,
    MarketBurnFromAddress {
        address_to_burn: Address,
        amount: String,
    },
    RefreshMarketAddresses {
        /// Newly discovered participants to add to the cached list.
        #[serde(default)]
        addresses: Vec<Address>,
    },
    Swap(SwapCommand),
    ShowDialog {
        dialog: Dialog,
    },
    CloseDialog,
    DismissPendingActions,
    SetClientSettings {
        settings: ClientSettings,
    },
    SetHelpArticle {
        id: Option<String>,
        #[serde(default)]
        article: Option<HelpArticle>,
    },
    SetHelpArticlesNetworkType {
        network_type: Layer,
    },
    ClearError,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum SwapCommand {
    SetAmount { amount: String },
    SetTokens { input: SwapToken, output: SwapToken },
    Flip,
}

pub fn reduce_command(state: &Arc<AppState>, command: Command) -> Arc<AppState> {
    reduce_command_at(state, command, Utc::now())
}

/// [`reduce_command`] with an explicit clock, used for refresh throttling.
pub fn reduce_command_at(state: &Arc<AppState>, command: Command, now: DateTime<Utc>) -> Arc<AppState> {
    match apply(state, command, now) {
        Ok(Some(next)) => Arc::new(next),
        Ok(None) => Arc::clone(state),
        Err(err) => {
            debug!(%err, "Command rejected");
            let mut next = AppState::clone(state);
            next.error = Some(err.to_string());
            Arc::new(next)
        }
    }
}

/// `Ok(None)` leaves the state untouched.
fn apply(state: &AppState, command: Command, now: DateTime<Utc>) -> Result<Option<AppState>, CommandError> {
    let mut next = state.clone();

    let changed = match command {
        Command::ConnectWallet { method } => {
            if next.connection.status == ConnectionStatus::Connecting
                || next.has_pending(|q| matches!(q, Query::InitWallet { .. }))
            {
                false
            } else {
                next.connection.status = ConnectionStatus::Connecting;
                next.connection.method = Some(method);
                next.enqueue(Query::InitWallet { method });
                true
            }
        }

        Command::UpdateAddress { address } => {
            next.address = address;
            next.forecast_settings.enabled = false;
            clear_account(&mut next);
            next.last_account_refresh = Some(now);
            next.enqueue(Query::FindAccountState {
                update_eth_balance: false,
            });
            true
        }

        Command::RefreshAccountState {
            force,
            update_eth_balance,
        } => refresh_account_state(&mut next, force, update_eth_balance, now),

        Command::SetEcosystem { ecosystem } => set_ecosystem(&mut next, ecosystem, now),

        Command::ToggleForecast => {
            toggle_forecast(&mut next)?;
            true
        }

        Command::SetForecastLockAmount { amount } => {
            let text = sanitize_numeric_input(&amount)?;
            if text == next.forecast_settings.lock_amount_text {
                false
            } else {
                next.forecast_settings.lock_amount = parse_amount_or_zero(&text)?;
                next.forecast_settings.lock_amount_text = text;
                true
            }
        }

        Command::SetForecastBlocks { blocks } => {
            let changed = next.forecast_settings.unminted_blocks != blocks;
            next.forecast_settings.unminted_blocks = blocks;
            changed
        }

        Command::SetForecastMultipliers {
            time_multiplier,
            burn_multiplier,
        } => {
            let forecast = &mut next.forecast_settings;
            let changed =
                forecast.time_multiplier != time_multiplier || forecast.burn_multiplier != burn_multiplier;
            forecast.time_multiplier = time_multiplier;
            forecast.burn_multiplier = burn_multiplier;
            changed
        }

        Command::AuthorizeOperator => {
            next.enqueue(Query::AuthorizeOperator);
            true
        }

        Command::Lock {
            amount,
            minter_address,
        } => {
            let amount = parse_units(&amount, TOKEN_DECIMALS)?;
            let minter_address = minter_address
                .or_else(|| next.selected_address())
                .ok_or(CommandError::NoSelectedAddress)?;
            let unauthorized = next
                .address_token_details
                .is_some_and(|details| !details.is_operator);
            if next.config().requires_operator && unauthorized {
                return Err(CommandError::OperatorNotAuthorized);
            }
            next.enqueue(Query::Lock {
                amount,
                minter_address,
            });
            true
        }

        Command::Unlock => {
            next.enqueue(Query::Unlock);
            true
        }

        Command::Mint {
            target_address,
            target_block,
        } => {
            let source_address = next.selected_address().ok_or(CommandError::NoSelectedAddress)?;
            let target_block = match target_block {
                Some(block) => block,
                None => {
                    next.address_details
                        .ok_or(CommandError::AccountNotLoaded)?
                        .block_number
                }
            };
            next.enqueue(Query::Mint {
                source_address,
                target_address: target_address.unwrap_or(source_address),
                target_block,
            });
            true
        }

        Command::Burn {
            amount,
            target_address,
        } => {
            let amount = parse_units(&amount, TOKEN_DECIMALS)?;
            let target_address = target_address
                .or_else(|| next.selected_address())
                .ok_or(CommandError::NoSelectedAddress)?;
            next.enqueue(Query::Burn {
                amount,
                target_address,
            });
            true
        }

        Command::MarketDeposit {
            amount,
            rewards_percent,
            min_block_number,
            min_burn_amount,
        } => {
            let amount = parse_units(&amount, TOKEN_DECIMALS)?;
            let min_burn_amount = parse_amount_or_zero(&sanitize_numeric_input(&min_burn_amount)?)?;
            next.enqueue(Query::MarketDeposit {
                amount,
                rewards_percent: U256::from(rewards_percent),
                min_block_number: U256::from(min_block_number),
                min_burn_amount,
            });
            true
        }

        Command::MarketWithdraw => {
            next.enqueue(Query::MarketWithdraw);
            true
        }

        Command::MarketBurnFromAddress {
            address_to_burn,
            amount,
        } => {
            let amount = parse_units(&amount, TOKEN_DECIMALS)?;
            next.enqueue(Query::MarketBurnFromAddress {
                address_to_burn,
                amount,
            });
            true
        }

        Command::RefreshMarketAddresses { addresses } => refresh_market_addresses(&mut next, addresses),

        Command::Swap(command) => reduce_swap(&mut next, command)?,

        Command::ShowDialog { dialog } => {
            let changed = next.dialog != Some(dialog);
            next.dialog = Some(dialog);
            changed
        }

        Command::CloseDialog => next.dialog.take().is_some(),

        Command::DismissPendingActions => {
            let count = next
                .pending_queries
                .iter()
                .filter(|pending| pending.query.is_transaction())
                .count();
            let changed = next.last_dismissed_pending_action_count != count;
            next.last_dismissed_pending_action_count = count;
            changed
        }

        Command::SetClientSettings { settings } => {
            if !settings.price_multiplier.is_finite() || settings.price_multiplier <= 0.0 {
                return Err(crate::numeric::InvalidNumber.into());
            }
            let changed = next.client_settings != settings;
            next.client_settings = settings;
            changed
        }

        Command::SetHelpArticle { id, article } => {
            let mut changed = next.help_articles.selected != id;
            next.help_articles.selected = id;
            if let Some(article) = article {
                changed |= next.help_articles.cache.get(&article.id) != Some(&article);
                next.help_articles.cache.insert(article.id.clone(), article);
            }
            changed
        }

        Command::SetHelpArticlesNetworkType { network_type } => {
            let changed = next.help_articles.network_type != network_type;
            next.help_articles.network_type = network_type;
            changed
        }

        Command::ClearError => next.error.take().is_some(),

        Command::Unknown => false,
    };

    Ok(changed.then_some(next))
}

fn parse_amount_or_zero(text: &str) -> Result<U256, CommandError> {
    if text.is_empty() {
        Ok(U256::ZERO)
    } else {
        Ok(parse_units(text, TOKEN_DECIMALS)?)
    }
}

fn clear_account(state: &mut AppState) {
    state.balances = None;
    state.address_lock = None;
    state.address_details = None;
    state.address_token_details = None;
}

/// Enqueue a `FindAccountState` unless one is already pending or the last
/// refresh is too recent. `force` and `update_eth_balance` skip the interval.
fn refresh_account_state(state: &mut AppState, force: bool, update_eth_balance: bool, now: DateTime<Utc>) -> bool {
    if state.account_refresh_pending() {
        debug!("Account refresh already pending");
        return false;
    }

    let throttled = state
        .last_account_refresh
        .is_some_and(|last| now - last < ACCOUNT_REFRESH_INTERVAL);
    if throttled && !force && !update_eth_balance {
        debug!("Account refresh throttled");
        return false;
    }

    state.last_account_refresh = Some(now);
    state.enqueue(Query::FindAccountState {
        update_eth_balance,
    });
    true
}

/// Switch ecosystems within a layer immediately. Crossing layers needs a
/// different wallet network, so the choice is only recorded until reload.
fn set_ecosystem(state: &mut AppState, ecosystem: Ecosystem, now: DateTime<Utc>) -> bool {
    if ecosystem == state.ecosystem {
        let changed = state.target_ecosystem.is_some() || state.explicit_ecosystem != Some(ecosystem);
        state.target_ecosystem = None;
        state.explicit_ecosystem = Some(ecosystem);
        return changed;
    }

    state.explicit_ecosystem = Some(ecosystem);

    if ecosystem.layer() != state.ecosystem.layer() {
        debug!(?ecosystem, "Ecosystem on another layer, deferring until reload");
        state.target_ecosystem = Some(ecosystem);
        return true;
    }

    state.ecosystem = ecosystem;
    state.target_ecosystem = None;
    state.forecast_settings.enabled = false;
    state.swap.quote = None;
    state.swap.last_swap_throttle += 1;
    clear_account(state);

    state.last_account_refresh = Some(now);
    state.enqueue(Query::FindAccountState {
        update_eth_balance: true,
    });

    let addresses = state.market().map(|market| market.addresses.clone()).unwrap_or_default();
    if !addresses.is_empty() {
        state.enqueue(Query::FindMarketAddresses { ecosystem, addresses });
    }

    true
}

/// Seed the forecast from the address's lock, or from defaults when there
/// is nothing locked.
fn toggle_forecast(state: &mut AppState) -> Result<(), CommandError> {
    if state.forecast_settings.enabled {
        state.forecast_settings.enabled = false;
        return Ok(());
    }

    let blocks_per_month = state.ecosystem.layer_config().blocks_per_month;
    let lock = state.address_lock.unwrap_or_default();
    let forecast = &mut state.forecast_settings;
    forecast.enabled = true;

    if lock.amount.is_zero() {
        forecast.lock_amount = parse_units(DEFAULT_FORECAST_LOCK_AMOUNT, TOKEN_DECIMALS)?;
        forecast.lock_amount_text = DEFAULT_FORECAST_LOCK_AMOUNT.to_owned();
        forecast.unminted_blocks = blocks_per_month;
        return Ok(());
    }

    forecast.lock_amount = lock.amount;
    forecast.lock_amount_text = format_units(lock.amount, TOKEN_DECIMALS)?;
    forecast.unminted_blocks = match state.address_details {
        Some(details) => {
            let unminted = details.block_number.saturating_sub(lock.last_mint_block_number);
            u64::try_from(unminted).unwrap_or(blocks_per_month)
        }
        None => blocks_per_month,
    };
    if let Some(details) = state.address_details {
        forecast.time_multiplier = u32::try_from(details.time_multiplier).unwrap_or(forecast.time_multiplier);
        forecast.burn_multiplier = u32::try_from(details.burn_multiplier).unwrap_or(forecast.burn_multiplier);
    }

    Ok(())
}

fn refresh_market_addresses(state: &mut AppState, addresses: Vec<Address>) -> bool {
    let ecosystem = state.ecosystem;
    if state.config().market.is_none() {
        return false;
    }

    let market = state.markets.entry(ecosystem).or_default();
    for address in addresses {
        if !market.addresses.contains(&address) {
            market.addresses.push(address);
        }
    }
    if market.addresses.is_empty() {
        return false;
    }
    let addresses = market.addresses.clone();

    if state.has_pending(|q| matches!(q, Query::FindMarketAddresses { ecosystem: e, .. } if *e == ecosystem)) {
        // The pending lookup may predate new addresses; they are cached and
        // picked up by the next refresh.
        return false;
    }

    state.enqueue(Query::FindMarketAddresses { ecosystem, addresses });
    true
}

fn reduce_swap(state: &mut AppState, command: SwapCommand) -> Result<bool, CommandError> {
    let swap = &mut state.swap;

    match command {
        SwapCommand::SetAmount { amount } => {
            if amount == swap.input_amount {
                return Ok(false);
            }
            let amount = sanitize_numeric_input(&amount)?;
            if amount == swap.input_amount {
                return Ok(false);
            }
            swap.input_amount = amount;
        }
        SwapCommand::SetTokens { input, output } => {
            if (input, output) == (swap.input_token, swap.output_token) {
                return Ok(false);
            }
            swap.input_token = input;
            swap.output_token = output;
        }
        SwapCommand::Flip => {
            std::mem::swap(&mut swap.input_token, &mut swap.output_token);
        }
    }

    swap.quote = None;
    swap.last_swap_throttle += 1;

    let amount = parse_amount_or_zero(&swap.input_amount)?;
    if !amount.is_zero() && swap.input_token != swap.output_token {
        let query = Query::GetOutputQuote {
            input_token: swap.input_token,
            output_token: swap.output_token,
            amount,
            throttle: swap.last_swap_throttle,
        };
        state.enqueue(query);
    }

    Ok(true)
}
