//! Application state tree and the on-chain value objects it holds.

use std::collections::BTreeMap;

use alloy::primitives::{Address, TxHash, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    ecosystem::{Deployments, Ecosystem, EcosystemConfig, Layer},
    query::{PendingQuery, Query},
};

/// The single immutable state value. Reducers never mutate a published
/// `AppState`; they clone it, patch the clone and publish the new value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppState {
    /// Ecosystem the dashboard is currently showing.
    pub ecosystem: Ecosystem,
    /// Ecosystem the user picked explicitly, if any.
    pub explicit_ecosystem: Option<Ecosystem>,
    /// Cross-layer switch waiting for a page reload.
    pub target_ecosystem: Option<Ecosystem>,
    pub connection: Connection,
    /// Address override; takes precedence over the wallet address.
    pub address: Option<Address>,
    pub balances: Option<Balances>,
    pub address_lock: Option<AddressLock>,
    pub address_details: Option<AddressDetails>,
    pub address_token_details: Option<AddressTokenDetails>,
    pub pending_queries: Vec<PendingQuery>,
    pub next_query_id: u64,
    pub last_dismissed_pending_action_count: usize,
    pub dialog: Option<Dialog>,
    pub forecast_settings: ForecastSettings,
    pub markets: BTreeMap<Ecosystem, MarketState>,
    pub client_settings: ClientSettings,
    pub help_articles: HelpArticlesState,
    pub swap: SwapState,
    pub last_account_refresh: Option<DateTime<Utc>>,
    pub last_transaction: Option<TxHash>,
    pub error: Option<String>,
    /// Contract addresses supplied at startup; fixed for the process lifetime.
    #[serde(skip)]
    pub deployments: Deployments,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            ecosystem: Ecosystem::default(),
            explicit_ecosystem: None,
            target_ecosystem: None,
            connection: Connection::default(),
            address: None,
            balances: None,
            address_lock: None,
            address_details: None,
            address_token_details: None,
            pending_queries: Vec::new(),
            next_query_id: 1,
            last_dismissed_pending_action_count: 0,
            dialog: None,
            forecast_settings: ForecastSettings::default(),
            markets: BTreeMap::new(),
            client_settings: ClientSettings::default(),
            help_articles: HelpArticlesState::default(),
            swap: SwapState::default(),
            last_account_refresh: None,
            last_transaction: None,
            error: None,
            deployments: Deployments::new(),
        }
    }
}

impl AppState {
    /// Bootstrap state from persisted client settings and an optional
    /// ecosystem the user chose before a reload.
    pub fn new(settings: PersistedSettings, ecosystem: Option<Ecosystem>) -> Self {
        let markets = settings
            .market_addresses
            .into_iter()
            .map(|(ecosystem, addresses)| {
                (
                    ecosystem,
                    MarketState {
                        addresses,
                        ..MarketState::default()
                    },
                )
            })
            .collect();

        Self {
            ecosystem: ecosystem.unwrap_or_default(),
            explicit_ecosystem: ecosystem,
            markets,
            client_settings: settings.client_settings,
            help_articles: HelpArticlesState {
                network_type: settings.help_network_type,
                ..HelpArticlesState::default()
            },
            ..Self::default()
        }
    }

    /// Fresh state for a reload into `ecosystem`, keeping persisted settings.
    /// Query ids keep counting so late responses from before the reload
    /// cannot match new pending queries.
    pub fn reloaded(&self, ecosystem: Ecosystem) -> Self {
        Self {
            next_query_id: self.next_query_id,
            deployments: self.deployments.clone(),
            ..Self::new(self.persisted_settings(), Some(ecosystem))
        }
    }

    pub fn with_deployments(self, deployments: Deployments) -> Self {
        Self { deployments, ..self }
    }

    /// Capability table entry for the current ecosystem.
    pub fn config(&self) -> EcosystemConfig {
        self.config_for(self.ecosystem)
    }

    pub fn config_for(&self, ecosystem: Ecosystem) -> EcosystemConfig {
        ecosystem
            .config()
            .with_deployment(self.deployments.get(&ecosystem))
    }

    /// Address queries run against: the override, else the wallet address.
    pub fn selected_address(&self) -> Option<Address> {
        self.address.or(self.connection.selected_address)
    }

    pub fn has_pending(&self, predicate: impl Fn(&Query) -> bool) -> bool {
        self.pending_queries.iter().any(|pending| predicate(&pending.query))
    }

    pub fn account_refresh_pending(&self) -> bool {
        self.has_pending(|query| matches!(query, Query::FindAccountState { .. }))
    }

    pub fn market(&self) -> Option<&MarketState> {
        self.markets.get(&self.ecosystem)
    }

    /// Append a query with a fresh id; ids are never reused.
    pub(crate) fn enqueue(&mut self, query: Query) {
        let id = self.next_query_id;
        self.next_query_id += 1;
        self.pending_queries.push(PendingQuery { id, query });
    }

    /// Subset of the state that survives a restart.
    pub fn persisted_settings(&self) -> PersistedSettings {
        PersistedSettings {
            client_settings: self.client_settings.clone(),
            market_addresses: self
                .markets
                .iter()
                .filter(|(_, market)| !market.addresses.is_empty())
                .map(|(ecosystem, market)| (*ecosystem, market.addresses.clone()))
                .collect(),
            help_network_type: self.help_articles.network_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedSettings {
    pub client_settings: ClientSettings,
    pub market_addresses: BTreeMap<Ecosystem, Vec<Address>>,
    pub help_network_type: Layer,
}

impl Default for PersistedSettings {
    fn default() -> Self {
        Self {
            client_settings: ClientSettings::default(),
            market_addresses: BTreeMap::new(),
            help_network_type: Layer::L2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionMethod {
    Injected,
    WalletConnect,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Connection {
    pub status: ConnectionStatus,
    pub method: Option<ConnectionMethod>,
    pub chain_id: Option<u64>,
    pub selected_address: Option<Address>,
    /// Chain the wallet should switch to when the explicitly chosen ecosystem
    /// lives on another layer.
    pub expected_chain_id: Option<u64>,
}

/// Current state of a pool used for pricing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PoolSnapshot {
    UniswapV3 { sqrt_price_x96: U256 },
    ReservePair { reserve0: U256, reserve1: U256 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Balances {
    pub eth: U256,
    pub lockable: U256,
    pub mintable: U256,
    pub lockable_pool: Option<PoolSnapshot>,
    pub mintable_pool: Option<PoolSnapshot>,
    /// ETH per lockable token.
    pub lockable_price_eth: f64,
    /// ETH per mintable token.
    pub mintable_price_eth: f64,
    pub eth_price_usd: f64,
    pub lockable_price_usd: f64,
    pub mintable_price_usd: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct AddressLock {
    pub amount: U256,
    pub block_number: U256,
    pub burned_amount: U256,
    pub last_mint_block_number: U256,
    pub minter_address: Address,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct AddressDetails {
    pub block_number: U256,
    pub mintable_balance: U256,
    pub mint_amount: U256,
    /// 10000 = 1x
    pub time_multiplier: U256,
    /// 10000 = 1x
    pub burn_multiplier: U256,
    pub global_burned_amount: U256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct AddressTokenDetails {
    pub block_number: U256,
    /// The minting contract may move the lockable token on the address's behalf.
    pub is_operator: bool,
    pub lockable_balance: U256,
    pub global_locked: U256,
    pub global_burned: U256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dialog {
    Lock,
    Unlock,
    Mint,
    Burn,
    MarketDeposit,
    MarketWithdraw,
    Swap,
    Settings,
    Help,
}

/// Multiplier scale used by the minting contracts and forecasts.
pub const MULTIPLIER_BASE: u32 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForecastSettings {
    pub enabled: bool,
    pub lock_amount: U256,
    pub lock_amount_text: String,
    pub unminted_blocks: u64,
    pub time_multiplier: u32,
    pub burn_multiplier: u32,
}

impl Default for ForecastSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            lock_amount: U256::ZERO,
            lock_amount_text: String::new(),
            unminted_blocks: 0,
            time_multiplier: MULTIPLIER_BASE,
            burn_multiplier: MULTIPLIER_BASE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MarketAddressDetails {
    pub rewards_amount: U256,
    pub rewards_percent: U256,
    pub min_block_number: U256,
    pub min_burn_amount: U256,
    pub is_paused: bool,
    pub lock: AddressLock,
    pub mint_amount: U256,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MarketState {
    /// Addresses known to participate in the market, cached across restarts.
    pub addresses: Vec<Address>,
    pub details: BTreeMap<Address, MarketAddressDetails>,
    pub block_number: Option<U256>,
    pub last_refresh: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Currency {
    #[default]
    Usd,
    Eur,
    Gbp,
    Cad,
    Aud,
    Jpy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    pub currency: Currency,
    pub use_eip1559: bool,
    /// Applied to the node's gas price for legacy transactions.
    pub price_multiplier: f64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            currency: Currency::Usd,
            use_eip1559: true,
            price_multiplier: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelpArticle {
    pub id: String,
    pub title: String,
    pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HelpArticlesState {
    pub network_type: Layer,
    pub selected: Option<String>,
    pub cache: BTreeMap<String, HelpArticle>,
}

impl Default for HelpArticlesState {
    fn default() -> Self {
        Self {
            network_type: Layer::L2,
            selected: None,
            cache: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwapToken {
    Eth,
    Lockable,
    Mintable,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SwapQuote {
    pub input_amount: U256,
    pub output_amount: U256,
    /// Percentage the execution price is worse than the spot price.
    pub price_impact: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwapState {
    pub input_token: SwapToken,
    pub output_token: SwapToken,
    pub input_amount: String,
    pub quote: Option<SwapQuote>,
    /// Bumped on every amount/token change; quotes carrying an older stamp are stale.
    pub last_swap_throttle: u64,
}

impl Default for SwapState {
    fn default() -> Self {
        Self {
            input_token: SwapToken::Eth,
            output_token: SwapToken::Mintable,
            input_amount: String::new(),
            quote: None,
            last_swap_throttle: 0,
        }
    }
}
