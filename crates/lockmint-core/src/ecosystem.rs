//! Ecosystem and layer capability tables.
//!
//! Everything that differs between ecosystems (token addresses, pool shapes,
//! market availability) or between layers (chain id, multicall address,
//! reference ETH/USD pool) is looked up here once, instead of being matched on
//! in every query executor.
//!
//! The built-in table only carries contracts with a known deployment. Pools
//! and markets missing from it are supplied at startup as a [`Deployments`]
//! map and merged in with [`EcosystemConfig::with_deployment`].

use std::collections::BTreeMap;

use alloy::primitives::{address, Address};
use serde::{Deserialize, Serialize};

/// Chain id of Ethereum mainnet.
pub const L1_CHAIN_ID: u64 = 1;

/// Chain id of Arbitrum One, the only supported L2.
pub const L2_CHAIN_ID: u64 = 42161;

/// Token amounts across all supported tokens use 18 decimals.
pub const TOKEN_DECIMALS: u8 = 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Layer {
    L1,
    L2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Ecosystem {
    /// Lock DAM on L1 to mint FLUX.
    Flux,
    /// Lock FLUX on Arbitrum to mint ArbiFLUX.
    ArbiFlux,
    /// Lock LOCK on Arbitrum; priced through its own reserve-pair pool.
    Lockquidity,
}

/// Shape of an on-chain pool used for price derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoolKind {
    /// Uniswap V3 pool, priced from `slot0().sqrtPriceX96`.
    UniswapV3,
    /// Constant-product pool exposing `getReserves()`.
    ReservePair,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    pub address: Address,
    pub kind: PoolKind,
    /// Whether the ecosystem token (as opposed to WETH) is `token0` of the pool.
    pub token_is_token0: bool,
    /// Swap fee in hundredths of a basis point (Uniswap V3 units, 3000 = 0.3%).
    pub fee: u32,
}

/// The USDC/WETH pool used to convert ETH prices into USD.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferencePoolConfig {
    pub address: Address,
    pub usdc_is_token0: bool,
    pub usdc_decimals: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerConfig {
    pub layer: Layer,
    pub chain_id: u64,
    pub multicall_address: Address,
    pub usdc_eth_pool: ReferencePoolConfig,
    /// Ecosystem selected when the user has not explicitly picked one.
    pub default_ecosystem: Ecosystem,
    /// Approximate number of blocks in one month, used for forecasts.
    pub blocks_per_month: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EcosystemConfig {
    pub ecosystem: Ecosystem,
    pub layer: Layer,
    pub lockable_token: Address,
    /// The mintable token is also the contract holding locks and performing mints.
    pub mintable_token: Address,
    pub lockable_pool: Option<PoolConfig>,
    pub mintable_pool: Option<PoolConfig>,
    pub market: Option<Address>,
    /// Lockable token is ERC-777 and the minting contract must be authorized as an operator.
    pub requires_operator: bool,
}

/// Contract addresses for one ecosystem that are not part of the built-in
/// table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Deployment {
    pub mintable_pool: Option<PoolConfig>,
    pub market: Option<Address>,
}

pub type Deployments = BTreeMap<Ecosystem, Deployment>;

const L1: LayerConfig = LayerConfig {
    layer: Layer::L1,
    chain_id: L1_CHAIN_ID,
    multicall_address: address!("eefba1e63905ef1d7acba5a8513c70307c1ce441"),
    usdc_eth_pool: ReferencePoolConfig {
        address: address!("88e6a0c2ddd26feeb64f039a2c41296fcb3f5640"),
        usdc_is_token0: true,
        usdc_decimals: 6,
    },
    default_ecosystem: Ecosystem::Flux,
    blocks_per_month: 30 * 24 * 60 * 60 / 12,
};

const L2: LayerConfig = LayerConfig {
    layer: Layer::L2,
    chain_id: L2_CHAIN_ID,
    multicall_address: address!("842ec2c7d803033edf55e478f461fc547bc54eb2"),
    usdc_eth_pool: ReferencePoolConfig {
        address: address!("c6962004f452be9203591991d15f6b388e09e8d0"),
        usdc_is_token0: false,
        usdc_decimals: 6,
    },
    default_ecosystem: Ecosystem::ArbiFlux,
    // Minting on Arbitrum is still measured in L1 block numbers.
    blocks_per_month: 30 * 24 * 60 * 60 / 12,
};

const FLUX: EcosystemConfig = EcosystemConfig {
    ecosystem: Ecosystem::Flux,
    layer: Layer::L1,
    lockable_token: address!("f80d589b3dbe130c270a69f1a69d050f268786df"),
    mintable_token: address!("469eda64aed3a3ad6f868c44564291aa415cb1d9"),
    lockable_pool: Some(PoolConfig {
        address: address!("bd233d685ede81e00faaefebd55150c76778a34e"),
        kind: PoolKind::UniswapV3,
        token_is_token0: true,
        fee: 10000,
    }),
    mintable_pool: Some(PoolConfig {
        address: address!("07aa6584385cca15c2c6e13a5599ffc2d177e33b"),
        kind: PoolKind::UniswapV3,
        token_is_token0: false,
        fee: 10000,
    }),
    market: None,
    requires_operator: true,
};

const ARBIFLUX: EcosystemConfig = EcosystemConfig {
    ecosystem: Ecosystem::ArbiFlux,
    layer: Layer::L2,
    lockable_token: address!("f80d589b3dbe130c270a69f1a69d050f268786df"),
    mintable_token: address!("64081252c497fcfec247a664e9d16f5d4a8ff17f"),
    lockable_pool: Some(PoolConfig {
        address: address!("088f6dcde862781db7585d28e4c4b6cbe3ad5a4b"),
        kind: PoolKind::UniswapV3,
        token_is_token0: false,
        fee: 3000,
    }),
    mintable_pool: None,
    market: None,
    requires_operator: true,
};

const LOCKQUIDITY: EcosystemConfig = EcosystemConfig {
    ecosystem: Ecosystem::Lockquidity,
    layer: Layer::L2,
    lockable_token: address!("454f676d44df315eef9b5425178d5a8b524cef81"),
    mintable_token: address!("454f676d44df315eef9b5425178d5a8b524cef81"),
    lockable_pool: None,
    mintable_pool: None,
    market: None,
    requires_operator: false,
};

impl EcosystemConfig {
    /// This config with the pool and market of `deployment` filled in.
    /// Built-in entries win over supplied ones.
    pub fn with_deployment(mut self, deployment: Option<&Deployment>) -> Self {
        if let Some(deployment) = deployment {
            self.mintable_pool = self.mintable_pool.or(deployment.mintable_pool);
            self.market = self.market.or(deployment.market);
        }
        self
    }
}

impl Layer {
    pub fn config(self) -> &'static LayerConfig {
        match self {
            Layer::L1 => &L1,
            Layer::L2 => &L2,
        }
    }

    /// Resolve the layer a wallet is connected to. Anything that is not the
    /// expected L2 chain is treated as L1.
    pub fn from_chain_id(chain_id: u64) -> Self {
        if chain_id == L2_CHAIN_ID {
            Layer::L2
        } else {
            Layer::L1
        }
    }
}

impl Ecosystem {
    pub const ALL: [Ecosystem; 3] = [Ecosystem::Flux, Ecosystem::ArbiFlux, Ecosystem::Lockquidity];

    pub fn config(self) -> &'static EcosystemConfig {
        match self {
            Ecosystem::Flux => &FLUX,
            Ecosystem::ArbiFlux => &ARBIFLUX,
            Ecosystem::Lockquidity => &LOCKQUIDITY,
        }
    }

    pub fn layer(self) -> Layer {
        self.config().layer
    }

    pub fn layer_config(self) -> &'static LayerConfig {
        self.layer().config()
    }
}

impl Default for Ecosystem {
    fn default() -> Self {
        Layer::L2.config().default_ecosystem
    }
}
