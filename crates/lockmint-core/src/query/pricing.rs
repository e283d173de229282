//! Pool reads and price derivations.
//!
//! Uniswap V3 pools are priced from `sqrtPriceX96` (price = sqrtP² / 2¹⁹²),
//! reserve-pair pools from the raw reserve ratio. Both give `token1` per
//! `token0` in raw units.

use alloy::{
    dyn_abi::DynSolValue,
    primitives::{Address, U256},
};

use crate::{
    ecosystem::{PoolConfig, PoolKind, ReferencePoolConfig, TOKEN_DECIMALS},
    error::CodecError,
    multicall::{uint_at, MultiCallParams, Returns},
    numeric::to_f64,
    state::PoolSnapshot,
};

const FEE_DENOMINATOR: u32 = 1_000_000;

/// Read call for a pool's price state.
pub fn pool_call<T: 'static>(
    address: Address,
    kind: PoolKind,
    name: &'static str,
    wrap: fn(PoolSnapshot) -> T,
) -> Result<MultiCallParams<T>, CodecError> {
    match kind {
        PoolKind::UniswapV3 => MultiCallParams::new(
            address,
            "slot0()",
            vec![],
            Returns::new(
                &["uint160", "int24", "uint16", "uint16", "uint16", "uint8", "bool"],
                move |values: &[DynSolValue]| {
                    Ok(wrap(PoolSnapshot::UniswapV3 {
                        sqrt_price_x96: uint_at(values, 0, name)?,
                    }))
                },
            )?,
        ),
        PoolKind::ReservePair => MultiCallParams::new(
            address,
            "getReserves()",
            vec![],
            Returns::new(&["uint112", "uint112", "uint32"], move |values: &[DynSolValue]| {
                Ok(wrap(PoolSnapshot::ReservePair {
                    reserve0: uint_at(values, 0, name)?,
                    reserve1: uint_at(values, 1, name)?,
                }))
            })?,
        ),
    }
}

/// Raw `token1` per `token0` price.
pub fn raw_price(snapshot: &PoolSnapshot) -> f64 {
    match snapshot {
        PoolSnapshot::UniswapV3 { sqrt_price_x96 } => {
            let sqrt = to_f64(*sqrt_price_x96, 0) / 2f64.powi(96);
            sqrt * sqrt
        }
        PoolSnapshot::ReservePair { reserve0, reserve1 } => {
            let reserve0 = to_f64(*reserve0, 0);
            if reserve0 == 0.0 {
                return 0.0;
            }
            to_f64(*reserve1, 0) / reserve0
        }
    }
}

/// ETH per ecosystem token. Both sides use 18 decimals.
pub fn token_price_eth(snapshot: &PoolSnapshot, pool: &PoolConfig) -> f64 {
    let price = raw_price(snapshot);
    if pool.token_is_token0 {
        price
    } else if price == 0.0 {
        0.0
    } else {
        1.0 / price
    }
}

/// USD per ETH from the USDC/WETH reference pool.
pub fn eth_price_usd(snapshot: &PoolSnapshot, reference: &ReferencePoolConfig) -> f64 {
    let (decimals0, decimals1) = if reference.usdc_is_token0 {
        (reference.usdc_decimals, TOKEN_DECIMALS)
    } else {
        (TOKEN_DECIMALS, reference.usdc_decimals)
    };
    let price = raw_price(snapshot) * 10f64.powi(decimals0 as i32 - decimals1 as i32);

    if !reference.usdc_is_token0 {
        price
    } else if price == 0.0 {
        0.0
    } else {
        1.0 / price
    }
}

/// Constant-product output for `amount_in`, after the pool fee. `None` when
/// the intermediate products do not fit in 256 bits.
pub fn reserve_output(reserve_in: U256, reserve_out: U256, amount_in: U256, fee: u32) -> Option<U256> {
    if reserve_in.is_zero() || reserve_out.is_zero() || amount_in.is_zero() {
        return Some(U256::ZERO);
    }

    let amount_in_with_fee =
        amount_in.checked_mul(U256::from(FEE_DENOMINATOR - fee.min(FEE_DENOMINATOR)))?;
    let numerator = reserve_out.checked_mul(amount_in_with_fee)?;
    let denominator = reserve_in
        .checked_mul(U256::from(FEE_DENOMINATOR))?
        .checked_add(amount_in_with_fee)?;

    Some(numerator / denominator)
}

/// `amount_in` converted at the reserve ratio, without fee or slippage.
pub fn reserve_spot_output(reserve_in: U256, reserve_out: U256, amount_in: U256) -> Option<U256> {
    if reserve_in.is_zero() {
        return Some(U256::ZERO);
    }
    Some(amount_in.checked_mul(reserve_out)? / reserve_in)
}

/// Output estimate at spot price minus the pool fee. Used for Uniswap V3
/// pools, where the exact output would require walking ticks. `None` when
/// the estimate exceeds 256 bits.
pub fn spot_output(amount_in: U256, price: f64, fee: u32) -> Option<U256> {
    let fee_factor = 1.0 - fee.min(FEE_DENOMINATOR) as f64 / FEE_DENOMINATOR as f64;
    let out = to_f64(amount_in, 0) * price * fee_factor;

    if out.is_nan() || out <= 0.0 {
        return Some(U256::ZERO);
    }
    U256::try_from(out).ok()
}

/// Percentage by which `actual` falls short of `ideal`.
pub fn price_impact(ideal: U256, actual: U256) -> f64 {
    let ideal = to_f64(ideal, 0);
    if ideal == 0.0 {
        return 0.0;
    }
    ((ideal - to_f64(actual, 0)) / ideal * 100.0).max(0.0)
}
