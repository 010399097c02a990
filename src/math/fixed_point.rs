use ethers::types::U256;
use num_bigint::BigInt;
use num_integer::Roots;
use num_traits::{ToPrimitive, Zero};

use crate::math::units::{bigint_to_u256, u256_to_bigint};

const Q96_F64: f64 = 79_228_162_514_264_337_593_543_950_336.0; // 2^96

/// sqrtPriceX96 as a plain float (s / 2^96).
pub fn sqrt_x96_to_f64(sqrt_price_x96: U256) -> f64 {
    u256_to_bigint(sqrt_price_x96).to_f64().unwrap_or(0.0) / Q96_F64
}

/// Human-facing price from a Q64.96 sqrt price.
///
/// The raw price is token1 per token0. With `token0_is_quote` the result is the
/// reciprocal (token0 per token1). `Some(0.0)` means there is no pool; `None`
/// means the price is undefined (non-finite).
pub fn price_from_sqrt_x96(sqrt_price_x96: U256, token0_is_quote: bool) -> Option<f64> {
    let s = sqrt_x96_to_f64(sqrt_price_x96);
    let raw = s * s;
    if raw == 0.0 {
        return Some(0.0);
    }
    let price = if token0_is_quote { 1.0 / raw } else { raw };
    price.is_finite().then_some(price)
}

/// 1.0001^tick, token1 per token0 in raw units.
pub fn price_from_tick(tick: i32) -> f64 {
    1.0001f64.powi(tick)
}

/// sqrt(amount1 / amount0) * 2^96, computed with integer square root.
/// Used to initialise a freshly created pool at a given reserve ratio.
pub fn encode_sqrt_ratio_x96(amount1: U256, amount0: U256) -> Option<U256> {
    let a0 = u256_to_bigint(amount0);
    if a0.is_zero() {
        return None;
    }
    let ratio_x192: BigInt = (u256_to_bigint(amount1) << 192usize) / a0;
    bigint_to_u256(&Roots::sqrt(&ratio_x192))
}
