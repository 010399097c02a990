// Position amounts: forward (liquidity -> token amounts, float preview) and
// inverse (one token amount -> the other, exact integer).

use ethers::types::{Address, U256};
use num_bigint::BigInt;
use num_traits::Zero;

use crate::math::fixed_point::{price_from_sqrt_x96, price_from_tick};
use crate::math::tick_math::{
    amount0_delta, amount1_delta, get_sqrt_ratio_at_tick, liquidity_for_amount0, liquidity_for_amount1, MAX_TICK,
    MIN_TICK,
};
use crate::math::units::{bigint_to_u256, from_raw_units, u256_to_bigint};
use crate::models::{PoolSnapshot, TickRange, TokenSide};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Max prices above this are shown as unbounded.
pub const UNBOUNDED_PRICE: f64 = 1e18;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PositionError {
    #[error("token {0:?} is not part of the pool")]
    TokenNotInPool(Address),
    #[error("invalid tick range [{tick_lower}, {tick_upper}]")]
    InvalidRange { tick_lower: i32, tick_upper: i32 },
    #[error("pool has no price yet")]
    UninitializedPool,
    #[error("removal percent must be within 1..=100, got {0}")]
    InvalidPercent(u8),
    #[error("amount does not fit in uint256")]
    Overflow,
}

/// Token amounts held by `liquidity` over `[lower_price, upper_price]` at `current_price`.
///
/// Prices are human token1-per-token0; `d = 10^(decimals0 - decimals1)` brings them back
/// to raw space. Both amounts are raw units, clamped at zero.
pub fn amounts_for_liquidity(
    liquidity: f64,
    current_price: f64,
    lower_price: f64,
    upper_price: f64,
    decimals0: u8,
    decimals1: u8,
) -> (f64, f64) {
    let d = 10f64.powi(decimals0 as i32 - decimals1 as i32);
    let sp = (current_price / d).sqrt();
    let sp_lower = (lower_price / d).sqrt();
    let sp_upper = (upper_price / d).sqrt();

    let amount0 = if sp <= sp_lower {
        liquidity * (sp_upper - sp_lower) / (sp_lower * sp_upper)
    } else {
        liquidity * (sp_upper - sp) / (sp * sp_upper)
    };
    let amount1 = if sp >= sp_upper {
        liquidity * (sp_upper - sp_lower)
    } else {
        liquidity * (sp - sp_lower)
    };

    (clamp_amount(amount0), clamp_amount(amount1))
}

#[inline]
fn clamp_amount(v: f64) -> f64 {
    if v.is_finite() && v > 0.0 { v } else { 0.0 }
}

fn range_sqrt_ratios(range: TickRange) -> Result<(BigInt, BigInt), PositionError> {
    let invalid = PositionError::InvalidRange { tick_lower: range.tick_lower, tick_upper: range.tick_upper };
    if range.tick_lower >= range.tick_upper || range.tick_lower < MIN_TICK || range.tick_upper > MAX_TICK {
        return Err(invalid);
    }
    let sa = get_sqrt_ratio_at_tick(range.tick_lower).ok_or_else(|| invalid.clone())?;
    let sb = get_sqrt_ratio_at_tick(range.tick_upper).ok_or(invalid)?;
    Ok((sa, sb))
}

/// Amount of the other pool token needed next to `known_amount` of `known_token`.
///
/// Liquidity is derived from the known side (full precision), then the other side is
/// the rounded-up delta at the current price, the same way a mint computes it. When the
/// known token has no exposure at the current price the answer is zero.
pub fn required_other_amount(
    pool: &PoolSnapshot,
    range: TickRange,
    known_token: Address,
    known_amount: U256,
) -> Result<U256, PositionError> {
    let side = pool.pair.side_of(known_token).ok_or(PositionError::TokenNotInPool(known_token))?;
    let (sa, sb) = range_sqrt_ratios(range)?;
    let sp = u256_to_bigint(pool.sqrt_price_x96);
    if sp.is_zero() {
        return Err(PositionError::UninitializedPool);
    }
    let amount = u256_to_bigint(known_amount);

    let other = match side {
        TokenSide::Token0 => {
            if sp >= sb {
                return Ok(U256::zero());
            }
            let lower = if sp > sa { sp.clone() } else { sa.clone() };
            let liquidity = liquidity_for_amount0(&lower, &sb, &amount);
            if sp <= sa { BigInt::zero() } else { amount1_delta(&sa, &sp, &liquidity, true) }
        }
        TokenSide::Token1 => {
            if sp <= sa {
                return Ok(U256::zero());
            }
            let upper = if sp < sb { sp.clone() } else { sb.clone() };
            let liquidity = liquidity_for_amount1(&sa, &upper, &amount);
            if sp >= sb { BigInt::zero() } else { amount0_delta(&sp, &sb, &liquidity, true) }
        }
    };

    log::debug!("required_other_amount: known {:?} {} -> other {}", side, known_amount, other);
    bigint_to_u256(&other).ok_or(PositionError::Overflow)
}

/// Liquidity to burn for a partial removal. 100% removes exactly everything.
pub fn liquidity_to_remove(liquidity: u128, percent: u8) -> Result<u128, PositionError> {
    match percent {
        100 => Ok(liquidity),
        1..=99 => {
            let p = percent as u128;
            Ok((liquidity / 100) * p + (liquidity % 100) * p / 100)
        }
        _ => Err(PositionError::InvalidPercent(percent)),
    }
}

// ------------------------------ Summaries ------------------------------------

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Position {
    pub pool: Address,
    pub range: TickRange,
    pub liquidity: u128,
    /// Uncollected fees, raw units.
    pub tokens_owed0: U256,
    pub tokens_owed1: U256,
}

/// Human-readable view of a position, oriented for the caller's quote token.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct PositionSummary {
    pub range: TickRange,
    pub liquidity: u128,
    pub amount0: f64,
    pub amount1: f64,
    pub min_price: f64,
    pub max_price: f64,
    pub current_price: f64,
    pub max_unbounded: bool,
    pub fees0: f64,
    pub fees1: f64,
}

impl PositionSummary {
    pub fn new(
        position: &Position,
        sqrt_price_x96: U256,
        decimals0: u8,
        decimals1: u8,
        token0_is_quote: bool,
    ) -> Self {
        let human = 10f64.powi(decimals0 as i32 - decimals1 as i32);
        let raw_current = price_from_sqrt_x96(sqrt_price_x96, false).unwrap_or(0.0);
        let current = raw_current * human;
        let lower = price_from_tick(position.range.tick_lower) * human;
        let upper = price_from_tick(position.range.tick_upper) * human;

        let (raw0, raw1) =
            amounts_for_liquidity(position.liquidity as f64, current, lower, upper, decimals0, decimals1);

        let (min_price, max_price, current_price) = if token0_is_quote {
            let inv = |p: f64| if p > 0.0 { 1.0 / p } else { 0.0 };
            (inv(upper), inv(lower), inv(current))
        } else {
            (lower, upper, current)
        };

        Self {
            range: position.range,
            liquidity: position.liquidity,
            amount0: raw0 / 10f64.powi(decimals0 as i32),
            amount1: raw1 / 10f64.powi(decimals1 as i32),
            min_price,
            max_price,
            current_price,
            max_unbounded: max_price > UNBOUNDED_PRICE,
            fees0: from_raw_units(position.tokens_owed0, decimals0),
            fees1: from_raw_units(position.tokens_owed1, decimals1),
        }
    }
}
