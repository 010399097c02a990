// Exact integer tick math (Q64.96) used for position sizing.
// ----------------------------------------------------------
// BigInt end-to-end so intermediate products never overflow; rounding mirrors the
// periphery contracts (two-step ceil for token0, single ceil for token1).
// Float previews live in `fixed_point`; anything that sizes a mint goes through here.

use num_bigint::BigInt;
use num_traits::{One, Zero};

pub const MIN_TICK: i32 = -887_272;
pub const MAX_TICK: i32 = 887_272;
pub const Q96_U128: u128 = 1u128 << 96;

#[inline]
pub fn q96() -> BigInt { BigInt::from(Q96_U128) }

#[inline]
pub fn ceil_div(a: &BigInt, b: &BigInt) -> BigInt {
    // assumes a>=0, b>0
    if a.is_zero() { return BigInt::zero(); }
    (a + (b - BigInt::one())) / b
}

#[inline]
fn sorted(a: &BigInt, b: &BigInt) -> (BigInt, BigInt) {
    if a < b { (a.clone(), b.clone()) } else { (b.clone(), a.clone()) }
}

/// Magic multipliers for bits 1..=19 of |tick|, Q128.128.
const RATIO_STEPS: [(u32, u128); 19] = [
    (0x2,     0xfff97272373d413259a46990580e213a),
    (0x4,     0xfff2e50f5f656932ef12357cf3c7fdcc),
    (0x8,     0xffe5caca7e10e4e61c3624eaa0941cd0),
    (0x10,    0xffcb9843d60f6159c9db58835c926644),
    (0x20,    0xff973b41fa98c081472e6896dfb254c0),
    (0x40,    0xff2ea16466c96a3843ec78b326b52861),
    (0x80,    0xfe5dee046a99a2a811c461f1969c3053),
    (0x100,   0xfcbe86c7900a88aedcffc83b479aa3a4),
    (0x200,   0xf987a7253ac413176f2b074cf7815e54),
    (0x400,   0xf3392b0822b70005940c7a398e4b70f3),
    (0x800,   0xe7159475a2c29b7443b29c7fa6e889d9),
    (0x1000,  0xd097f3bdfd2022b8845ad8f792aa5825),
    (0x2000,  0xa9f746462d870fdf8a65dc1f90e061e5),
    (0x4000,  0x70d869a156d2a1b890bb3df62baf32f7),
    (0x8000,  0x31be135f97d08fd981231505542fcfa6),
    (0x10000, 0x09aa508b5b7a84e1c677de54f3e99bc9),
    (0x20000, 0x005d6af8dedb81196699c329225ee604),
    (0x40000, 0x0002216e584f5fa1ea926041bedfe98),
    (0x80000, 0x00000048a170391f7dc42444e8fa2),
];

/// TickMath.getSqrtRatioAtTick. `None` outside `[MIN_TICK, MAX_TICK]`.
pub fn get_sqrt_ratio_at_tick(tick: i32) -> Option<BigInt> {
    if !(MIN_TICK..=MAX_TICK).contains(&tick) {
        return None;
    }
    let abs_tick = tick.unsigned_abs();

    let mut ratio = if abs_tick & 0x1 != 0 {
        BigInt::from(0xfffcb933bd6fad37aa2d162d1a594001u128)
    } else {
        BigInt::one() << 128
    };
    for (mask, factor) in RATIO_STEPS {
        if abs_tick & mask != 0 {
            ratio = (&ratio * BigInt::from(factor)) >> 128;
        }
    }

    if tick > 0 {
        let max = (BigInt::one() << 256) - 1;
        ratio = max / ratio;
    }
    // Q128.128 -> Q64.96, rounding up
    Some((&ratio + ((BigInt::one() << 32) - 1)) >> 32)
}

/// Greatest tick whose sqrt ratio is <= `sqrt_price_x96` (binary search).
pub fn get_tick_at_sqrt_ratio(sqrt_price_x96: &BigInt) -> i32 {
    let mut lo = MIN_TICK;
    let mut hi = MAX_TICK;
    while lo < hi {
        let mid = lo + ((hi - lo + 1) / 2);
        match get_sqrt_ratio_at_tick(mid) {
            Some(r) if r <= *sqrt_price_x96 => lo = mid,
            _ => hi = mid - 1,
        }
    }
    lo
}

/// amount0 = L * (sb - sa) / (sa * sb), in Q96 terms.
pub fn amount0_delta(sqrt_a: &BigInt, sqrt_b: &BigInt, liquidity: &BigInt, round_up: bool) -> BigInt {
    if liquidity.is_zero() { return BigInt::zero(); }
    let (sa, sb) = sorted(sqrt_a, sqrt_b);
    if sa.is_zero() || sa == sb { return BigInt::zero(); }

    let numerator1 = liquidity << 96;
    let numerator2 = &sb - &sa;

    if round_up {
        let t = ceil_div(&(&numerator1 * &numerator2), &sb);
        ceil_div(&t, &sa)
    } else {
        ((&numerator1 * &numerator2) / &sb) / &sa
    }
}

/// amount1 = L * (sb - sa) / Q96.
pub fn amount1_delta(sqrt_a: &BigInt, sqrt_b: &BigInt, liquidity: &BigInt, round_up: bool) -> BigInt {
    if liquidity.is_zero() { return BigInt::zero(); }
    let (sa, sb) = sorted(sqrt_a, sqrt_b);
    if sa == sb { return BigInt::zero(); }

    let num = liquidity * (sb - sa);
    if round_up { ceil_div(&num, &q96()) } else { num / q96() }
}

/// LiquidityAmounts.getLiquidityForAmount0, full precision:
/// L = amount0 * sa * sb / Q96 / (sb - sa)
pub fn liquidity_for_amount0(sqrt_a: &BigInt, sqrt_b: &BigInt, amount0: &BigInt) -> BigInt {
    let (sa, sb) = sorted(sqrt_a, sqrt_b);
    let denom = (&sb - &sa) * q96();
    if denom.is_zero() { return BigInt::zero(); }
    (amount0 * &sa * &sb) / denom
}

/// LiquidityAmounts.getLiquidityForAmount1: L = amount1 * Q96 / (sb - sa)
pub fn liquidity_for_amount1(sqrt_a: &BigInt, sqrt_b: &BigInt, amount1: &BigInt) -> BigInt {
    let (sa, sb) = sorted(sqrt_a, sqrt_b);
    let diff = &sb - &sa;
    if diff.is_zero() { return BigInt::zero(); }
    (amount1 * q96()) / diff
}
