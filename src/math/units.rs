use ethers::types::U256;
use num_bigint::{BigInt, Sign};
use num_traits::ToPrimitive;

pub fn u256_to_bigint(u: U256) -> BigInt {
    let mut buf = [0u8; 32];
    u.to_big_endian(&mut buf);
    BigInt::from_bytes_be(Sign::Plus, &buf)
}

/// `None` for negative values or anything wider than 256 bits.
pub fn bigint_to_u256(v: &BigInt) -> Option<U256> {
    let (sign, bytes) = v.to_bytes_be();
    match sign {
        Sign::Minus => None,
        Sign::NoSign => Some(U256::zero()),
        Sign::Plus if bytes.len() > 32 => None,
        Sign::Plus => Some(U256::from_big_endian(&bytes)),
    }
}

/// Human amount -> token smallest units, saturating.
/// Negative, NaN or non-finite input gives zero; rounds to the nearest unit.
pub fn to_raw_units(amount: f64, decimals: u8) -> U256 {
    if !amount.is_finite() || amount <= 0.0 {
        return U256::zero();
    }
    let scaled = (amount * 10f64.powi(decimals as i32)).round();
    if !scaled.is_finite() || scaled <= 0.0 {
        return U256::zero();
    }
    let max_u128_f64 = (u128::MAX as f64).floor();
    let clamped = if scaled > max_u128_f64 { max_u128_f64 } else { scaled };
    U256::from(clamped as u128)
}

/// Token smallest units -> human amount.
pub fn from_raw_units(raw: U256, decimals: u8) -> f64 {
    let v = u256_to_bigint(raw).to_f64().unwrap_or(0.0);
    v / 10f64.powi(decimals as i32)
}

/// Raw in-per-out rate -> human rate, given each token's decimals.
pub fn scale_rate(raw_in_per_out: f64, dec_in: u8, dec_out: u8) -> f64 {
    raw_in_per_out * 10f64.powi(dec_out as i32 - dec_in as i32)
}
