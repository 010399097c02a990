use ethers::types::{Address, U256};
use futures::future::join_all;

use crate::chain::{ChainError, ChainStateProvider};
use crate::math::units::{from_raw_units, scale_rate};
use crate::models::{Derived, FeeTier, PoolSnapshot};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Below this a pool is treated as empty. Compared against human-unit TVL regardless of decimals.
pub const DUST_TVL_THRESHOLD: f64 = 1e-9;

/// Value locked in output-token terms: `reserve_in / price + reserve_out`,
/// with `price` as input per output. A zero or non-finite price counts as no pool.
pub fn tvl_from_reserves(reserve_in: f64, reserve_out: f64, price_in_per_out: f64) -> f64 {
    if !(price_in_per_out.is_finite() && price_in_per_out > 0.0) {
        return 0.0;
    }
    reserve_in / price_in_per_out + reserve_out
}

pub fn is_dust(tvl: f64, threshold: f64) -> bool {
    !(tvl >= threshold)
}

/// Human exchange rate (input per output) of a pool snapshot.
pub fn exchange_rate(pool: &PoolSnapshot, dec_in: u8, dec_out: u8) -> Option<f64> {
    pool.price_in_per_out().map(|raw| scale_rate(raw, dec_in, dec_out))
}

pub fn tvl(pool: &PoolSnapshot, reserve_in_raw: U256, reserve_out_raw: U256, dec_in: u8, dec_out: u8) -> f64 {
    let price = exchange_rate(pool, dec_in, dec_out).unwrap_or(0.0);
    tvl_from_reserves(from_raw_units(reserve_in_raw, dec_in), from_raw_units(reserve_out_raw, dec_out), price)
}

/// Snapshot plus TVL for an existing pool.
pub async fn load_pool_tvl<P: ChainStateProvider>(
    provider: &P,
    pool: Address,
    fee_tier: FeeTier,
    token_in: Address,
    token_out: Address,
    dec_in: u8,
    dec_out: u8,
) -> Result<(PoolSnapshot, f64), ChainError> {
    let (state, reserve_in, reserve_out) = tokio::try_join!(
        provider.get_pool_state(pool),
        provider.get_token_reserve(token_in, pool),
        provider.get_token_reserve(token_out, pool),
    )?;
    let snapshot = PoolSnapshot::from_state(pool, fee_tier, token_in, token_out, state);
    let value = tvl(&snapshot, reserve_in, reserve_out, dec_in, dec_out);
    log::debug!("pool {:?} fee {}: tvl {}", pool, fee_tier, value);
    Ok((snapshot, value))
}

// ----------------------------- Tier overview ---------------------------------

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct TierTvl {
    pub fee_tier: FeeTier,
    pub pool: Derived<Address>,
    pub tvl: Derived<f64>,
    pub exchange_rate: Derived<f64>,
}

impl TierTvl {
    fn unavailable(fee_tier: FeeTier, reason: &str) -> Self {
        Self {
            fee_tier,
            pool: Derived::unavailable(reason),
            tvl: Derived::unavailable(reason),
            exchange_rate: Derived::unavailable(reason),
        }
    }
}

async fn tier_entry<P: ChainStateProvider>(
    provider: &P,
    token_a: Address,
    token_b: Address,
    fee_tier: FeeTier,
    dec_a: u8,
    dec_b: u8,
    threshold: f64,
) -> TierTvl {
    let pool = match provider.get_pool_address(token_a, token_b, fee_tier).await {
        Ok(p) => p,
        Err(e) => {
            log::warn!("tier {}: pool lookup failed: {}", fee_tier, e);
            return TierTvl::unavailable(fee_tier, &e.to_string());
        }
    };
    if pool.is_zero() {
        return TierTvl {
            fee_tier,
            pool: Derived::Ready(pool),
            tvl: Derived::Ready(0.0),
            exchange_rate: Derived::Ready(0.0),
        };
    }
    match load_pool_tvl(provider, pool, fee_tier, token_a, token_b, dec_a, dec_b).await {
        Ok((snapshot, value)) => TierTvl {
            fee_tier,
            pool: Derived::Ready(pool),
            tvl: Derived::Ready(if is_dust(value, threshold) { 0.0 } else { value }),
            exchange_rate: exchange_rate(&snapshot, dec_a, dec_b)
                .map(Derived::Ready)
                .unwrap_or_else(|| Derived::unavailable("price undefined")),
        },
        Err(e) => {
            log::warn!("tier {}: pool {:?} unreadable: {}", fee_tier, pool, e);
            TierTvl { pool: Derived::Ready(pool), ..TierTvl::unavailable(fee_tier, &e.to_string()) }
        }
    }
}

/// TVL and exchange rate for every fee tier of `(token_a, token_b)`, in `token_b` terms.
/// A failing tier degrades on its own.
pub async fn tier_overview<P: ChainStateProvider>(
    provider: &P,
    token_a: Address,
    token_b: Address,
    threshold: f64,
) -> Vec<TierTvl> {
    let decimals = tokio::try_join!(provider.get_token_decimals(token_a), provider.get_token_decimals(token_b));
    let (dec_a, dec_b) = match decimals {
        Ok(d) => d,
        Err(e) => {
            log::warn!("tier overview: decimals unavailable: {}", e);
            let reason = e.to_string();
            return FeeTier::ALL.iter().map(|t| TierTvl::unavailable(*t, &reason)).collect();
        }
    };

    join_all(
        FeeTier::ALL
            .iter()
            .map(|tier| tier_entry(provider, token_a, token_b, *tier, dec_a, dec_b, threshold)),
    )
    .await
}

/// Deepest non-dust tier; the 1% tier when every tier is empty or unreadable.
pub fn default_tier(overview: &[TierTvl], threshold: f64) -> FeeTier {
    overview
        .iter()
        .filter_map(|t| t.tvl.ready().map(|v| (t.fee_tier, *v)))
        .filter(|(_, v)| !is_dust(*v, threshold))
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(tier, _)| tier)
        .unwrap_or(FeeTier::High)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::memory::InMemoryChain;
    use crate::math::tick_math::Q96_U128;
    use crate::models::OrderedPair;

    fn addr(x: u8) -> Address { Address::from([x; 20]) }

    #[test]
    fn test_tvl_from_reserves_example() {
        assert_eq!(tvl_from_reserves(100.0, 100.0, 1.0), 200.0);
        assert_eq!(tvl_from_reserves(100.0, 50.0, 2.0), 100.0);
        assert_eq!(tvl_from_reserves(100.0, 100.0, 0.0), 0.0);
        assert_eq!(tvl_from_reserves(100.0, 100.0, f64::INFINITY), 0.0);
    }

    #[test]
    fn test_is_dust() {
        assert!(is_dust(0.0, DUST_TVL_THRESHOLD));
        assert!(is_dust(1e-10, DUST_TVL_THRESHOLD));
        assert!(is_dust(f64::NAN, DUST_TVL_THRESHOLD));
        assert!(!is_dust(1e-9, DUST_TVL_THRESHOLD));
        assert!(!is_dust(5.0, DUST_TVL_THRESHOLD));
    }

    #[test]
    fn test_tvl_with_decimals() {
        // 6-dec input, 18-dec output, raw price 1e-12 in per out == human 1:1
        let pool = PoolSnapshot {
            address: addr(0xaa),
            fee_tier: FeeTier::Low,
            pair: OrderedPair::new(addr(1), addr(2)),
            // input is token0, so raw in-per-out = 1/raw; raw = 1e12 -> sqrt 1e6
            sqrt_price_x96: U256::from(Q96_U128) * U256::from(1_000_000u64),
            tick: 0,
            liquidity: 1,
            tick_spacing: 10,
        };
        let v = tvl(&pool, U256::from(100_000_000u64), U256::from(100u64) * U256::exp10(18), 6, 18);
        assert!((v - 200.0).abs() < 1e-6, "tvl {}", v);
    }

    #[test]
    fn test_default_tier_picks_deepest() {
        let row = |fee_tier, v: Derived<f64>| TierTvl {
            fee_tier,
            pool: Derived::Ready(Address::zero()),
            tvl: v,
            exchange_rate: Derived::Ready(1.0),
        };
        let overview = vec![
            row(FeeTier::High, Derived::Ready(10.0)),
            row(FeeTier::Medium, Derived::Ready(500.0)),
            row(FeeTier::Low, Derived::unavailable("rpc")),
            row(FeeTier::Lowest, Derived::Ready(1e-12)),
        ];
        assert_eq!(default_tier(&overview, DUST_TVL_THRESHOLD), FeeTier::Medium);

        let empty = vec![row(FeeTier::Low, Derived::Ready(0.0)), row(FeeTier::Medium, Derived::unavailable("x"))];
        assert_eq!(default_tier(&empty, DUST_TVL_THRESHOLD), FeeTier::High);
    }

    #[tokio::test]
    async fn test_tier_overview_degrades_per_tier() {
        let (a, b) = (addr(1), addr(2));
        let mut chain = InMemoryChain::new();
        chain
            .add_pool(a, b, FeeTier::Medium, addr(0xa1), U256::from(Q96_U128), 1_000)
            .set_balance(a, addr(0xa1), U256::exp10(20))
            .set_balance(b, addr(0xa1), U256::exp10(20))
            .add_pool(a, b, FeeTier::Low, addr(0xa2), U256::from(Q96_U128), 1_000)
            .fail_pool(addr(0xa2))
            .fail_pair(a, b, FeeTier::Lowest);

        let overview = tier_overview(&chain, a, b, DUST_TVL_THRESHOLD).await;
        assert_eq!(overview.len(), 4);

        let by_tier = |t: FeeTier| overview.iter().find(|r| r.fee_tier == t).unwrap();
        assert_eq!(by_tier(FeeTier::High).tvl, Derived::Ready(0.0));
        assert_eq!(by_tier(FeeTier::Medium).tvl, Derived::Ready(200.0));
        assert_eq!(by_tier(FeeTier::Medium).exchange_rate, Derived::Ready(1.0));
        assert!(!by_tier(FeeTier::Low).tvl.is_ready());
        assert_eq!(by_tier(FeeTier::Low).pool, Derived::Ready(addr(0xa2)));
        assert!(!by_tier(FeeTier::Lowest).pool.is_ready());

        assert_eq!(default_tier(&overview, DUST_TVL_THRESHOLD), FeeTier::Medium);
    }
}
