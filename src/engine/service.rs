// Recompute passes. Each pass is: explicit inputs -> provider snapshot (async, the
// only place chain reads happen) -> pure derive step. Nothing is kept between passes.

use ethers::types::{Address, U256};

use crate::chain::{ChainError, ChainStateProvider};
use crate::engine::quote::{
    minimum_amount_out, price_impact, quote_exact_input, PriceImpact, QuoteOutcome, DEFAULT_PRICE_IMPACT_CAP,
    DEFAULT_SLIPPAGE_BPS,
};
use crate::engine::router::{Liquidity, Resolution, Route, RouteResolver};
use crate::engine::tvl::DUST_TVL_THRESHOLD;
use crate::math::position::{required_other_amount, PositionError};
use crate::math::tick_align::{align_display_range, describe_range, range_from_preset, AlignedRange, RangeError, RangePreset};
use crate::math::units::{from_raw_units, scale_rate, to_raw_units};
use crate::models::{Derived, FeeTier, OrderedPair, PoolSnapshot};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Range(#[from] RangeError),
    #[error(transparent)]
    Position(#[from] PositionError),
    #[error(transparent)]
    Chain(#[from] ChainError),
}

#[derive(Clone, Debug, PartialEq)]
pub struct QuoteSettings {
    pub slippage_bps: u32,
    pub price_impact_cap: f64,
    pub dust_threshold: f64,
}

impl Default for QuoteSettings {
    fn default() -> Self {
        Self {
            slippage_bps: DEFAULT_SLIPPAGE_BPS,
            price_impact_cap: DEFAULT_PRICE_IMPACT_CAP,
            dust_threshold: DUST_TVL_THRESHOLD,
        }
    }
}

// ------------------------------- Swap ----------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub struct SwapInputs {
    pub token_in: Address,
    pub token_out: Address,
    pub fee: FeeTier,
    /// Human units of `token_in`.
    pub amount_in: f64,
}

/// Everything one swap pass read from chain.
#[derive(Clone, Debug, PartialEq)]
pub struct SwapSnapshot {
    pub inputs: SwapInputs,
    pub resolution: Derived<Resolution>,
    pub amount_in_raw: U256,
    pub quote: QuoteOutcome,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SwapState {
    pub route: Derived<Route>,
    pub direct_tvl: Derived<f64>,
    /// Input per output at the current price; 0 on an illiquid route.
    pub exchange_rate: Derived<f64>,
    pub amount_out: Derived<f64>,
    pub amount_out_raw: Derived<U256>,
    pub minimum_amount_out_raw: Derived<U256>,
    pub resulting_price: Derived<f64>,
    pub price_impact: Derived<PriceImpact>,
    pub insufficient_liquidity: bool,
}

pub async fn load_swap_snapshot<P: ChainStateProvider>(
    provider: &P,
    resolver: &RouteResolver,
    inputs: SwapInputs,
) -> SwapSnapshot {
    log::info!("swap pass: {:?} -> {:?} fee {} amount {}", inputs.token_in, inputs.token_out, inputs.fee, inputs.amount_in);

    let resolution = resolver.resolve(provider, inputs.token_in, inputs.token_out, inputs.fee).await;
    let (resolution, amount_in_raw, quote) = match resolution {
        Ok(res) => {
            let amount_in_raw = to_raw_units(inputs.amount_in, res.decimals_in);
            let quote = quote_exact_input(provider, &res.route, amount_in_raw).await;
            (Derived::Ready(res), amount_in_raw, quote)
        }
        Err(e) => {
            log::warn!("route resolution failed: {}", e);
            let quote = if inputs.amount_in > 0.0 {
                QuoteOutcome::Unavailable(e.to_string())
            } else {
                QuoteOutcome::Zero
            };
            (Derived::unavailable(e.to_string()), U256::zero(), quote)
        }
    };

    SwapSnapshot { inputs, resolution, amount_in_raw, quote }
}

pub fn derive_swap_state(snapshot: &SwapSnapshot, settings: &QuoteSettings) -> SwapState {
    let resolution = match &snapshot.resolution {
        Derived::Ready(res) => res,
        Derived::Unavailable(reason) => {
            let quoted_zero = snapshot.quote == QuoteOutcome::Zero;
            return SwapState {
                route: Derived::unavailable(reason.as_str()),
                direct_tvl: Derived::unavailable(reason.as_str()),
                exchange_rate: Derived::unavailable(reason.as_str()),
                amount_out: if quoted_zero { Derived::Ready(0.0) } else { Derived::unavailable(reason.as_str()) },
                amount_out_raw: if quoted_zero { Derived::Ready(U256::zero()) } else { Derived::unavailable(reason.as_str()) },
                minimum_amount_out_raw: Derived::unavailable(reason.as_str()),
                resulting_price: Derived::unavailable(reason.as_str()),
                price_impact: Derived::unavailable(reason.as_str()),
                insufficient_liquidity: false,
            };
        }
    };

    let illiquid = resolution.liquidity == Liquidity::Illiquid;
    let exchange_rate = match resolution.exchange_rate() {
        Some(rate) => Derived::Ready(rate),
        None if illiquid => Derived::Ready(0.0),
        None => Derived::unavailable("spot price unavailable"),
    };

    let (dec_in, dec_out) = (resolution.decimals_in, resolution.decimals_out);
    let (amount_out_raw, resulting_price, insufficient) = match &snapshot.quote {
        QuoteOutcome::Zero => (Derived::Ready(U256::zero()), Derived::unavailable("no trade"), false),
        QuoteOutcome::Quoted(q) => (
            Derived::Ready(q.amount_out),
            q.resulting_price
                .map(|raw| Derived::Ready(scale_rate(raw, dec_in, dec_out)))
                .unwrap_or_else(|| Derived::unavailable("post-trade price unavailable")),
            false,
        ),
        QuoteOutcome::Unavailable(reason) => {
            (Derived::unavailable(reason.as_str()), Derived::unavailable(reason.as_str()), true)
        }
    };

    let price_impact = match (resulting_price.ready(), exchange_rate.ready()) {
        (Some(after), Some(before)) => price_impact(*after, *before, settings.price_impact_cap)
            .map(Derived::Ready)
            .unwrap_or_else(|| Derived::unavailable("no pre-trade price")),
        _ => Derived::unavailable("price impact needs both prices"),
    };

    let minimum_amount_out_raw = amount_out_raw.clone().map(|out| minimum_amount_out(out, settings.slippage_bps));
    let amount_out = amount_out_raw.clone().map(|out| from_raw_units(out, dec_out));

    SwapState {
        route: Derived::Ready(resolution.route),
        direct_tvl: Derived::Ready(resolution.direct_tvl),
        exchange_rate,
        amount_out,
        amount_out_raw,
        minimum_amount_out_raw,
        resulting_price,
        price_impact,
        insufficient_liquidity: insufficient || illiquid,
    }
}

/// Load + derive in one call.
pub async fn run_swap_pass<P: ChainStateProvider>(
    provider: &P,
    resolver: &RouteResolver,
    inputs: SwapInputs,
    settings: &QuoteSettings,
) -> SwapState {
    let snapshot = load_swap_snapshot(provider, resolver, inputs).await;
    let state = derive_swap_state(&snapshot, settings);
    log::info!("swap pass done: amount_out {:?}, insufficient_liquidity {}", state.amount_out, state.insufficient_liquidity);
    state
}

// ----------------------------- Liquidity -------------------------------------

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum RangeSelection {
    Preset(RangePreset),
    /// Bounds as `token_a` per `token_b`, human units. `0` / `+inf` mean unbounded.
    Custom { lower: f64, upper: f64 },
}

#[derive(Clone, Debug, PartialEq)]
pub struct LiquidityInputs {
    pub token_a: Address,
    pub token_b: Address,
    pub fee: FeeTier,
    pub range: RangeSelection,
    pub known_token: Address,
    /// Human units of `known_token`.
    pub known_amount: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LiquiditySnapshot {
    pub inputs: LiquidityInputs,
    /// `None` when the pool has not been created yet.
    pub pool: Option<PoolSnapshot>,
    pub tick_spacing: i32,
    pub decimals_a: u8,
    pub decimals_b: u8,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LiquidityState {
    pub pool: Option<Address>,
    pub tick_spacing: i32,
    /// `token_a` per `token_b`, human units.
    pub current_price: Derived<f64>,
    pub range: Derived<AlignedRange>,
    pub other_token: Address,
    /// Human units of `other_token`.
    pub required_other_amount: Derived<f64>,
}

fn check_custom_range(range: &RangeSelection) -> Result<(), RangeError> {
    if let RangeSelection::Custom { lower, upper } = *range {
        if lower.is_nan() || lower < 0.0 {
            return Err(RangeError::InvalidPrice(lower));
        }
        if upper.is_nan() || upper < 0.0 {
            return Err(RangeError::InvalidPrice(upper));
        }
        if upper < lower {
            return Err(RangeError::InvalidRange { lower, upper });
        }
    }
    Ok(())
}

/// Reads pool state for a position preview. An invalid custom range is rejected
/// before any chain query.
pub async fn load_liquidity_snapshot<P: ChainStateProvider>(
    provider: &P,
    inputs: LiquidityInputs,
) -> Result<LiquiditySnapshot, EngineError> {
    check_custom_range(&inputs.range)?;
    log::info!("liquidity pass: {:?}/{:?} fee {}", inputs.token_a, inputs.token_b, inputs.fee);

    let (pool_address, decimals_a, decimals_b) = tokio::try_join!(
        provider.get_pool_address(inputs.token_a, inputs.token_b, inputs.fee),
        provider.get_token_decimals(inputs.token_a),
        provider.get_token_decimals(inputs.token_b),
    )?;

    let (pool, tick_spacing) = if pool_address.is_zero() {
        (None, provider.tick_spacing_for_fee(inputs.fee).await?)
    } else {
        let state = provider.get_pool_state(pool_address).await?;
        let snapshot = PoolSnapshot::from_state(pool_address, inputs.fee, inputs.token_a, inputs.token_b, state);
        let spacing = snapshot.tick_spacing;
        (Some(snapshot), spacing)
    };

    Ok(LiquiditySnapshot { inputs, pool, tick_spacing, decimals_a, decimals_b })
}

fn scale_aligned(mut aligned: AlignedRange, factor: f64) -> AlignedRange {
    aligned.min_price *= factor;
    aligned.max_price *= factor;
    aligned
}

pub fn derive_liquidity_state(snapshot: &LiquiditySnapshot) -> LiquidityState {
    let inputs = &snapshot.inputs;
    let pair = OrderedPair::new(inputs.token_a, inputs.token_b);
    let token0_is_quote = pair.token0_is_quote();
    // raw display (token_a per token_b) -> human
    let factor = scale_rate(1.0, snapshot.decimals_a, snapshot.decimals_b);

    let raw_display_current = snapshot.pool.as_ref().and_then(|p| p.price_in_per_out()).unwrap_or(0.0);
    let current_price = match &snapshot.pool {
        None => Derived::unavailable("pool does not exist"),
        Some(_) if raw_display_current > 0.0 => Derived::Ready(raw_display_current * factor),
        Some(_) => Derived::unavailable("pool is not initialized"),
    };

    let range: Derived<AlignedRange> = match inputs.range {
        RangeSelection::Preset(preset) => {
            let raw_price = snapshot.pool.as_ref().map(|p| p.raw_price()).unwrap_or(0.0);
            range_from_preset(raw_price, preset, snapshot.tick_spacing)
                .and_then(|r| describe_range(r, snapshot.tick_spacing, raw_display_current, token0_is_quote))
                .map(|a| scale_aligned(a, factor))
                .into()
        }
        RangeSelection::Custom { lower, upper } => align_display_range(
            lower / factor,
            upper / factor,
            snapshot.tick_spacing,
            raw_display_current,
            token0_is_quote,
        )
        .map(|a| scale_aligned(a, factor))
        .into(),
    };

    let other_token = if inputs.known_token == inputs.token_a { inputs.token_b } else { inputs.token_a };
    let required_other_amount = match (&snapshot.pool, range.ready()) {
        (None, _) => Derived::unavailable("pool does not exist"),
        (_, None) => Derived::unavailable("no valid range"),
        (Some(pool), Some(aligned)) => {
            let (known_dec, other_dec) = if inputs.known_token == inputs.token_a {
                (snapshot.decimals_a, snapshot.decimals_b)
            } else {
                (snapshot.decimals_b, snapshot.decimals_a)
            };
            let known_raw = to_raw_units(inputs.known_amount, known_dec);
            required_other_amount(pool, aligned.range, inputs.known_token, known_raw)
                .map(|raw| from_raw_units(raw, other_dec))
                .into()
        }
    };

    LiquidityState {
        pool: snapshot.pool.as_ref().map(|p| p.address),
        tick_spacing: snapshot.tick_spacing,
        current_price,
        range,
        other_token,
        required_other_amount,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::memory::InMemoryChain;
    use crate::engine::quote::Quote;
    use crate::math::tick_align::RangeOffset;
    use crate::math::tick_math::Q96_U128;
    use crate::models::TickRange;

    fn addr(x: u8) -> Address { Address::from([x; 20]) }

    fn resolution(liquidity: Liquidity) -> Resolution {
        let pool = PoolSnapshot {
            address: addr(0xd0),
            fee_tier: FeeTier::Medium,
            pair: OrderedPair::new(addr(1), addr(2)),
            sqrt_price_x96: U256::from(Q96_U128),
            tick: 0,
            liquidity: 1,
            tick_spacing: 60,
        };
        Resolution {
            route: Route::Direct { token_in: addr(1), token_out: addr(2), fee: FeeTier::Medium },
            direct_tvl: 200.0,
            liquidity,
            direct_pool: Some(pool),
            legs: None,
            decimals_in: 18,
            decimals_out: 18,
        }
    }

    fn snapshot(res: Derived<Resolution>, quote: QuoteOutcome) -> SwapSnapshot {
        SwapSnapshot {
            inputs: SwapInputs { token_in: addr(1), token_out: addr(2), fee: FeeTier::Medium, amount_in: 1.0 },
            resolution: res,
            amount_in_raw: U256::exp10(18),
            quote,
        }
    }

    #[test]
    fn test_derive_swap_state_quoted() {
        let quote = QuoteOutcome::Quoted(Quote { amount_out: U256::exp10(18) * 2, resulting_price: Some(1.05) });
        let state = derive_swap_state(&snapshot(Derived::Ready(resolution(Liquidity::Sufficient)), quote), &QuoteSettings::default());

        assert_eq!(state.exchange_rate, Derived::Ready(1.0));
        assert_eq!(state.amount_out, Derived::Ready(2.0));
        assert_eq!(state.minimum_amount_out_raw, Derived::Ready(U256::exp10(17) * 19));
        assert_eq!(state.resulting_price, Derived::Ready(1.05));
        match state.price_impact {
            Derived::Ready(PriceImpact::Percent(p)) => assert!((p - 5.0).abs() < 1e-9),
            other => panic!("unexpected {:?}", other),
        }
        assert!(!state.insufficient_liquidity);
    }

    #[test]
    fn test_derive_swap_state_unavailable_quote_flags_liquidity() {
        let quote = QuoteOutcome::Unavailable("SPL".into());
        let state = derive_swap_state(&snapshot(Derived::Ready(resolution(Liquidity::Sufficient)), quote), &QuoteSettings::default());
        assert!(state.insufficient_liquidity);
        assert!(!state.amount_out.is_ready());
        // unrelated fields survive
        assert_eq!(state.exchange_rate, Derived::Ready(1.0));
        assert_eq!(state.direct_tvl, Derived::Ready(200.0));
    }

    #[test]
    fn test_derive_swap_state_illiquid_rate_is_zero() {
        let state = derive_swap_state(
            &snapshot(Derived::Ready(resolution(Liquidity::Illiquid)), QuoteOutcome::Zero),
            &QuoteSettings::default(),
        );
        assert_eq!(state.exchange_rate, Derived::Ready(0.0));
        assert_eq!(state.amount_out, Derived::Ready(0.0));
        assert!(state.insufficient_liquidity);
    }

    #[test]
    fn test_derive_swap_state_price_impact_cap() {
        let quote = QuoteOutcome::Quoted(Quote { amount_out: U256::one(), resulting_price: Some(3.0) });
        let state = derive_swap_state(&snapshot(Derived::Ready(resolution(Liquidity::Sufficient)), quote), &QuoteSettings::default());
        assert_eq!(state.price_impact, Derived::Ready(PriceImpact::AboveCap(100.0)));
    }

    #[test]
    fn test_derive_swap_state_without_resolution() {
        let state = derive_swap_state(
            &snapshot(Derived::unavailable("rpc down"), QuoteOutcome::Unavailable("rpc down".into())),
            &QuoteSettings::default(),
        );
        assert_eq!(state.route, Derived::unavailable("rpc down"));
        assert!(!state.amount_out.is_ready());
    }

    #[tokio::test]
    async fn test_invalid_custom_range_rejected_before_query() {
        let mut chain = InMemoryChain::new();
        // any chain read would fail
        chain.fail_pair(addr(1), addr(2), FeeTier::Medium);
        let inputs = LiquidityInputs {
            token_a: addr(1),
            token_b: addr(2),
            fee: FeeTier::Medium,
            range: RangeSelection::Custom { lower: 2.0, upper: 1.0 },
            known_token: addr(1),
            known_amount: 1.0,
        };
        match load_liquidity_snapshot(&chain, inputs).await {
            Err(EngineError::Range(RangeError::InvalidRange { lower, upper })) => {
                assert_eq!((lower, upper), (2.0, 1.0));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_liquidity_pass_without_pool_uses_provider_spacing() {
        let chain = InMemoryChain::new();
        let inputs = LiquidityInputs {
            token_a: addr(1),
            token_b: addr(2),
            fee: FeeTier::High,
            range: RangeSelection::Preset(RangePreset::FullRange),
            known_token: addr(1),
            known_amount: 1.0,
        };
        let snap = load_liquidity_snapshot(&chain, inputs).await.unwrap();
        assert!(snap.pool.is_none());
        assert_eq!(snap.tick_spacing, 200);

        let state = derive_liquidity_state(&snap);
        let aligned = state.range.ready().unwrap();
        assert_eq!(aligned.range, TickRange { tick_lower: -887_200, tick_upper: 887_200 });
        assert_eq!(aligned.max_offset, RangeOffset::Unbounded);
        assert!(!state.required_other_amount.is_ready());
        assert!(!state.current_price.is_ready());
    }

    #[tokio::test]
    async fn test_liquidity_pass_sizes_other_side() {
        let (a, b) = (addr(1), addr(2));
        let mut chain = InMemoryChain::new();
        chain.add_pool(a, b, FeeTier::Medium, addr(0xd0), U256::from(Q96_U128), 1_000_000);
        let inputs = LiquidityInputs {
            token_a: a,
            token_b: b,
            fee: FeeTier::Medium,
            range: RangeSelection::Custom { lower: 0.5, upper: 2.0 },
            known_token: a,
            known_amount: 10.0,
        };
        let state = derive_liquidity_state(&load_liquidity_snapshot(&chain, inputs).await.unwrap());

        assert_eq!(state.current_price, Derived::Ready(1.0));
        assert_eq!(state.other_token, b);
        let aligned = state.range.ready().unwrap();
        assert!(aligned.min_price <= 0.5 && aligned.max_price >= 2.0);
        // symmetric-ish range around 1: roughly equal amounts
        let other = *state.required_other_amount.ready().unwrap();
        assert!(other > 9.0 && other < 11.0, "other {}", other);
    }
}
