use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use ethers::prelude::*;

use crate::chain::ethers_provider::{create_provider, EthersChainProvider};
use crate::config::Config;
use crate::engine::debounce::DebouncedRecompute;
use crate::engine::router::RouteResolver;
use crate::engine::service::{QuoteSettings, SwapInputs, SwapState};
use crate::models::FeeTier;

pub type LiveChain = EthersChainProvider<Provider<Http>>;

/// Settled result of a live quote pass with the inputs it ran for.
pub type LiveQuote = (SwapInputs, SwapState);

pub struct AppState {
    pub chain: LiveChain,
    pub chain_id: u64,
    pub resolver: RouteResolver,
    pub settings: QuoteSettings,
    pub default_fee_tier: FeeTier,
    pub debounce: Duration,
    /// Debounced swap recompute behind `/api/v1/quote/live`.
    pub live_quotes: Mutex<DebouncedRecompute<LiveQuote>>,
}

impl AppState {
    pub fn new(config: &Config) -> Result<Self, Box<dyn std::error::Error>> {
        let provider = create_provider(&config.rpc_url)?;
        let factory = Address::from_str(&config.v3_factory_address)?;
        let quoter = Address::from_str(&config.quoter_v2_address)?;
        let multicall = config
            .multicall_address
            .as_ref()
            .map(|addr| Address::from_str(addr))
            .transpose()?;

        let candidates = config
            .route_candidates
            .iter()
            .map(|addr| Address::from_str(addr))
            .collect::<Result<Vec<_>, _>>()?;

        let default_fee_tier = FeeTier::from_u32(config.default_fee_tier)
            .ok_or_else(|| format!("DEFAULT_FEE_TIER {} is not a supported fee tier", config.default_fee_tier))?;

        log::info!(
            "chain {} via {}: factory {:?}, quoter {:?}, {} route candidates",
            config.chain_id,
            config.rpc_url,
            factory,
            quoter,
            candidates.len()
        );

        let debounce = Duration::from_millis(config.debounce_ms);

        Ok(AppState {
            chain: EthersChainProvider::new(provider, factory, quoter, multicall),
            chain_id: config.chain_id,
            resolver: RouteResolver::new(candidates).with_dust_threshold(config.dust_tvl_threshold),
            settings: QuoteSettings {
                slippage_bps: config.slippage_bps,
                price_impact_cap: config.price_impact_cap_percent,
                dust_threshold: config.dust_tvl_threshold,
            },
            default_fee_tier,
            debounce,
            live_quotes: Mutex::new(DebouncedRecompute::new(debounce)),
        })
    }

    pub fn live_quotes(&self) -> MutexGuard<'_, DebouncedRecompute<LiveQuote>> {
        match self.live_quotes.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
