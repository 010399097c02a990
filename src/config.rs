use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub rpc_url: String,
    pub chain_id: u64,
    pub port: u16,

    // Protocol addresses
    pub v3_factory_address: String,
    pub quoter_v2_address: String,
    pub multicall_address: Option<String>,

    /// Ordered intermediates tried when a direct pool is dust.
    pub route_candidates: Vec<String>,

    // Quote behaviour
    pub default_fee_tier: u32,
    pub debounce_ms: u64,
    pub slippage_bps: u32,
    pub price_impact_cap_percent: f64,
    pub dust_tvl_threshold: f64,
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        // Load configuration files (secrets first, then public config)
        dotenv::from_filename("secrets.env").ok();
        dotenv::from_filename("addresses.env").ok();
        dotenv::from_filename("config/addresses.env").ok();
        dotenv::dotenv().ok();

        Ok(Config {
            rpc_url: env::var("RPC_URL")
                .map_err(|_| "RPC_URL must be set")?,
            chain_id: env::var("CHAIN_ID")
                .unwrap_or_else(|_| "8899".to_string()).parse().unwrap_or(8899),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .unwrap_or(8000),

            v3_factory_address: env::var("V3_FACTORY_ADDRESS")
                .map_err(|_| "V3_FACTORY_ADDRESS must be set")?,
            quoter_v2_address: env::var("QUOTER_V2_ADDRESS")
                .map_err(|_| "QUOTER_V2_ADDRESS must be set")?,
            multicall_address: env::var("MULTICALL_ADDRESS").ok().filter(|s| !s.trim().is_empty()),

            route_candidates: env::var("ROUTE_CANDIDATES")
                .map(|raw| parse_list(&raw))
                .unwrap_or_default(),

            default_fee_tier: env::var("DEFAULT_FEE_TIER")
                .unwrap_or_else(|_| "10000".to_string()).parse().unwrap_or(10000),
            debounce_ms: env::var("DEBOUNCE_MS")
                .unwrap_or_else(|_| "700".to_string()).parse().unwrap_or(700),
            slippage_bps: env::var("SLIPPAGE_BPS")
                .unwrap_or_else(|_| "500".to_string()).parse().unwrap_or(500),
            price_impact_cap_percent: env::var("PRICE_IMPACT_CAP_PERCENT")
                .unwrap_or_else(|_| "100".to_string()).parse().unwrap_or(100.0),
            dust_tvl_threshold: env::var("DUST_TVL_THRESHOLD")
                .unwrap_or_else(|_| "1e-9".to_string()).parse().unwrap_or(1e-9),
        })
    }
}
