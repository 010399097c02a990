use rocket::serde::json::Json;
use rocket::{get, State};
use std::str::FromStr;
use std::sync::Arc;

use ethers::types::Address;

use crate::bootstrap::AppState;
use crate::engine::service::{
    derive_liquidity_state, load_liquidity_snapshot, run_swap_pass, LiquidityInputs, RangeSelection, SwapInputs,
    SwapState,
};
use crate::engine::tvl::{default_tier, tier_overview};
use crate::math::tick_align::RangePreset;
use crate::models::FeeTier;
use crate::web::dto::{
    parse_preset, FieldDto, LiveQuoteResponse, PositionPreviewResponse, PositionQuery, QuoteQuery, QuoteResponse,
    RangeDto, RouteDto, SettingsResponse, TierDto, TiersQuery, TiersResponse,
};

fn parse_address(raw: &str) -> Result<Address, String> {
    Address::from_str(raw.trim()).map_err(|e| format!("invalid address '{}': {}", raw, e))
}

fn resolve_fee(fee: Option<u32>, default: FeeTier) -> Result<FeeTier, String> {
    match fee {
        None => Ok(default),
        Some(f) => FeeTier::from_u32(f).ok_or_else(|| format!("unsupported fee tier {}", f)),
    }
}

fn range_selection(query: &PositionQuery) -> Result<RangeSelection, String> {
    if let Some(preset) = &query.preset {
        return parse_preset(preset).map(RangeSelection::Preset);
    }
    if query.lower.is_some() || query.upper.is_some() {
        return Ok(RangeSelection::Custom {
            lower: query.lower.unwrap_or(0.0),
            upper: query.upper.unwrap_or(f64::INFINITY),
        });
    }
    Ok(RangeSelection::Preset(RangePreset::FullRange))
}

fn fmt_addr(addr: Address) -> String {
    format!("{:?}", addr)
}

fn swap_inputs(query: &QuoteQuery, default_fee: FeeTier) -> Result<SwapInputs, String> {
    Ok(SwapInputs {
        token_in: parse_address(&query.token_in)?,
        token_out: parse_address(&query.token_out)?,
        fee: resolve_fee(query.fee, default_fee)?,
        amount_in: query.amount_in.unwrap_or(0.0).max(0.0),
    })
}

fn quote_response(chain_id: u64, inputs: &SwapInputs, state: SwapState) -> QuoteResponse {
    QuoteResponse {
        timestamp_utc: chrono::Utc::now().to_rfc3339(),
        chain_id,
        token_in: fmt_addr(inputs.token_in),
        token_out: fmt_addr(inputs.token_out),
        fee: inputs.fee.as_u32(),
        amount_in: inputs.amount_in,
        route: state.route.map(|r| RouteDto::from(&r)).into(),
        direct_tvl: state.direct_tvl.into(),
        exchange_rate: state.exchange_rate.into(),
        amount_out: state.amount_out.into(),
        amount_out_raw: state.amount_out_raw.map(|v| v.to_string()).into(),
        minimum_amount_out_raw: state.minimum_amount_out_raw.map(|v| v.to_string()).into(),
        resulting_price: state.resulting_price.into(),
        price_impact: state.price_impact.map(|p| p.to_string()).into(),
        insufficient_liquidity: state.insufficient_liquidity,
        error: None,
    }
}

#[get("/api/v1/quote?<query..>")]
pub async fn quote(query: QuoteQuery, app_state: &State<Arc<AppState>>) -> Json<QuoteResponse> {
    let inputs = match swap_inputs(&query, app_state.default_fee_tier) {
        Ok(inputs) => inputs,
        Err(e) => {
            log::error!("Rejected quote request: {}", e);
            return Json(QuoteResponse {
                timestamp_utc: chrono::Utc::now().to_rfc3339(),
                chain_id: app_state.chain_id,
                token_in: query.token_in.clone(),
                token_out: query.token_out.clone(),
                fee: query.fee.unwrap_or(app_state.default_fee_tier.as_u32()),
                amount_in: query.amount_in.unwrap_or(0.0).max(0.0),
                route: FieldDto::missing(e.as_str()),
                direct_tvl: FieldDto::missing(e.as_str()),
                exchange_rate: FieldDto::missing(e.as_str()),
                amount_out: FieldDto::missing(e.as_str()),
                amount_out_raw: FieldDto::missing(e.as_str()),
                minimum_amount_out_raw: FieldDto::missing(e.as_str()),
                resulting_price: FieldDto::missing(e.as_str()),
                price_impact: FieldDto::missing(e.as_str()),
                insufficient_liquidity: false,
                error: Some(e),
            });
        }
    };

    let state = run_swap_pass(&app_state.chain, &app_state.resolver, inputs.clone(), &app_state.settings).await;
    Json(quote_response(app_state.chain_id, &inputs, state))
}

/// Keystroke-style quoting: each call supersedes the previous input and re-arms the
/// debounce timer. The response carries the newest settled pass, which lags the
/// scheduled one until the quiet period has passed.
#[get("/api/v1/quote/live?<query..>")]
pub fn live_quote(query: QuoteQuery, app_state: &State<Arc<AppState>>) -> Json<LiveQuoteResponse> {
    let parsed = swap_inputs(&query, app_state.default_fee_tier);

    let mut live = app_state.live_quotes();
    let (scheduled_generation, error) = match parsed {
        Ok(inputs) => {
            let state = app_state.inner().clone();
            let token = live.on_input(async move {
                let swap = run_swap_pass(&state.chain, &state.resolver, inputs.clone(), &state.settings).await;
                (inputs, swap)
            });
            (Some(token), None)
        }
        Err(e) => {
            log::error!("Rejected live quote input: {}", e);
            (None, Some(e))
        }
    };
    let settled = live.latest();
    let pending = live.is_pending();
    drop(live);

    Json(LiveQuoteResponse {
        timestamp_utc: chrono::Utc::now().to_rfc3339(),
        scheduled_generation,
        pending,
        debounce_ms: app_state.debounce.as_millis() as u64,
        settled_generation: settled.as_ref().map(|(token, _)| *token),
        settled: settled.map(|(_, (inputs, state))| quote_response(app_state.chain_id, &inputs, state)),
        error,
    })
}

#[get("/api/v1/tiers?<query..>")]
pub async fn tiers(query: TiersQuery, app_state: &State<Arc<AppState>>) -> Json<TiersResponse> {
    let threshold = app_state.settings.dust_threshold;
    let pair = parse_address(&query.token_a).and_then(|a| parse_address(&query.token_b).map(|b| (a, b)));

    match pair {
        Ok((token_a, token_b)) => {
            let overview = tier_overview(&app_state.chain, token_a, token_b, threshold).await;
            let default_fee_tier = default_tier(&overview, threshold).as_u32();
            Json(TiersResponse {
                timestamp_utc: chrono::Utc::now().to_rfc3339(),
                chain_id: app_state.chain_id,
                token_a: fmt_addr(token_a),
                token_b: fmt_addr(token_b),
                tiers: overview
                    .into_iter()
                    .map(|t| TierDto {
                        fee: t.fee_tier.as_u32(),
                        pool: t.pool.map(fmt_addr).into(),
                        tvl: t.tvl.into(),
                        exchange_rate: t.exchange_rate.into(),
                    })
                    .collect(),
                default_fee_tier,
                error: None,
            })
        }
        Err(e) => {
            log::error!("Rejected tiers request: {}", e);
            Json(TiersResponse {
                timestamp_utc: chrono::Utc::now().to_rfc3339(),
                chain_id: app_state.chain_id,
                token_a: query.token_a.clone(),
                token_b: query.token_b.clone(),
                tiers: Vec::new(),
                default_fee_tier: app_state.default_fee_tier.as_u32(),
                error: Some(e),
            })
        }
    }
}

#[get("/api/v1/position-preview?<query..>")]
pub async fn position_preview(query: PositionQuery, app_state: &State<Arc<AppState>>) -> Json<PositionPreviewResponse> {
    let fee = query.fee.unwrap_or(app_state.default_fee_tier.as_u32());

    let parsed = (|| {
        let token_a = parse_address(&query.token_a)?;
        let token_b = parse_address(&query.token_b)?;
        let known_token = match &query.known_token {
            Some(raw) => parse_address(raw)?,
            None => token_a,
        };
        Ok::<_, String>(LiquidityInputs {
            token_a,
            token_b,
            fee: resolve_fee(query.fee, app_state.default_fee_tier)?,
            range: range_selection(&query)?,
            known_token,
            known_amount: query.amount.unwrap_or(0.0).max(0.0),
        })
    })();

    let failed = |e: String| {
        Json(PositionPreviewResponse {
            timestamp_utc: chrono::Utc::now().to_rfc3339(),
            chain_id: app_state.chain_id,
            pool: None,
            fee,
            tick_spacing: None,
            current_price: FieldDto::missing(e.as_str()),
            range: FieldDto::missing(e.as_str()),
            other_token: None,
            required_other_amount: FieldDto::missing(e.as_str()),
            error: Some(e),
        })
    };

    let inputs = match parsed {
        Ok(inputs) => inputs,
        Err(e) => {
            log::error!("Rejected position preview request: {}", e);
            return failed(e);
        }
    };

    match load_liquidity_snapshot(&app_state.chain, inputs).await {
        Ok(snapshot) => {
            let state = derive_liquidity_state(&snapshot);
            Json(PositionPreviewResponse {
                timestamp_utc: chrono::Utc::now().to_rfc3339(),
                chain_id: app_state.chain_id,
                pool: state.pool.map(fmt_addr),
                fee,
                tick_spacing: Some(state.tick_spacing),
                current_price: state.current_price.into(),
                range: state
                    .range
                    .map(|a| RangeDto {
                        tick_lower: a.range.tick_lower,
                        tick_upper: a.range.tick_upper,
                        min_price: a.min_price,
                        max_price: a.max_price,
                        min_offset: a.min_offset.to_string(),
                        max_offset: a.max_offset.to_string(),
                    })
                    .into(),
                other_token: Some(fmt_addr(state.other_token)),
                required_other_amount: state.required_other_amount.into(),
                error: None,
            })
        }
        Err(e) => {
            log::error!("Failed to build position preview: {}", e);
            failed(e.to_string())
        }
    }
}

#[get("/api/v1/settings")]
pub fn settings(app_state: &State<Arc<AppState>>) -> Json<SettingsResponse> {
    Json(SettingsResponse {
        chain_id: app_state.chain_id,
        default_fee_tier: app_state.default_fee_tier.as_u32(),
        route_candidates: app_state.resolver.candidates.iter().copied().map(fmt_addr).collect(),
        slippage_bps: app_state.settings.slippage_bps,
        price_impact_cap_percent: app_state.settings.price_impact_cap,
        dust_tvl_threshold: app_state.settings.dust_threshold,
        debounce_ms: app_state.debounce.as_millis() as u64,
    })
}

#[get("/health")]
pub fn health() -> &'static str {
    "OK"
}
