use rocket::serde::{Deserialize, Serialize};

use crate::engine::quote::encode_path;
use crate::engine::router::Route;
use crate::math::tick_align::RangePreset;
use crate::models::Derived;

#[derive(Deserialize, rocket::FromForm)]
#[serde(crate = "rocket::serde")]
pub struct QuoteQuery {
    pub token_in: String,
    pub token_out: String,
    pub fee: Option<u32>,
    pub amount_in: Option<f64>,
}

#[derive(Deserialize, rocket::FromForm)]
#[serde(crate = "rocket::serde")]
pub struct TiersQuery {
    pub token_a: String,
    pub token_b: String,
}

#[derive(Deserialize, rocket::FromForm)]
#[serde(crate = "rocket::serde")]
pub struct PositionQuery {
    pub token_a: String,
    pub token_b: String,
    pub fee: Option<u32>,
    /// `full` or a symmetric percent band such as `15` or `7.5`.
    pub preset: Option<String>,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
    pub known_token: Option<String>,
    pub amount: Option<f64>,
}

pub fn parse_preset(raw: &str) -> Result<RangePreset, String> {
    match raw.trim() {
        "full" | "full_range" => Ok(RangePreset::FullRange),
        other => other
            .trim_end_matches('%')
            .parse::<f64>()
            .map(|pct| RangePreset::Percent(pct / 100.0))
            .map_err(|_| format!("unknown range preset '{}'", raw)),
    }
}

/// A field that may be unavailable on its own.
#[derive(Serialize, Debug, PartialEq)]
#[serde(crate = "rocket::serde")]
pub struct FieldDto<T> {
    pub value: Option<T>,
    pub error: Option<String>,
}

impl<T> FieldDto<T> {
    pub fn missing(reason: impl Into<String>) -> Self {
        Self { value: None, error: Some(reason.into()) }
    }
}

impl<T> From<Derived<T>> for FieldDto<T> {
    fn from(d: Derived<T>) -> Self {
        match d {
            Derived::Ready(v) => Self { value: Some(v), error: None },
            Derived::Unavailable(reason) => Self { value: None, error: Some(reason) },
        }
    }
}

#[derive(Serialize, Debug)]
#[serde(crate = "rocket::serde")]
pub struct RouteDto {
    pub kind: String,
    pub tokens: Vec<String>,
    pub fees: Vec<u32>,
    /// Hex-encoded QuoterV2 path.
    pub path: Option<String>,
}

impl From<&Route> for RouteDto {
    fn from(route: &Route) -> Self {
        let kind = match route {
            Route::Direct { .. } => "direct",
            Route::TwoHop { .. } => "two_hop",
        };
        let tokens = route.tokens();
        let fees = route.fees();
        RouteDto {
            kind: kind.to_string(),
            path: encode_path(&tokens, &fees).map(|p| format!("0x{}", hex::encode(p))),
            tokens: tokens.iter().map(|t| format!("{:?}", t)).collect(),
            fees: fees.iter().map(|f| f.as_u32()).collect(),
        }
    }
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct QuoteResponse {
    pub timestamp_utc: String,
    pub chain_id: u64,
    pub token_in: String,
    pub token_out: String,
    pub fee: u32,
    pub amount_in: f64,
    pub route: FieldDto<RouteDto>,
    pub direct_tvl: FieldDto<f64>,
    pub exchange_rate: FieldDto<f64>,
    pub amount_out: FieldDto<f64>,
    pub amount_out_raw: FieldDto<String>,
    pub minimum_amount_out_raw: FieldDto<String>,
    pub resulting_price: FieldDto<f64>,
    pub price_impact: FieldDto<String>,
    pub insufficient_liquidity: bool,
    pub error: Option<String>,
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct LiveQuoteResponse {
    pub timestamp_utc: String,
    /// Token of the pass this request scheduled; absent when the input was rejected.
    pub scheduled_generation: Option<u64>,
    pub pending: bool,
    pub debounce_ms: u64,
    /// Token of the pass behind `settled`; equals `scheduled_generation` once it has run.
    pub settled_generation: Option<u64>,
    pub settled: Option<QuoteResponse>,
    pub error: Option<String>,
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct TierDto {
    pub fee: u32,
    pub pool: FieldDto<String>,
    pub tvl: FieldDto<f64>,
    pub exchange_rate: FieldDto<f64>,
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct TiersResponse {
    pub timestamp_utc: String,
    pub chain_id: u64,
    pub token_a: String,
    pub token_b: String,
    pub tiers: Vec<TierDto>,
    pub default_fee_tier: u32,
    pub error: Option<String>,
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct RangeDto {
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub min_price: f64,
    pub max_price: f64,
    pub min_offset: String,
    pub max_offset: String,
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct PositionPreviewResponse {
    pub timestamp_utc: String,
    pub chain_id: u64,
    pub pool: Option<String>,
    pub fee: u32,
    pub tick_spacing: Option<i32>,
    pub current_price: FieldDto<f64>,
    pub range: FieldDto<RangeDto>,
    pub other_token: Option<String>,
    pub required_other_amount: FieldDto<f64>,
    pub error: Option<String>,
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct SettingsResponse {
    pub chain_id: u64,
    pub default_fee_tier: u32,
    pub route_candidates: Vec<String>,
    pub slippage_bps: u32,
    pub price_impact_cap_percent: f64,
    pub dust_tvl_threshold: f64,
    pub debounce_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FeeTier;
    use ethers::types::Address;

    #[test]
    fn test_parse_preset() {
        assert_eq!(parse_preset("full"), Ok(RangePreset::FullRange));
        assert_eq!(parse_preset("15"), Ok(RangePreset::Percent(0.15)));
        assert_eq!(parse_preset("2%"), Ok(RangePreset::Percent(0.02)));
        assert!(parse_preset("wide").is_err());
    }

    #[test]
    fn test_field_dto_serializes_unavailable() {
        let dto: FieldDto<f64> = Derived::unavailable("no pool").into();
        let json = rocket::serde::json::to_string(&dto).unwrap();
        assert_eq!(json, r#"{"value":null,"error":"no pool"}"#);
    }

    #[test]
    fn test_route_dto_carries_hex_path() {
        let route = Route::Direct { token_in: Address::from([1u8; 20]), token_out: Address::from([2u8; 20]), fee: FeeTier::Lowest };
        let dto = RouteDto::from(&route);
        assert_eq!(dto.kind, "direct");
        assert_eq!(dto.fees, vec![100]);
        let path = dto.path.unwrap();
        assert_eq!(path.len(), 2 + 2 * 43);
        assert!(path.starts_with(&format!("0x{}000064", "01".repeat(20))));
    }
}
