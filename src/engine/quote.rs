use std::fmt;

use ethers::types::{Address, Bytes, U256};

use crate::chain::ChainStateProvider;
use crate::engine::router::Route;
use crate::math::fixed_point::price_from_sqrt_x96;
use crate::models::{FeeTier, OrderedPair};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub const DEFAULT_SLIPPAGE_BPS: u32 = 500;
pub const DEFAULT_PRICE_IMPACT_CAP: f64 = 100.0;

const BPS_DENOMINATOR: u64 = 10_000;

/// `token(20) | fee(3, big-endian) | token(20) | ...`. `None` unless `tokens.len() == fees.len() + 1`.
pub fn encode_path(tokens: &[Address], fees: &[FeeTier]) -> Option<Bytes> {
    if tokens.is_empty() || tokens.len() != fees.len() + 1 {
        return None;
    }
    let mut out = Vec::with_capacity(20 * tokens.len() + 3 * fees.len());
    for (i, token) in tokens.iter().enumerate() {
        out.extend_from_slice(token.as_bytes());
        if let Some(fee) = fees.get(i) {
            out.extend_from_slice(&fee.as_u32().to_be_bytes()[1..]);
        }
    }
    Some(Bytes::from(out))
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct Quote {
    pub amount_out: U256,
    /// Post-trade price, raw input per output. `None` when it cannot be derived.
    pub resulting_price: Option<f64>,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub enum QuoteOutcome {
    /// Zero input; nothing was queried.
    Zero,
    Quoted(Quote),
    /// Simulation reverted or the provider failed.
    Unavailable(String),
}

impl QuoteOutcome {
    pub fn amount_out(&self) -> Option<U256> {
        match self {
            QuoteOutcome::Zero => Some(U256::zero()),
            QuoteOutcome::Quoted(q) => Some(q.amount_out),
            QuoteOutcome::Unavailable(_) => None,
        }
    }
}

/// Post-trade sqrt price of one pool, as input per output.
fn hop_price(token_in: Address, token_out: Address, sqrt_after: U256) -> Option<f64> {
    let pair = OrderedPair::new(token_in, token_out);
    match price_from_sqrt_x96(sqrt_after, pair.token0_is_quote())? {
        p if p > 0.0 => Some(p),
        _ => None,
    }
}

/// Exact-input quote over `route`. Provider failures are logged and returned as
/// `Unavailable`, never propagated.
pub async fn quote_exact_input<P: ChainStateProvider>(provider: &P, route: &Route, amount_in: U256) -> QuoteOutcome {
    if amount_in.is_zero() {
        return QuoteOutcome::Zero;
    }

    match *route {
        Route::Direct { token_in, token_out, fee } => {
            match provider.quote_exact_input_single(token_in, token_out, fee, amount_in).await {
                Ok((amount_out, sqrt_after)) => {
                    log::debug!("direct quote {} -> {} (sqrt after {})", amount_in, amount_out, sqrt_after);
                    QuoteOutcome::Quoted(Quote {
                        amount_out,
                        resulting_price: hop_price(token_in, token_out, sqrt_after),
                    })
                }
                Err(e) => {
                    log::warn!("direct quote unavailable: {}", e);
                    QuoteOutcome::Unavailable(e.to_string())
                }
            }
        }
        Route::TwoHop { token_in, intermediate, token_out, .. } => {
            let path = match encode_path(&route.tokens(), &route.fees()) {
                Some(p) => p,
                None => return QuoteOutcome::Unavailable("malformed path".to_string()),
            };
            match provider.quote_exact_input(path, amount_in).await {
                Ok((amount_out, sqrt_after_list)) => {
                    log::debug!("two-hop quote {} -> {} via {:?}", amount_in, amount_out, intermediate);
                    let resulting_price = match sqrt_after_list.as_slice() {
                        [leg1, leg2] => hop_price(token_in, intermediate, *leg1)
                            .zip(hop_price(intermediate, token_out, *leg2))
                            .map(|(a, b)| a * b),
                        _ => None,
                    };
                    QuoteOutcome::Quoted(Quote { amount_out, resulting_price })
                }
                Err(e) => {
                    log::warn!("two-hop quote unavailable: {}", e);
                    QuoteOutcome::Unavailable(e.to_string())
                }
            }
        }
    }
}

// ----------------------------- Price impact ----------------------------------

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum PriceImpact {
    Percent(f64),
    /// Impact beyond the display cap (the cap is carried for rendering).
    AboveCap(f64),
}

impl fmt::Display for PriceImpact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceImpact::Percent(p) => write!(f, "{:.4}%", p),
            PriceImpact::AboveCap(cap) => write!(f, "> {}%", cap),
        }
    }
}

/// `(resulting / pre_trade - 1) * 100`, or `AboveCap` past `cap`. `None` without a pre-trade price.
pub fn price_impact(resulting: f64, pre_trade: f64, cap: f64) -> Option<PriceImpact> {
    if !(pre_trade.is_finite() && pre_trade > 0.0) || !resulting.is_finite() {
        return None;
    }
    let impact = (resulting / pre_trade - 1.0) * 100.0;
    Some(if impact > cap { PriceImpact::AboveCap(cap) } else { PriceImpact::Percent(impact) })
}

/// Slippage floor: `amount_out * (10000 - bps) / 10000`, rounded down.
pub fn minimum_amount_out(amount_out: U256, slippage_bps: u32) -> U256 {
    let keep = U256::from(BPS_DENOMINATOR.saturating_sub(slippage_bps as u64));
    let denom = U256::from(BPS_DENOMINATOR);
    (amount_out / denom) * keep + (amount_out % denom) * keep / denom
}
