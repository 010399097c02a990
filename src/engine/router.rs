use ethers::types::Address;
use futures::future::join_all;

use crate::chain::{ChainError, ChainStateProvider};
use crate::engine::tvl::{is_dust, load_pool_tvl, DUST_TVL_THRESHOLD};
use crate::math::units::scale_rate;
use crate::models::{FeeTier, PoolSnapshot};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Route {
    Direct {
        token_in: Address,
        token_out: Address,
        fee: FeeTier,
    },
    TwoHop {
        token_in: Address,
        intermediate: Address,
        token_out: Address,
        fee_leg1: FeeTier,
        fee_leg2: FeeTier,
    },
}

impl Route {
    pub fn token_in(&self) -> Address {
        match *self {
            Route::Direct { token_in, .. } | Route::TwoHop { token_in, .. } => token_in,
        }
    }

    pub fn token_out(&self) -> Address {
        match *self {
            Route::Direct { token_out, .. } | Route::TwoHop { token_out, .. } => token_out,
        }
    }

    /// Tokens along the path, input first.
    pub fn tokens(&self) -> Vec<Address> {
        match *self {
            Route::Direct { token_in, token_out, .. } => vec![token_in, token_out],
            Route::TwoHop { token_in, intermediate, token_out, .. } => vec![token_in, intermediate, token_out],
        }
    }

    pub fn fees(&self) -> Vec<FeeTier> {
        match *self {
            Route::Direct { fee, .. } => vec![fee],
            Route::TwoHop { fee_leg1, fee_leg2, .. } => vec![fee_leg1, fee_leg2],
        }
    }
}

/// How an intermediate is chosen when the direct pool is dust.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum RouteStrategy {
    /// First candidate (in configured order) with both legs deployed. No depth or
    /// output comparison between candidates.
    #[default]
    FirstViable,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Liquidity {
    Sufficient,
    /// Direct pool is dust and no two-hop exists; quotes over this route are unreliable.
    Illiquid,
}

/// Outcome of one resolution pass. Not cached between passes.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct Resolution {
    pub route: Route,
    pub direct_tvl: f64,
    pub liquidity: Liquidity,
    pub direct_pool: Option<PoolSnapshot>,
    /// Leg snapshots of a two-hop route, when they could be read.
    pub legs: Option<(PoolSnapshot, PoolSnapshot)>,
    pub decimals_in: u8,
    pub decimals_out: u8,
}

impl Resolution {
    /// Spot rate as input per output (human units). `None` on an illiquid route.
    pub fn exchange_rate(&self) -> Option<f64> {
        if self.liquidity == Liquidity::Illiquid {
            return None;
        }
        let raw = match (&self.route, &self.direct_pool, &self.legs) {
            (Route::Direct { .. }, Some(pool), _) => pool.price_in_per_out()?,
            // in-per-mid * mid-per-out; the intermediate's decimals cancel
            (Route::TwoHop { .. }, _, Some((leg1, leg2))) => leg1.price_in_per_out()? * leg2.price_in_per_out()?,
            _ => return None,
        };
        let rate = scale_rate(raw, self.decimals_in, self.decimals_out);
        (rate.is_finite() && rate > 0.0).then_some(rate)
    }
}

#[derive(Clone, Debug)]
pub struct RouteResolver {
    pub candidates: Vec<Address>,
    pub strategy: RouteStrategy,
    pub dust_threshold: f64,
}

impl RouteResolver {
    pub fn new(candidates: Vec<Address>) -> Self {
        Self { candidates, strategy: RouteStrategy::FirstViable, dust_threshold: DUST_TVL_THRESHOLD }
    }

    pub fn with_dust_threshold(mut self, threshold: f64) -> Self {
        self.dust_threshold = threshold;
        self
    }

    pub async fn resolve<P: ChainStateProvider>(
        &self,
        provider: &P,
        token_in: Address,
        token_out: Address,
        fee: FeeTier,
    ) -> Result<Resolution, ChainError> {
        let (pool, decimals_in, decimals_out) = tokio::try_join!(
            provider.get_pool_address(token_in, token_out, fee),
            provider.get_token_decimals(token_in),
            provider.get_token_decimals(token_out),
        )?;

        let (direct_pool, direct_tvl) = if pool.is_zero() {
            (None, 0.0)
        } else {
            let (snapshot, value) =
                load_pool_tvl(provider, pool, fee, token_in, token_out, decimals_in, decimals_out).await?;
            (Some(snapshot), value)
        };

        let direct = Route::Direct { token_in, token_out, fee };
        let mut resolution = Resolution {
            route: direct,
            direct_tvl,
            liquidity: Liquidity::Sufficient,
            direct_pool,
            legs: None,
            decimals_in,
            decimals_out,
        };

        if !is_dust(direct_tvl, self.dust_threshold) {
            log::debug!("route {:?} -> {:?} fee {}: direct, tvl {}", token_in, token_out, fee, direct_tvl);
            return Ok(resolution);
        }

        match self.strategy {
            RouteStrategy::FirstViable => match self.first_viable(provider, token_in, token_out, fee).await {
                Some((intermediate, leg1, leg2)) => {
                    log::info!("direct pool is dust (tvl {}), routing via {:?}", direct_tvl, intermediate);
                    resolution.route = Route::TwoHop { token_in, intermediate, token_out, fee_leg1: fee, fee_leg2: fee };
                    resolution.legs = self.load_legs(provider, (leg1, leg2), token_in, intermediate, token_out, fee).await;
                }
                None => {
                    log::info!("no viable route for {:?} -> {:?} fee {}", token_in, token_out, fee);
                    resolution.liquidity = Liquidity::Illiquid;
                }
            },
        }
        Ok(resolution)
    }

    /// Candidate legs are looked up concurrently; the winner is still chosen in list order.
    async fn first_viable<P: ChainStateProvider>(
        &self,
        provider: &P,
        token_in: Address,
        token_out: Address,
        fee: FeeTier,
    ) -> Option<(Address, Address, Address)> {
        let candidates: Vec<Address> =
            self.candidates.iter().copied().filter(|c| *c != token_in && *c != token_out).collect();

        let lookups = join_all(candidates.iter().map(|c| async move {
            let legs = tokio::try_join!(
                provider.get_pool_address(token_in, *c, fee),
                provider.get_pool_address(*c, token_out, fee),
            );
            match legs {
                Ok((leg1, leg2)) if !leg1.is_zero() && !leg2.is_zero() => Some((*c, leg1, leg2)),
                Ok(_) => None,
                Err(e) => {
                    log::warn!("candidate {:?} lookup failed, treating as absent: {}", c, e);
                    None
                }
            }
        }))
        .await;

        lookups.into_iter().flatten().next()
    }

    async fn load_legs<P: ChainStateProvider>(
        &self,
        provider: &P,
        (leg1, leg2): (Address, Address),
        token_in: Address,
        intermediate: Address,
        token_out: Address,
        fee: FeeTier,
    ) -> Option<(PoolSnapshot, PoolSnapshot)> {
        match tokio::try_join!(provider.get_pool_state(leg1), provider.get_pool_state(leg2)) {
            Ok((s1, s2)) => Some((
                PoolSnapshot::from_state(leg1, fee, token_in, intermediate, s1),
                PoolSnapshot::from_state(leg2, fee, intermediate, token_out, s2),
            )),
            Err(e) => {
                log::warn!("two-hop leg state unavailable: {}", e);
                None
            }
        }
    }
}
