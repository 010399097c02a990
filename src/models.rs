use ethers::types::{Address, U256};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

// ------------------------------- Fee tiers -----------------------------------

/// Swap-fee levels, each with its own pool per token pair (hundredths of a bip).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FeeTier {
    Lowest, // 0.01%
    Low,    // 0.05%
    Medium, // 0.30%
    High,   // 1.00%
}

impl FeeTier {
    /// Query order used by the tier overview (deepest fee first, like the factory UI).
    pub const ALL: [FeeTier; 4] = [FeeTier::High, FeeTier::Medium, FeeTier::Low, FeeTier::Lowest];

    pub fn as_u32(self) -> u32 {
        match self {
            FeeTier::Lowest => 100,
            FeeTier::Low => 500,
            FeeTier::Medium => 3000,
            FeeTier::High => 10000,
        }
    }

    pub fn from_u32(fee: u32) -> Option<Self> {
        match fee {
            100 => Some(FeeTier::Lowest),
            500 => Some(FeeTier::Low),
            3000 => Some(FeeTier::Medium),
            10000 => Some(FeeTier::High),
            _ => None,
        }
    }

    /// Factory defaults. A live chain answers `feeAmountTickSpacing` authoritatively.
    pub fn default_tick_spacing(self) -> i32 {
        match self {
            FeeTier::Lowest => 1,
            FeeTier::Low => 10,
            FeeTier::Medium => 60,
            FeeTier::High => 200,
        }
    }
}

impl std::fmt::Display for FeeTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_u32())
    }
}

// --------------------------- Canonical ordering ------------------------------

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TokenSide {
    Token0,
    Token1,
}

/// Protocol-canonical `(token0, token1)` ordering of a caller's `(input, output)` pair.
///
/// Built once per pool lookup; every orientation decision downstream reads
/// `input_is_token0` instead of comparing addresses again.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct OrderedPair {
    pub token0: Address,
    pub token1: Address,
    pub input_is_token0: bool,
}

impl OrderedPair {
    /// Address-sorted ordering. The factory sorts the same way, so this agrees with
    /// the pool's `token0()` for any pool it created.
    pub fn new(input: Address, output: Address) -> Self {
        if input < output {
            Self { token0: input, token1: output, input_is_token0: true }
        } else {
            Self { token0: output, token1: input, input_is_token0: false }
        }
    }

    /// Ordering as reported by the pool itself.
    pub fn from_pool_token0(input: Address, output: Address, token0: Address) -> Self {
        if token0 == input {
            Self { token0: input, token1: output, input_is_token0: true }
        } else {
            Self { token0: output, token1: input, input_is_token0: false }
        }
    }

    pub fn input(&self) -> Address {
        if self.input_is_token0 { self.token0 } else { self.token1 }
    }

    pub fn output(&self) -> Address {
        if self.input_is_token0 { self.token1 } else { self.token0 }
    }

    pub fn side_of(&self, token: Address) -> Option<TokenSide> {
        if token == self.token0 {
            Some(TokenSide::Token0)
        } else if token == self.token1 {
            Some(TokenSide::Token1)
        } else {
            None
        }
    }

    /// Prices in this crate are quoted as "input per output" (1 output = X input).
    /// The raw pool price is token1 per token0, so token0 is the quote token exactly
    /// when it is the input.
    pub fn token0_is_quote(&self) -> bool {
        self.input_is_token0
    }
}

// ------------------------------- Pool state ----------------------------------

/// Raw pool state as read from chain (slot0 + liquidity + immutables).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolState {
    pub token0: Address,
    pub sqrt_price_x96: U256,
    pub tick: i32,
    pub liquidity: u128,
    pub tick_spacing: i32,
}

/// Pool state normalised against the caller's token pair.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct PoolSnapshot {
    pub address: Address,
    pub fee_tier: FeeTier,
    pub pair: OrderedPair,
    pub sqrt_price_x96: U256,
    pub tick: i32,
    pub liquidity: u128,
    pub tick_spacing: i32,
}

impl PoolSnapshot {
    pub fn from_state(address: Address, fee_tier: FeeTier, input: Address, output: Address, state: PoolState) -> Self {
        Self {
            address,
            fee_tier,
            pair: OrderedPair::from_pool_token0(input, output, state.token0),
            sqrt_price_x96: state.sqrt_price_x96,
            tick: state.tick,
            liquidity: state.liquidity,
            tick_spacing: state.tick_spacing,
        }
    }

    /// Spot price as input-token per output-token. `Some(0.0)` means an uninitialised pool.
    pub fn price_in_per_out(&self) -> Option<f64> {
        crate::math::fixed_point::price_from_sqrt_x96(self.sqrt_price_x96, self.pair.token0_is_quote())
    }

    /// Raw token1-per-token0 price (the space ticks live in).
    pub fn raw_price(&self) -> f64 {
        crate::math::fixed_point::price_from_sqrt_x96(self.sqrt_price_x96, false).unwrap_or(0.0)
    }
}

// ------------------------------- Ranges --------------------------------------

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TickRange {
    pub tick_lower: i32,
    pub tick_upper: i32,
}

// --------------------------- Derived fields ----------------------------------

/// A derived output that may be independently unavailable (provider failure,
/// missing pool, reverted simulation) without aborting its siblings.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub enum Derived<T> {
    Ready(T),
    Unavailable(String),
}

impl<T> Derived<T> {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Derived::Unavailable(reason.into())
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Derived::Ready(_))
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            Derived::Ready(v) => Some(v),
            Derived::Unavailable(_) => None,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Derived<U> {
        match self {
            Derived::Ready(v) => Derived::Ready(f(v)),
            Derived::Unavailable(r) => Derived::Unavailable(r),
        }
    }
}

impl<T, E: std::fmt::Display> From<Result<T, E>> for Derived<T> {
    fn from(res: Result<T, E>) -> Self {
        match res {
            Ok(v) => Derived::Ready(v),
            Err(e) => Derived::Unavailable(e.to_string()),
        }
    }
}
