use ethers::types::{Address, Bytes, U256};

use crate::models::{FeeTier, PoolState};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    #[error("rpc call failed: {0}")]
    Rpc(String),
    /// The call executed and reverted (quote simulations revert on insufficient liquidity).
    #[error("call reverted: {0}")]
    Reverted(String),
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("fee tier {0} is not enabled on the factory")]
    UnsupportedFee(u32),
}

/// Read-only view of the AMM contracts.
///
/// Used generically (`P: ChainStateProvider`), so implementations decide their own
/// batching. A pool that does not exist is reported as the zero address, never as an error.
#[allow(async_fn_in_trait)]
pub trait ChainStateProvider {
    async fn get_pool_address(&self, token_a: Address, token_b: Address, fee: FeeTier) -> Result<Address, ChainError>;

    async fn get_pool_state(&self, pool: Address) -> Result<PoolState, ChainError>;

    /// Pool's holdings of `token`, i.e. `balanceOf(pool)`.
    async fn get_token_reserve(&self, token: Address, pool: Address) -> Result<U256, ChainError>;

    async fn get_token_symbol(&self, token: Address) -> Result<String, ChainError>;

    async fn get_token_decimals(&self, token: Address) -> Result<u8, ChainError>;

    async fn get_token_balance(&self, token: Address, owner: Address) -> Result<U256, ChainError>;

    /// `(amount_out, sqrt_price_x96_after)`
    async fn quote_exact_input_single(
        &self,
        token_in: Address,
        token_out: Address,
        fee: FeeTier,
        amount_in: U256,
    ) -> Result<(U256, U256), ChainError>;

    /// `(amount_out, sqrt_price_x96_after per hop)` for an encoded path.
    async fn quote_exact_input(&self, path: Bytes, amount_in: U256) -> Result<(U256, Vec<U256>), ChainError>;

    async fn tick_spacing_for_fee(&self, fee: FeeTier) -> Result<i32, ChainError>;
}
