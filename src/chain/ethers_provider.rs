use ethers::contract::{abigen, ContractError, Multicall, MulticallError};
use ethers::prelude::*;
use ethers::providers::{Http, Provider};
use std::sync::Arc;

use crate::chain::provider::{ChainError, ChainStateProvider};
use crate::models::{FeeTier, PoolState};

abigen!(
    UniswapV3Factory,
    r#"[
        function getPool(address tokenA, address tokenB, uint24 fee) external view returns (address pool)
        function feeAmountTickSpacing(uint24 fee) external view returns (int24)
    ]"#
);

abigen!(
    UniswapV3Pool,
    r#"[
        function slot0() external view returns (uint160 sqrtPriceX96, int24 tick, uint16 observationIndex, uint16 observationCardinality, uint16 observationCardinalityNext, uint8 feeProtocol, bool unlocked)
        function liquidity() external view returns (uint128)
        function token0() external view returns (address)
        function tickSpacing() external view returns (int24)
    ]"#
);

abigen!(
    Erc20,
    r#"[
        function balanceOf(address account) external view returns (uint256)
        function symbol() external view returns (string)
        function decimals() external view returns (uint8)
    ]"#
);

abigen!(
    QuoterV2,
    r#"[
        struct QuoteExactInputSingleParams { address tokenIn; address tokenOut; uint256 amountIn; uint24 fee; uint160 sqrtPriceLimitX96; }
        function quoteExactInputSingle(QuoteExactInputSingleParams params) external returns (uint256 amountOut, uint160 sqrtPriceX96After, uint32 initializedTicksCrossed, uint256 gasEstimate)
        function quoteExactInput(bytes path, uint256 amountIn) external returns (uint256 amountOut, uint160[] sqrtPriceX96AfterList, uint32[] initializedTicksCrossedList, uint256 gasEstimate)
    ]"#
);

type Slot0 = (U256, i32, u16, u16, u16, u8, bool);

pub fn create_provider(rpc_url: &str) -> Result<Arc<Provider<Http>>, Box<dyn std::error::Error>> {
    let provider = Provider::<Http>::try_from(rpc_url)?;
    Ok(Arc::new(provider))
}

fn contract_err<M: Middleware>(e: ContractError<M>) -> ChainError {
    if e.is_revert() {
        ChainError::Reverted(e.to_string())
    } else {
        ChainError::Rpc(e.to_string())
    }
}

fn multicall_err<M: Middleware>(e: MulticallError<M>) -> ChainError {
    ChainError::Rpc(e.to_string())
}

/// JSON-RPC backed provider over the v3 factory, pools, ERC20s and QuoterV2.
///
/// With a multicall address, the pool-state reads of one lookup go out as a single
/// aggregate call; otherwise they are issued concurrently.
pub struct EthersChainProvider<M> {
    client: Arc<M>,
    factory: UniswapV3Factory<M>,
    quoter: QuoterV2<M>,
    multicall: Option<Address>,
}

impl<M: Middleware + 'static> EthersChainProvider<M> {
    pub fn new(client: Arc<M>, factory: Address, quoter: Address, multicall: Option<Address>) -> Self {
        Self {
            factory: UniswapV3Factory::new(factory, client.clone()),
            quoter: QuoterV2::new(quoter, client.clone()),
            client,
            multicall,
        }
    }

    async fn pool_state_multicall(&self, pool: &UniswapV3Pool<M>, multicall_addr: Address) -> Result<PoolState, ChainError> {
        let mut mc = Multicall::new(self.client.clone(), Some(multicall_addr)).await.map_err(multicall_err)?;
        mc.add_call(pool.slot_0(), false);
        mc.add_call(pool.liquidity(), false);
        mc.add_call(pool.token_0(), false);
        mc.add_call(pool.tick_spacing(), false);
        let (slot0, liquidity, token0, tick_spacing): (Slot0, u128, Address, i32) =
            mc.call().await.map_err(multicall_err)?;
        Ok(PoolState { token0, sqrt_price_x96: slot0.0, tick: slot0.1, liquidity, tick_spacing })
    }

    async fn pool_state_joined(&self, pool: &UniswapV3Pool<M>) -> Result<PoolState, ChainError> {
        let slot0_call = pool.slot_0();
        let liquidity_call = pool.liquidity();
        let token0_call = pool.token_0();
        let spacing_call = pool.tick_spacing();
        let (slot0, liquidity, token0, tick_spacing) = tokio::try_join!(
            slot0_call.call(),
            liquidity_call.call(),
            token0_call.call(),
            spacing_call.call()
        )
        .map_err(contract_err)?;
        Ok(PoolState { token0, sqrt_price_x96: slot0.0, tick: slot0.1, liquidity, tick_spacing })
    }
}

impl<M: Middleware + 'static> ChainStateProvider for EthersChainProvider<M> {
    async fn get_pool_address(&self, token_a: Address, token_b: Address, fee: FeeTier) -> Result<Address, ChainError> {
        self.factory.get_pool(token_a, token_b, fee.as_u32()).call().await.map_err(contract_err)
    }

    async fn get_pool_state(&self, pool: Address) -> Result<PoolState, ChainError> {
        let contract = UniswapV3Pool::new(pool, self.client.clone());
        let state = match self.multicall {
            Some(mc) => self.pool_state_multicall(&contract, mc).await?,
            None => self.pool_state_joined(&contract).await?,
        };
        log::debug!(
            "pool {:?}: sqrtPriceX96={} tick={} liquidity={}",
            pool,
            state.sqrt_price_x96,
            state.tick,
            state.liquidity
        );
        Ok(state)
    }

    async fn get_token_reserve(&self, token: Address, pool: Address) -> Result<U256, ChainError> {
        self.get_token_balance(token, pool).await
    }

    async fn get_token_symbol(&self, token: Address) -> Result<String, ChainError> {
        Erc20::new(token, self.client.clone()).symbol().call().await.map_err(contract_err)
    }

    async fn get_token_decimals(&self, token: Address) -> Result<u8, ChainError> {
        Erc20::new(token, self.client.clone()).decimals().call().await.map_err(contract_err)
    }

    async fn get_token_balance(&self, token: Address, owner: Address) -> Result<U256, ChainError> {
        Erc20::new(token, self.client.clone()).balance_of(owner).call().await.map_err(contract_err)
    }

    async fn quote_exact_input_single(
        &self,
        token_in: Address,
        token_out: Address,
        fee: FeeTier,
        amount_in: U256,
    ) -> Result<(U256, U256), ChainError> {
        let params = QuoteExactInputSingleParams {
            token_in,
            token_out,
            amount_in,
            fee: fee.as_u32(),
            sqrt_price_limit_x96: U256::zero(),
        };
        let (amount_out, sqrt_after, _ticks, _gas) =
            self.quoter.quote_exact_input_single(params).call().await.map_err(contract_err)?;
        Ok((amount_out, sqrt_after))
    }

    async fn quote_exact_input(&self, path: Bytes, amount_in: U256) -> Result<(U256, Vec<U256>), ChainError> {
        let (amount_out, sqrt_after_list, _ticks, _gas) =
            self.quoter.quote_exact_input(path, amount_in).call().await.map_err(contract_err)?;
        Ok((amount_out, sqrt_after_list))
    }

    async fn tick_spacing_for_fee(&self, fee: FeeTier) -> Result<i32, ChainError> {
        let spacing = self.factory.fee_amount_tick_spacing(fee.as_u32()).call().await.map_err(contract_err)?;
        if spacing <= 0 {
            return Err(ChainError::UnsupportedFee(fee.as_u32()));
        }
        Ok(spacing)
    }
}
