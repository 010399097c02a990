// Deterministic in-process chain: pools, balances and scripted quoter answers.
// Backs the test suite and offline previews; every read is a map lookup.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use ethers::types::{Address, Bytes, U256};

use crate::chain::provider::{ChainError, ChainStateProvider};
use crate::math::tick_math::get_tick_at_sqrt_ratio;
use crate::math::units::u256_to_bigint;
use crate::models::{FeeTier, PoolState};

type PairKey = (Address, Address, FeeTier);

fn pair_key(a: Address, b: Address, fee: FeeTier) -> PairKey {
    if a < b { (a, b, fee) } else { (b, a, fee) }
}

#[derive(Default)]
pub struct InMemoryChain {
    pools: HashMap<PairKey, Address>,
    states: HashMap<Address, PoolState>,
    balances: HashMap<(Address, Address), U256>,
    symbols: HashMap<Address, String>,
    decimals: HashMap<Address, u8>,
    single_quotes: HashMap<(Address, Address, FeeTier), (U256, U256)>,
    path_quotes: HashMap<Bytes, (U256, Vec<U256>)>,
    failing_pairs: HashSet<PairKey>,
    failing_pools: HashSet<Address>,
    quote_calls: AtomicUsize,
}

impl InMemoryChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pool and its state. Tick comes from the sqrt price, token0 from address order.
    pub fn add_pool(
        &mut self,
        token_a: Address,
        token_b: Address,
        fee: FeeTier,
        pool: Address,
        sqrt_price_x96: U256,
        liquidity: u128,
    ) -> &mut Self {
        let key = pair_key(token_a, token_b, fee);
        let tick = if sqrt_price_x96.is_zero() { 0 } else { get_tick_at_sqrt_ratio(&u256_to_bigint(sqrt_price_x96)) };
        self.pools.insert(key, pool);
        self.states.insert(
            pool,
            PoolState {
                token0: key.0,
                sqrt_price_x96,
                tick,
                liquidity,
                tick_spacing: fee.default_tick_spacing(),
            },
        );
        self
    }

    pub fn set_balance(&mut self, token: Address, owner: Address, amount: U256) -> &mut Self {
        self.balances.insert((token, owner), amount);
        self
    }

    pub fn set_token(&mut self, token: Address, symbol: &str, decimals: u8) -> &mut Self {
        self.symbols.insert(token, symbol.to_string());
        self.decimals.insert(token, decimals);
        self
    }

    pub fn script_single_quote(
        &mut self,
        token_in: Address,
        token_out: Address,
        fee: FeeTier,
        amount_out: U256,
        sqrt_price_after: U256,
    ) -> &mut Self {
        self.single_quotes.insert((token_in, token_out, fee), (amount_out, sqrt_price_after));
        self
    }

    pub fn script_path_quote(&mut self, path: Bytes, amount_out: U256, sqrt_prices_after: Vec<U256>) -> &mut Self {
        self.path_quotes.insert(path, (amount_out, sqrt_prices_after));
        self
    }

    /// Make `get_pool_address` fail for this pair.
    pub fn fail_pair(&mut self, token_a: Address, token_b: Address, fee: FeeTier) -> &mut Self {
        self.failing_pairs.insert(pair_key(token_a, token_b, fee));
        self
    }

    /// Make state and reserve reads fail for this pool.
    pub fn fail_pool(&mut self, pool: Address) -> &mut Self {
        self.failing_pools.insert(pool);
        self
    }

    /// Number of quoter calls served so far.
    pub fn quote_calls(&self) -> usize {
        self.quote_calls.load(Ordering::SeqCst)
    }

    fn check_pool(&self, pool: Address) -> Result<(), ChainError> {
        if self.failing_pools.contains(&pool) {
            return Err(ChainError::Rpc(format!("pool {:?} unreachable", pool)));
        }
        Ok(())
    }
}

impl ChainStateProvider for InMemoryChain {
    async fn get_pool_address(&self, token_a: Address, token_b: Address, fee: FeeTier) -> Result<Address, ChainError> {
        let key = pair_key(token_a, token_b, fee);
        if self.failing_pairs.contains(&key) {
            return Err(ChainError::Rpc("getPool failed".to_string()));
        }
        Ok(self.pools.get(&key).copied().unwrap_or_else(Address::zero))
    }

    async fn get_pool_state(&self, pool: Address) -> Result<PoolState, ChainError> {
        self.check_pool(pool)?;
        self.states
            .get(&pool)
            .cloned()
            .ok_or_else(|| ChainError::Decode(format!("no contract at {:?}", pool)))
    }

    async fn get_token_reserve(&self, token: Address, pool: Address) -> Result<U256, ChainError> {
        self.check_pool(pool)?;
        Ok(self.balances.get(&(token, pool)).copied().unwrap_or_default())
    }

    async fn get_token_symbol(&self, token: Address) -> Result<String, ChainError> {
        self.symbols
            .get(&token)
            .cloned()
            .ok_or_else(|| ChainError::Decode(format!("no symbol for {:?}", token)))
    }

    async fn get_token_decimals(&self, token: Address) -> Result<u8, ChainError> {
        Ok(self.decimals.get(&token).copied().unwrap_or(18))
    }

    async fn get_token_balance(&self, token: Address, owner: Address) -> Result<U256, ChainError> {
        Ok(self.balances.get(&(token, owner)).copied().unwrap_or_default())
    }

    async fn quote_exact_input_single(
        &self,
        token_in: Address,
        token_out: Address,
        fee: FeeTier,
        _amount_in: U256,
    ) -> Result<(U256, U256), ChainError> {
        self.quote_calls.fetch_add(1, Ordering::SeqCst);
        self.single_quotes
            .get(&(token_in, token_out, fee))
            .copied()
            .ok_or_else(|| ChainError::Reverted("SPL".to_string()))
    }

    async fn quote_exact_input(&self, path: Bytes, _amount_in: U256) -> Result<(U256, Vec<U256>), ChainError> {
        self.quote_calls.fetch_add(1, Ordering::SeqCst);
        self.path_quotes
            .get(&path)
            .cloned()
            .ok_or_else(|| ChainError::Reverted("SPL".to_string()))
    }

    async fn tick_spacing_for_fee(&self, fee: FeeTier) -> Result<i32, ChainError> {
        Ok(fee.default_tick_spacing())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::tick_math::Q96_U128;

    fn addr(x: u8) -> Address { Address::from([x; 20]) }

    #[tokio::test]
    async fn test_pool_lookup_is_order_independent() {
        let mut chain = InMemoryChain::new();
        chain.add_pool(addr(2), addr(1), FeeTier::Medium, addr(0xaa), U256::from(Q96_U128), 10);

        assert_eq!(chain.get_pool_address(addr(1), addr(2), FeeTier::Medium).await, Ok(addr(0xaa)));
        assert_eq!(chain.get_pool_address(addr(2), addr(1), FeeTier::Medium).await, Ok(addr(0xaa)));
        assert_eq!(chain.get_pool_address(addr(1), addr(2), FeeTier::Low).await, Ok(Address::zero()));

        let state = chain.get_pool_state(addr(0xaa)).await.unwrap();
        assert_eq!(state.token0, addr(1));
        assert_eq!(state.tick, 0);
        assert_eq!(state.tick_spacing, 60);
    }

    #[tokio::test]
    async fn test_failures_and_scripts() {
        let mut chain = InMemoryChain::new();
        chain
            .fail_pair(addr(1), addr(2), FeeTier::High)
            .script_single_quote(addr(1), addr(2), FeeTier::Low, U256::from(7u8), U256::from(Q96_U128));

        assert!(chain.get_pool_address(addr(2), addr(1), FeeTier::High).await.is_err());
        assert_eq!(
            chain.quote_exact_input_single(addr(1), addr(2), FeeTier::Low, U256::one()).await,
            Ok((U256::from(7u8), U256::from(Q96_U128)))
        );
        assert!(matches!(
            chain.quote_exact_input_single(addr(2), addr(1), FeeTier::Low, U256::one()).await,
            Err(ChainError::Reverted(_))
        ));
        assert_eq!(chain.quote_calls(), 2);
    }
}
