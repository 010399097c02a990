use std::sync::Arc;
use std::time::Duration;

use clmm_quote_engine::chain::memory::InMemoryChain;
use clmm_quote_engine::engine::debounce::{DebouncedRecompute, Generation, LatestSlot};
use clmm_quote_engine::engine::router::RouteResolver;
use clmm_quote_engine::engine::service::{run_swap_pass, QuoteSettings, SwapInputs, SwapState};
use clmm_quote_engine::math::tick_math::Q96_U128;
use clmm_quote_engine::models::{Derived, FeeTier};
use ethers::types::{Address, U256};

fn addr(x: u8) -> Address {
    Address::from([x; 20])
}

fn liquid_chain() -> Arc<InMemoryChain> {
    let (a, b, pool) = (addr(1), addr(2), addr(0xd0));
    let mut chain = InMemoryChain::new();
    chain
        .add_pool(a, b, FeeTier::High, pool, U256::from(Q96_U128), 1_000_000)
        .set_balance(a, pool, U256::exp10(21))
        .set_balance(b, pool, U256::exp10(21))
        .script_single_quote(a, b, FeeTier::High, U256::exp10(18), U256::from(Q96_U128));
    Arc::new(chain)
}

fn inputs(amount_in: f64) -> SwapInputs {
    SwapInputs { token_in: addr(1), token_out: addr(2), fee: FeeTier::High, amount_in }
}

fn on_input(recompute: &mut DebouncedRecompute<(f64, SwapState)>, chain: &Arc<InMemoryChain>, amount_in: f64) -> u64 {
    let chain = chain.clone();
    recompute.on_input(async move {
        let resolver = RouteResolver::new(vec![]);
        let state = run_swap_pass(&*chain, &resolver, inputs(amount_in), &QuoteSettings::default()).await;
        (amount_in, state)
    })
}

#[tokio::test(start_paused = true)]
async fn test_burst_of_inputs_runs_one_pass() {
    let chain = liquid_chain();
    let mut recompute = DebouncedRecompute::new(Duration::from_millis(700));

    let mut last = 0;
    for amount in [1.0, 12.0, 123.0] {
        last = on_input(&mut recompute, &chain, amount);
        tokio::time::sleep(Duration::from_millis(150)).await;
    }
    assert_eq!(chain.quote_calls(), 0);
    assert!(recompute.latest().is_none());
    assert!(recompute.is_pending());

    tokio::time::sleep(Duration::from_millis(700)).await;
    assert_eq!(chain.quote_calls(), 1);
    let (token, (amount_in, state)) = recompute.latest().unwrap();
    assert_eq!(token, last);
    assert_eq!(amount_in, 123.0);
    assert_eq!(state.amount_out, Derived::Ready(1.0));
    assert_eq!(state.exchange_rate, Derived::Ready(1.0));
}

#[tokio::test(start_paused = true)]
async fn test_spaced_inputs_each_recompute() {
    let chain = liquid_chain();
    let mut recompute = DebouncedRecompute::new(Duration::from_millis(300));

    on_input(&mut recompute, &chain, 5.0);
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(recompute.latest().map(|(_, (a, _))| a), Some(5.0));

    on_input(&mut recompute, &chain, 6.0);
    tokio::time::sleep(Duration::from_millis(100)).await;
    // the earlier result stays visible until the new pass settles
    assert_eq!(recompute.latest().map(|(_, (a, _))| a), Some(5.0));
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(recompute.latest().map(|(_, (a, _))| a), Some(6.0));
    assert_eq!(chain.quote_calls(), 2);
}

#[tokio::test]
async fn test_superseded_pass_result_is_dropped() {
    let chain = liquid_chain();
    let resolver = RouteResolver::new(vec![]);
    let generation = Generation::new();
    let latest = LatestSlot::new();

    let slow = generation.next();
    let fast = generation.next();

    let fresh = run_swap_pass(&*chain, &resolver, inputs(2.0), &QuoteSettings::default()).await;
    assert!(latest.publish(&generation, fast, fresh.clone()));

    // the older pass finishes last
    let stale = run_swap_pass(&*chain, &resolver, inputs(1.0), &QuoteSettings::default()).await;
    assert!(!latest.publish(&generation, slow, stale));
    assert_eq!(latest.get(), Some(fresh));
}
