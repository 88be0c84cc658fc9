//! Integration tests: alert stream in, capital simulation result out,
//! exercised through the public seams (call source, candle cache).

use chrono::{TimeZone, Utc};
use calllab_core::config::{FeeConfig, SimulatorConfig};
use calllab_core::domain::{CallId, CallRecord, Candle, ExitPolicy, ExitReason};
use calllab_core::simulator::simulate_capital;
use calllab_core::sources::{
    CallCriteria, CallSource, CandleCache, CandleProvider, StaticCallSource,
    StaticCandleProvider,
};
use calllab_core::truth::compute_path_metrics;

fn call(id: &str, hour: u32) -> CallRecord {
    CallRecord {
        id: CallId::new(id),
        mint: format!("mint-{id}"),
        caller: "alpha".into(),
        created_at: Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap(),
    }
}

fn candle(ts_secs: i64, high: f64, low: f64, close: f64) -> Candle {
    Candle { ts_secs, open: close, high, low, close, volume: 1_000.0 }
}

fn hourly_path(start: &CallRecord, bars: &[(f64, f64, f64)]) -> Vec<Candle> {
    let start_secs = start.created_at_ms() / 1000;
    bars.iter()
        .enumerate()
        .map(|(h, &(high, low, close))| candle(start_secs + h as i64 * 3_600, high, low, close))
        .collect()
}

fn fixed_policy() -> ExitPolicy {
    ExitPolicy::FixedStop { tp_mult: 2.0, sl_mult: 0.85, max_hold_hrs: 24.0 }
}

#[test]
fn end_to_end_through_source_and_cache() {
    let c1 = call("c1", 0); // doubles in hour 2
    let c2 = call("c2", 1); // stops out in hour 1
    let c3 = call("c3", 2); // drifts, time exit at hold cap

    let mut provider = StaticCandleProvider::default();
    provider.insert(
        c1.id.clone(),
        hourly_path(&c1, &[(1.0, 1.0, 1.0), (1.5, 1.0, 1.4), (2.2, 1.3, 2.1)]),
    );
    provider.insert(
        c2.id.clone(),
        hourly_path(&c2, &[(1.0, 1.0, 1.0), (1.0, 0.7, 0.8)]),
    );
    let mut flat = vec![(1.0, 1.0, 1.0); 30];
    flat[10] = (1.3, 1.0, 1.2);
    provider.insert(c3.id.clone(), hourly_path(&c3, &flat));

    let source = StaticCallSource::new(vec![c3.clone(), c1.clone(), c2.clone()]);
    let calls = source.list_calls(&CallCriteria::default());
    let cache = CandleCache::new(&provider);

    let config = SimulatorConfig::default();
    let result = simulate_capital(&calls, &cache, &fixed_policy(), &config).unwrap();

    assert_eq!(result.trades_executed, 3);
    assert_eq!(result.trades_skipped, 0);
    assert_eq!(cache.len(), 3);

    let by_id = |id: &str| {
        result
            .completed_trades
            .iter()
            .find(|t| t.call_id == CallId::new(id))
            .unwrap()
    };

    // Exactness: TP fills at exactly tp_mult, SL at exactly sl_mult,
    // time exits at close/entry.
    assert_eq!(by_id("c1").exit_mult, 2.0);
    assert_eq!(by_id("c1").exit_reason, ExitReason::TakeProfit);
    assert_eq!(by_id("c2").exit_mult, 0.85);
    assert_eq!(by_id("c2").exit_reason, ExitReason::StopLoss);
    assert_eq!(by_id("c3").exit_reason, ExitReason::TimeExit);
    assert!((by_id("c3").exit_mult - 1.0).abs() < 1e-12);

    // Capital identity: final = initial + sum of net pnl.
    let net: f64 = result.completed_trades.iter().map(|t| t.pnl).sum();
    assert!((result.final_capital - (config.initial_capital + net)).abs() < 1e-9);
    assert!((result.total_return - net / config.initial_capital).abs() < 1e-12);
}

#[test]
fn default_config_take_profit_numbers() {
    // 10_000 capital, sl 0.85, risk 200, alloc 4%:
    // size = min(200/0.15, 400, 10_000) = 400.
    // TP at 2x: gross 400, fee 400 * 0.008 = 3.2, net 396.8.
    let c = call("c1", 0);
    let mut provider = StaticCandleProvider::default();
    provider.insert(
        c.id.clone(),
        hourly_path(&c, &[(1.0, 1.0, 1.0), (2.5, 1.0, 2.2)]),
    );

    let config = SimulatorConfig::default();
    assert_eq!(config.fees, FeeConfig { taker_fee_bps: 30.0, slippage_bps: 10.0 });

    let result = simulate_capital(&[c], &provider, &fixed_policy(), &config).unwrap();
    let trade = &result.completed_trades[0];
    assert!((trade.size_usd - 400.0).abs() < 1e-9);
    assert!((trade.gross_pnl - 400.0).abs() < 1e-9);
    assert!((trade.fee - 3.2).abs() < 1e-9);
    assert!((trade.pnl - 396.8).abs() < 1e-9);
    assert!((result.final_capital - 10_396.8).abs() < 1e-9);
}

#[test]
fn empty_series_counts_nowhere_and_truth_row_is_untradeable() {
    let c = call("c1", 0);
    let provider = StaticCandleProvider::default();
    let config = SimulatorConfig::default();

    let result = simulate_capital(
        std::slice::from_ref(&c),
        &provider,
        &fixed_policy(),
        &config,
    )
    .unwrap();
    assert_eq!(result.trades_executed, 0);
    assert_eq!(result.trades_skipped, 0);
    assert_eq!(result.skip_counts.no_data, 1);
    assert_eq!(result.skip_counts.total(), 1);

    let row = compute_path_metrics(&c, &provider.candles(&c.id), &config);
    assert!(!row.tradeable);
}

#[test]
fn zero_capacity_config_executes_nothing() {
    let c = call("c1", 0);
    let mut provider = StaticCandleProvider::default();
    provider.insert(c.id.clone(), hourly_path(&c, &[(2.5, 1.0, 2.0)]));

    let config = SimulatorConfig { max_concurrent_positions: 0, ..Default::default() };
    let result = simulate_capital(&[c], &provider, &fixed_policy(), &config).unwrap();
    assert_eq!(result.trades_executed, 0);
    assert_eq!(result.final_capital, config.initial_capital);
    assert_eq!(result.skip_counts.capacity, 1);
    assert_eq!(result.skip_counts.total(), 1);
}

#[test]
fn capital_drawdown_throttles_later_sizing() {
    // A string of stop-outs shrinks free cash, so allocation-capped sizes
    // shrink monotonically with it.
    let calls: Vec<CallRecord> = (0..5).map(|i| call(&format!("c{i}"), i * 2)).collect();
    let mut provider = StaticCandleProvider::default();
    for c in &calls {
        provider.insert(
            c.id.clone(),
            hourly_path(c, &[(1.0, 1.0, 1.0), (1.0, 0.5, 0.6)]),
        );
    }
    // Risk cap far above the allocation cap so the alloc term binds.
    let config = SimulatorConfig { max_risk_per_trade: 1.0e9, ..Default::default() };
    let result = simulate_capital(&calls, &provider, &fixed_policy(), &config).unwrap();

    assert_eq!(result.trades_executed, 5);
    for pair in result.completed_trades.windows(2) {
        assert!(pair[1].size_usd < pair[0].size_usd);
    }
    assert!(result.final_capital < config.initial_capital);
    assert!(result.final_state.free_cash >= 0.0);
}

#[test]
fn alert_ties_resolve_by_call_id() {
    let a = call("a", 0);
    let b = call("b", 0);
    let mut provider = StaticCandleProvider::default();
    for c in [&a, &b] {
        // Flat at the alert, TP an hour later: the winner still holds the
        // slot when the tying alert is processed.
        provider.insert(
            c.id.clone(),
            hourly_path(c, &[(1.0, 1.0, 1.0), (2.5, 1.0, 2.0)]),
        );
    }
    // One slot: with a timestamp tie, call id "a" must win the slot.
    let config = SimulatorConfig { max_concurrent_positions: 1, ..Default::default() };
    let result = simulate_capital(&[b, a], &provider, &fixed_policy(), &config).unwrap();
    assert_eq!(result.trades_executed, 1);
    assert_eq!(result.completed_trades[0].call_id, CallId::new("a"));
    assert_eq!(result.skip_counts.capacity, 1);
}
