//! Criterion benchmarks for CallLab hot paths.
//!
//! Benchmarks:
//! 1. Exit resolution over a long candle series (the replay inner loop)
//! 2. Full capital simulation over a synthetic alert stream
//! 3. Policy executor across the four policy kinds

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use calllab_core::config::SimulatorConfig;
use calllab_core::domain::{CallId, CallRecord, Candle, ExitPolicy, LadderLevel};
use calllab_core::exec::execute_policy;
use calllab_core::replay::{resolve_exit, ExitBounds, HorizonAction};
use calllab_core::simulator::simulate_capital;
use calllab_core::sources::StaticCandleProvider;
use chrono::{TimeZone, Utc};

// ── Helpers ──────────────────────────────────────────────────────────

fn make_candles(n: usize, start_secs: i64) -> Vec<Candle> {
    (0..n)
        .map(|i| {
            let close = 1.0 + (i as f64 * 0.05).sin() * 0.3;
            Candle {
                ts_secs: start_secs + i as i64 * 60,
                open: close,
                high: close * 1.02,
                low: close * 0.98,
                close,
                volume: 50_000.0,
            }
        })
        .collect()
}

fn make_calls(n: usize) -> (Vec<CallRecord>, StaticCandleProvider) {
    let base = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    let mut provider = StaticCandleProvider::default();
    let calls = (0..n)
        .map(|i| {
            let id = CallId::new(format!("call-{i}"));
            let created_at = base + chrono::Duration::minutes(i as i64 * 15);
            provider.insert(id.clone(), make_candles(2_880, created_at.timestamp()));
            CallRecord {
                id,
                mint: format!("mint-{i}"),
                caller: format!("caller-{}", i % 5),
                created_at,
            }
        })
        .collect();
    (calls, provider)
}

// ── 1. Exit resolution ───────────────────────────────────────────────

fn bench_resolve_exit(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve_exit");
    for n in [1_440usize, 2_880, 10_080] {
        let candles = make_candles(n, 0);
        let bounds = ExitBounds {
            tp_mult: Some(2.0),
            sl_mult: Some(0.5),
            max_hold_ts_ms: i64::MAX,
        };
        group.bench_with_input(BenchmarkId::from_parameter(n), &candles, |b, candles| {
            b.iter(|| {
                resolve_exit(
                    black_box(candles),
                    0,
                    1.0,
                    &bounds,
                    i64::MAX,
                    HorizonAction::CloseAtLast,
                )
            })
        });
    }
    group.finish();
}

// ── 2. Full capital simulation ───────────────────────────────────────

fn bench_simulate_capital(c: &mut Criterion) {
    let mut group = c.benchmark_group("simulate_capital");
    group.sample_size(20);
    for n in [50usize, 200] {
        let (calls, provider) = make_calls(n);
        let policy = ExitPolicy::FixedStop { tp_mult: 2.0, sl_mult: 0.85, max_hold_hrs: 24.0 };
        let config = SimulatorConfig::default();
        group.bench_with_input(BenchmarkId::from_parameter(n), &calls, |b, calls| {
            b.iter(|| simulate_capital(black_box(calls), &provider, &policy, &config).unwrap())
        });
    }
    group.finish();
}

// ── 3. Policy executor ───────────────────────────────────────────────

fn bench_execute_policy(c: &mut Criterion) {
    let (calls, provider) = make_calls(1);
    let call = &calls[0];
    let candles = {
        use calllab_core::sources::CandleProvider;
        provider.candles(&call.id)
    };
    let config = SimulatorConfig::default();
    let policies = [
        ("fixed_stop", ExitPolicy::FixedStop { tp_mult: 2.0, sl_mult: 0.85, max_hold_hrs: 24.0 }),
        ("time_stop", ExitPolicy::TimeStop { max_hold_hrs: 24.0 }),
        ("trailing", ExitPolicy::TrailingStop { trail_frac: 0.2, max_hold_hrs: 24.0 }),
        (
            "ladder",
            ExitPolicy::Ladder {
                levels: vec![
                    LadderLevel { trigger_mult: 1.5, fraction: 0.5 },
                    LadderLevel { trigger_mult: 2.0, fraction: 0.5 },
                ],
                sl_mult: 0.5,
                max_hold_hrs: 24.0,
            },
        ),
    ];

    let mut group = c.benchmark_group("execute_policy");
    for (name, policy) in &policies {
        group.bench_function(*name, |b| {
            b.iter(|| execute_policy(black_box(call), &candles, policy, &config))
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_resolve_exit,
    bench_simulate_capital,
    bench_execute_policy
);
criterion_main!(benches);
