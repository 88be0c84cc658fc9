//! Policy executor — evaluates one (call, policy) pair in isolation.
//!
//! No capital, no cross-call state: every cell of a policy grid sees the
//! same calls, which keeps the grid search embarrassingly parallel. The
//! fixed-exit variants reuse the replay resolver; trailing and ladder
//! policies carry path state and get their own scan loops with the same
//! conservative intrabar ordering (stops before profits).

use serde::{Deserialize, Serialize};

use crate::config::SimulatorConfig;
use crate::domain::{CallRecord, Candle, ExitPolicy, ExitReason, LadderLevel};
use crate::replay::{
    locate_entry, resolve_exit, ExitBounds, HorizonAction, ReplayOutcome, ResolvedExit,
};

/// Outcome of one policy applied to one call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyOutcome {
    pub call_id: String,
    /// Return net of round-trip fees, in basis points of the entry size.
    pub realized_return_bps: f64,
    pub stop_out: bool,
    /// Worst decline below the entry price while the position was held,
    /// in basis points, floored at zero.
    pub max_adverse_excursion_bps: f64,
    pub time_exposed_ms: i64,
    /// Fraction of the path's peak gain the policy realized, in [0, 1].
    pub tail_capture: f64,
    /// Entry to first 2x touch within the holding window.
    pub time_to_2x_ms: Option<i64>,
    pub exit_reason: ExitReason,
}

impl PolicyOutcome {
    pub fn entered(&self) -> bool {
        self.exit_reason != ExitReason::NoEntry
    }

    fn no_entry(call: &CallRecord) -> Self {
        Self {
            call_id: call.id.to_string(),
            realized_return_bps: 0.0,
            stop_out: false,
            max_adverse_excursion_bps: 0.0,
            time_exposed_ms: 0,
            tail_capture: 0.0,
            time_to_2x_ms: None,
            exit_reason: ExitReason::NoEntry,
        }
    }
}

/// Run one policy over one call's candle series. `candles` must be
/// ascending by timestamp. Policies are assumed validated upstream.
///
/// The effective hold is the policy's `max_hold_hrs` clamped to the
/// configured trade horizon, so no outcome can out-hold the observation
/// window its peak and tail-capture stats are measured over. The capital
/// simulator applies the policy hold unclamped; a hold above the horizon
/// exits later there than here.
pub fn execute_policy(
    call: &CallRecord,
    candles: &[Candle],
    policy: &ExitPolicy,
    config: &SimulatorConfig,
) -> PolicyOutcome {
    let Some(entry) = locate_entry(candles, call.created_at_ms()) else {
        return PolicyOutcome::no_entry(call);
    };
    let hold_ms = (policy.max_hold_hrs() * 3_600_000.0) as i64;
    let max_hold_ts = entry.ts_ms + hold_ms.min(config.horizon_ms());
    let window_end = entry.ts_ms + config.horizon_ms();

    let exit = match policy {
        ExitPolicy::FixedStop { tp_mult, sl_mult, .. } => fixed_exit(
            candles,
            entry.index,
            entry.price,
            Some(*tp_mult),
            Some(*sl_mult),
            max_hold_ts,
        ),
        ExitPolicy::TimeStop { .. } => {
            fixed_exit(candles, entry.index, entry.price, None, None, max_hold_ts)
        }
        ExitPolicy::TrailingStop { trail_frac, .. } => {
            resolve_trailing(candles, entry.index, entry.price, *trail_frac, max_hold_ts)
        }
        ExitPolicy::Ladder { levels, sl_mult, .. } => {
            resolve_ladder(candles, entry.index, entry.price, levels, *sl_mult, max_hold_ts)
        }
    };

    let (peak_mult, mae_bps, time_to_2x_ms) =
        path_stats(candles, entry.index, entry.price, exit.exit_ts_ms, window_end);

    let realized_mult = exit.exit_mult;
    let realized_return_bps =
        (realized_mult - 1.0) * 10_000.0 - config.fees.round_trip_bps();
    let tail_capture = if peak_mult > 1.0 {
        ((realized_mult - 1.0) / (peak_mult - 1.0)).clamp(0.0, 1.0)
    } else {
        0.0
    };

    PolicyOutcome {
        call_id: call.id.to_string(),
        realized_return_bps,
        stop_out: exit.reason == ExitReason::StopLoss,
        max_adverse_excursion_bps: mae_bps,
        time_exposed_ms: exit.exit_ts_ms - entry.ts_ms,
        tail_capture,
        time_to_2x_ms,
        exit_reason: exit.reason,
    }
}

/// Fixed-bound exit through the shared replay resolver. A fully void
/// series resolves flat at the entry print.
fn fixed_exit(
    candles: &[Candle],
    entry_index: usize,
    entry_px: f64,
    tp_mult: Option<f64>,
    sl_mult: Option<f64>,
    max_hold_ts: i64,
) -> ResolvedExit {
    let bounds = ExitBounds { tp_mult, sl_mult, max_hold_ts_ms: max_hold_ts };
    match resolve_exit(
        candles,
        entry_index,
        entry_px,
        &bounds,
        i64::MAX,
        HorizonAction::CloseAtLast,
    ) {
        ReplayOutcome::Exit(exit) => exit,
        ReplayOutcome::Open | ReplayOutcome::NoEntry => flat_exit(candles, entry_index, entry_px),
    }
}

fn flat_exit(candles: &[Candle], entry_index: usize, entry_px: f64) -> ResolvedExit {
    ResolvedExit {
        exit_ts_ms: candles[entry_index].ts_ms(),
        exit_px: entry_px,
        exit_mult: 1.0,
        reason: ExitReason::TimeExit,
    }
}

/// Trailing stop: the stop level tracks the running high. Per candle the
/// stop is checked against the level set by prior candles before the
/// candle's own high can raise it (no foresight inside a bar).
fn resolve_trailing(
    candles: &[Candle],
    entry_index: usize,
    entry_px: f64,
    trail_frac: f64,
    max_hold_ts: i64,
) -> ResolvedExit {
    let mut peak_px = entry_px;
    let mut last_close: Option<(i64, f64)> = None;

    for candle in &candles[entry_index..] {
        if candle.is_void() {
            continue;
        }
        let trail_px = peak_px * (1.0 - trail_frac);
        if candle.low <= trail_px {
            return ResolvedExit {
                exit_ts_ms: candle.ts_ms(),
                exit_px: trail_px,
                exit_mult: trail_px / entry_px,
                reason: ExitReason::StopLoss,
            };
        }
        if candle.high > peak_px {
            peak_px = candle.high;
        }
        if candle.ts_ms() >= max_hold_ts {
            return ResolvedExit {
                exit_ts_ms: candle.ts_ms(),
                exit_px: candle.close,
                exit_mult: candle.close / entry_px,
                reason: ExitReason::TimeExit,
            };
        }
        last_close = Some((candle.ts_ms(), candle.close));
    }
    match last_close {
        Some((ts, close)) => ResolvedExit {
            exit_ts_ms: ts,
            exit_px: close,
            exit_mult: close / entry_px,
            reason: ExitReason::TimeExit,
        },
        None => flat_exit(candles, entry_index, entry_px),
    }
}

/// Ladder: partial fills at ascending trigger multiples, a shared stop
/// under the remainder, time exit for whatever is left. The reported
/// multiple is the size-weighted blend of all the fills.
fn resolve_ladder(
    candles: &[Candle],
    entry_index: usize,
    entry_px: f64,
    levels: &[LadderLevel],
    sl_mult: f64,
    max_hold_ts: i64,
) -> ResolvedExit {
    let sl_px = entry_px * sl_mult;
    let mut remaining = 1.0_f64;
    let mut realized = 0.0_f64;
    let mut next_level = 0usize;
    let mut last_close: Option<(i64, f64)> = None;

    for candle in &candles[entry_index..] {
        if candle.is_void() {
            continue;
        }
        // Stop first (conservative), then profit fills, then time.
        if candle.low <= sl_px {
            return ResolvedExit {
                exit_ts_ms: candle.ts_ms(),
                exit_px: sl_px,
                exit_mult: realized + remaining * sl_mult,
                reason: ExitReason::StopLoss,
            };
        }
        while next_level < levels.len()
            && candle.high >= entry_px * levels[next_level].trigger_mult
        {
            let level = &levels[next_level];
            realized += level.fraction * level.trigger_mult;
            remaining -= level.fraction;
            next_level += 1;
        }
        if remaining <= f64::EPSILON {
            return ResolvedExit {
                exit_ts_ms: candle.ts_ms(),
                exit_px: entry_px * levels[next_level - 1].trigger_mult,
                exit_mult: realized,
                reason: ExitReason::TakeProfit,
            };
        }
        if candle.ts_ms() >= max_hold_ts {
            return ResolvedExit {
                exit_ts_ms: candle.ts_ms(),
                exit_px: candle.close,
                exit_mult: realized + remaining * (candle.close / entry_px),
                reason: ExitReason::TimeExit,
            };
        }
        last_close = Some((candle.ts_ms(), candle.close));
    }
    match last_close {
        Some((ts, close)) => ResolvedExit {
            exit_ts_ms: ts,
            exit_px: close,
            exit_mult: realized + remaining * (close / entry_px),
            reason: ExitReason::TimeExit,
        },
        None => flat_exit(candles, entry_index, entry_px),
    }
}

/// Peak multiple over the observation window, max adverse excursion and
/// first 2x touch up to the exit timestamp.
fn path_stats(
    candles: &[Candle],
    entry_index: usize,
    entry_px: f64,
    exit_ts_ms: i64,
    window_end_ms: i64,
) -> (f64, f64, Option<i64>) {
    let entry_ts = candles[entry_index].ts_ms();
    let mut peak_mult = 1.0_f64;
    let mut mae_bps = 0.0_f64;
    let mut time_to_2x: Option<i64> = None;

    for candle in &candles[entry_index..] {
        let ts = candle.ts_ms();
        if ts > window_end_ms {
            break;
        }
        if candle.is_void() {
            continue;
        }
        peak_mult = peak_mult.max(candle.high / entry_px);
        if ts <= exit_ts_ms {
            mae_bps = mae_bps.max((1.0 - candle.low / entry_px) * 10_000.0);
            if time_to_2x.is_none() && candle.high >= entry_px * 2.0 {
                time_to_2x = Some(ts - entry_ts);
            }
        }
    }
    (peak_mult, mae_bps.max(0.0), time_to_2x)
}
