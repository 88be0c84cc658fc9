//! Candle replay — entry location and first-triggered-exit resolution.
//!
//! This is the primitive shared by the capital simulator, the truth layer,
//! and the policy executor. It is pure: given the same candles and bounds
//! it always resolves the same exit.
//!
//! Intrabar tie-break: when stop-loss and take-profit both trigger inside
//! the same candle, the stop-loss wins, then take-profit, then time exit.
//! This is a deliberate conservative rule, not an iteration artifact.

use serde::{Deserialize, Serialize};

use crate::domain::{Candle, ExitReason};

/// The candle at which a trade would enter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntryPoint {
    pub index: usize,
    pub ts_ms: i64,
    pub price: f64,
}

/// Exit thresholds for one replay. `None` disables the corresponding
/// condition (a pure time-stop has neither tp nor sl).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitBounds {
    pub tp_mult: Option<f64>,
    pub sl_mult: Option<f64>,
    pub max_hold_ts_ms: i64,
}

/// What to do when the scan reaches the horizon with the trade still open
/// and candles remaining beyond it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HorizonAction {
    /// Mid-run resolution: the position stays open past the horizon.
    RemainOpen,
    /// Terminal resolution: force a time exit at the last in-horizon close.
    CloseAtLast,
}

/// A resolved exit event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolvedExit {
    pub exit_ts_ms: i64,
    pub exit_px: f64,
    pub exit_mult: f64,
    pub reason: ExitReason,
}

/// Outcome of one replay scan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReplayOutcome {
    /// No candle at or after the alert: a valid "no opportunity" result.
    NoEntry,
    /// Nothing triggered at or before the horizon; data continues past it.
    Open,
    Exit(ResolvedExit),
}

/// Locate the entry candle: the first candle whose timestamp is at or
/// after the alert, with a finite, positive close. Entry fills at that
/// candle's close.
pub fn locate_entry(candles: &[Candle], alert_ts_ms: i64) -> Option<EntryPoint> {
    candles.iter().enumerate().find_map(|(index, c)| {
        if c.ts_ms() >= alert_ts_ms && c.close.is_finite() && c.close > 0.0 {
            Some(EntryPoint { index, ts_ms: c.ts_ms(), price: c.close })
        } else {
            None
        }
    })
}

/// Resolve the first triggered exit at or before `horizon_ts_ms`.
///
/// Scans forward from `entry_index`; the earliest triggering candle wins
/// and later candles never overwrite it. Void candles are skipped. If the
/// data series ends at or before the horizon with nothing triggered, the
/// trade time-exits at the last available close; if candles continue past
/// the horizon, `at_horizon` decides between `Open` and a forced time exit
/// at the last in-horizon close.
pub fn resolve_exit(
    candles: &[Candle],
    entry_index: usize,
    entry_px: f64,
    bounds: &ExitBounds,
    horizon_ts_ms: i64,
    at_horizon: HorizonAction,
) -> ReplayOutcome {
    if entry_index >= candles.len() || entry_px <= 0.0 || !entry_px.is_finite() {
        return ReplayOutcome::NoEntry;
    }

    let tp_price = bounds.tp_mult.map(|m| entry_px * m);
    let sl_price = bounds.sl_mult.map(|m| entry_px * m);

    let mut last_scanned: Option<&Candle> = None;
    let mut truncated = false;

    for candle in &candles[entry_index..] {
        if candle.ts_ms() > horizon_ts_ms {
            truncated = true;
            break;
        }
        if candle.is_void() {
            continue;
        }
        last_scanned = Some(candle);

        // Stop-loss first (conservative intrabar tie-break).
        if let (Some(sl_price), Some(sl_mult)) = (sl_price, bounds.sl_mult) {
            if candle.low <= sl_price {
                return ReplayOutcome::Exit(ResolvedExit {
                    exit_ts_ms: candle.ts_ms(),
                    exit_px: sl_price,
                    exit_mult: sl_mult,
                    reason: ExitReason::StopLoss,
                });
            }
        }
        if let (Some(tp_price), Some(tp_mult)) = (tp_price, bounds.tp_mult) {
            if candle.high >= tp_price {
                return ReplayOutcome::Exit(ResolvedExit {
                    exit_ts_ms: candle.ts_ms(),
                    exit_px: tp_price,
                    exit_mult: tp_mult,
                    reason: ExitReason::TakeProfit,
                });
            }
        }
        if candle.ts_ms() >= bounds.max_hold_ts_ms {
            return ReplayOutcome::Exit(time_exit(candle, entry_px));
        }
    }

    match (last_scanned, truncated, at_horizon) {
        // Data exhausted at or before the horizon: nothing more can happen.
        (Some(candle), false, _) => ReplayOutcome::Exit(time_exit(candle, entry_px)),
        (Some(candle), true, HorizonAction::CloseAtLast) => {
            ReplayOutcome::Exit(time_exit(candle, entry_px))
        }
        (Some(_), true, HorizonAction::RemainOpen) => ReplayOutcome::Open,
        // Every in-horizon candle was void, or the horizon precedes entry.
        (None, _, _) => ReplayOutcome::Open,
    }
}

fn time_exit(candle: &Candle, entry_px: f64) -> ResolvedExit {
    ResolvedExit {
        exit_ts_ms: candle.ts_ms(),
        exit_px: candle.close,
        exit_mult: candle.close / entry_px,
        reason: ExitReason::TimeExit,
    }
}
