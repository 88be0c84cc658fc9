//! Capital-aware simulator — chronological replay of the alert stream
//! against finite cash.
//!
//! Strictly sequential: later alerts depend on capital freed by earlier
//! exits. Deterministic by contract: identical (calls, candles, policy,
//! config) produce bit-identical results. No wall clock, no RNG, no
//! hash-map iteration inside the replay loop.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{ConfigError, SimulatorConfig};
use crate::domain::{
    CallRecord, Candle, ExitPolicy, ExitReason, PolicyError, Position, PositionHandle,
    TradeExecution,
};
use crate::ledger::{CapitalLedger, CapitalState, LedgerError};
use crate::replay::{locate_entry, resolve_exit, ExitBounds, HorizonAction, ReplayOutcome, ResolvedExit};
use crate::sizing::position_size;
use crate::sources::CandleProvider;

/// Errors from the capital simulator (fatal, pre-run or internal).
#[derive(Debug, Error)]
pub enum SimulatorError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("policy error: {0}")]
    Policy(#[from] PolicyError),
    #[error("capital simulation manages positions with fixed exits; got a {0} policy")]
    UnsupportedPolicy(&'static str),
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

/// Per-reason skip counters. Only `insufficient_capital` feeds the
/// headline `trades_skipped` metric; the rest are diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipCounts {
    pub capacity: usize,
    pub no_data: usize,
    pub size_too_small: usize,
    pub insufficient_capital: usize,
    pub no_entry: usize,
}

impl SkipCounts {
    pub fn total(&self) -> usize {
        self.capacity
            + self.no_data
            + self.size_too_small
            + self.insufficient_capital
            + self.no_entry
    }
}

/// Full result of one capital-constrained simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapitalSimulationResult {
    pub final_capital: f64,
    pub total_return: f64,
    /// Trades that reached a real exit (take-profit, stop-loss, time).
    pub trades_executed: usize,
    /// Alerts skipped for insufficient capital only. Other skip reasons
    /// are tracked in `skip_counts` but deliberately not counted here.
    pub trades_skipped: usize,
    pub skip_counts: SkipCounts,
    /// Completed trades, non-decreasing in exit timestamp.
    pub completed_trades: Vec<TradeExecution>,
    pub final_state: CapitalState,
}

/// Candle context kept per open position for exit resolution.
struct OpenTrade {
    candles: Vec<Candle>,
    entry_index: usize,
}

/// Replay the alert stream under one fixed-stop policy with finite capital.
///
/// Alerts are re-sorted by `created_at` (ties broken by call id). Every
/// open position is force-resolved at the end of the stream, so nothing
/// is left open at report time.
pub fn simulate_capital(
    calls: &[CallRecord],
    provider: &dyn CandleProvider,
    policy: &ExitPolicy,
    config: &SimulatorConfig,
) -> Result<CapitalSimulationResult, SimulatorError> {
    config.validate()?;
    policy.validate()?;
    let (tp_mult, sl_mult, max_hold_hrs) = match policy {
        ExitPolicy::FixedStop { tp_mult, sl_mult, max_hold_hrs } => {
            (*tp_mult, *sl_mult, *max_hold_hrs)
        }
        ExitPolicy::TimeStop { .. } => return Err(SimulatorError::UnsupportedPolicy("time-stop")),
        ExitPolicy::TrailingStop { .. } => {
            return Err(SimulatorError::UnsupportedPolicy("trailing-stop"))
        }
        ExitPolicy::Ladder { .. } => return Err(SimulatorError::UnsupportedPolicy("ladder")),
    };
    let max_hold_ms = (max_hold_hrs * 3_600_000.0) as i64;

    let mut sorted: Vec<&CallRecord> = calls.iter().collect();
    sorted.sort_by(|a, b| {
        a.created_at_ms()
            .cmp(&b.created_at_ms())
            .then_with(|| a.id.cmp(&b.id))
    });

    let mut ledger = CapitalLedger::new(config.initial_capital);
    let mut skips = SkipCounts::default();
    // BTreeMap keeps handle (= insertion) order; never iterate a hash map here.
    let mut open: BTreeMap<PositionHandle, OpenTrade> = BTreeMap::new();

    for call in sorted {
        let alert_ts = call.created_at_ms();

        // 1. Resolve exits that happened before this alert.
        resolve_pending(
            &mut ledger,
            &mut open,
            tp_mult,
            sl_mult,
            config,
            alert_ts,
            HorizonAction::RemainOpen,
        )?;

        // 2. Capacity.
        if ledger.open_count() >= config.max_concurrent_positions {
            skips.capacity += 1;
            continue;
        }

        // 3. Data. Bars failing OHLC sanity are dropped before replay.
        let mut candles = provider.candles(&call.id);
        crate::domain::normalize_candles(&mut candles);
        if candles.is_empty() {
            skips.no_data += 1;
            continue;
        }

        // 4. Size.
        let size = position_size(
            sl_mult,
            config.max_risk_per_trade,
            config.max_allocation_pct,
            ledger.free_cash(),
        )?;
        if size < config.min_executable_size {
            skips.size_too_small += 1;
            continue;
        }
        if size > ledger.free_cash() {
            skips.insufficient_capital += 1;
            continue;
        }

        // 5. Entry.
        let Some(entry) = locate_entry(&candles, alert_ts) else {
            skips.no_entry += 1;
            continue;
        };
        let position = Position {
            call_id: call.id.clone(),
            mint: call.mint.clone(),
            caller: call.caller.clone(),
            entry_ts_ms: entry.ts_ms,
            entry_px: entry.price,
            size_usd: size,
            tp_price: entry.price * tp_mult,
            sl_price: entry.price * sl_mult,
            max_hold_ts_ms: entry.ts_ms + max_hold_ms,
        };
        let handle = ledger.open_position(position)?;
        open.insert(handle, OpenTrade { candles, entry_index: entry.index });
    }

    // 6. Force-resolve everything still open at the run-end sentinel.
    resolve_pending(
        &mut ledger,
        &mut open,
        tp_mult,
        sl_mult,
        config,
        i64::MAX,
        HorizonAction::CloseAtLast,
    )?;
    debug_assert_eq!(ledger.open_count(), 0);
    // Every alert either lands in exactly one skip bucket or completes.
    debug_assert_eq!(skips.total() + ledger.completed_trades().len(), calls.len());

    let final_capital = ledger.total_capital();
    let total_return = (final_capital - config.initial_capital) / config.initial_capital;
    let trades_executed = ledger
        .completed_trades()
        .iter()
        .filter(|t| t.exit_reason.is_real_exit())
        .count();

    let mut completed_trades = ledger.completed_trades().to_vec();
    completed_trades.sort_by_key(|t| t.exit_ts_ms);

    Ok(CapitalSimulationResult {
        final_capital,
        total_return,
        trades_executed,
        trades_skipped: skips.insufficient_capital,
        skip_counts: skips,
        completed_trades,
        final_state: ledger.snapshot(),
    })
}

/// Resolve every open position up to `horizon_ts_ms`, crediting proceeds
/// back to free cash. Exits within the batch are applied in exit-time
/// order (ties by handle), keeping the completed-trade log non-decreasing
/// in exit timestamp.
fn resolve_pending(
    ledger: &mut CapitalLedger,
    open: &mut BTreeMap<PositionHandle, OpenTrade>,
    tp_mult: f64,
    sl_mult: f64,
    config: &SimulatorConfig,
    horizon_ts_ms: i64,
    at_horizon: HorizonAction,
) -> Result<(), SimulatorError> {
    let mut exits: Vec<(PositionHandle, ResolvedExit)> = Vec::new();

    for (&handle, trade) in open.iter() {
        let position = ledger
            .position(handle)
            .ok_or(LedgerError::UnknownPosition(handle))?;
        let bounds = ExitBounds {
            tp_mult: Some(tp_mult),
            sl_mult: Some(sl_mult),
            max_hold_ts_ms: position.max_hold_ts_ms,
        };
        match resolve_exit(
            &trade.candles,
            trade.entry_index,
            position.entry_px,
            &bounds,
            horizon_ts_ms,
            at_horizon,
        ) {
            ReplayOutcome::Exit(exit) => exits.push((handle, exit)),
            ReplayOutcome::Open => {
                // At the run-end sentinel nothing may stay open. Open here
                // means every candle from entry onward was void; flat-exit
                // at the entry print.
                if at_horizon == HorizonAction::CloseAtLast {
                    exits.push((
                        handle,
                        ResolvedExit {
                            exit_ts_ms: position.entry_ts_ms,
                            exit_px: position.entry_px,
                            exit_mult: 1.0,
                            reason: ExitReason::TimeExit,
                        },
                    ));
                }
            }
            ReplayOutcome::NoEntry => {
                // Entry index was validated when the position opened.
                return Err(SimulatorError::Ledger(LedgerError::UnknownPosition(handle)));
            }
        }
    }

    exits.sort_by_key(|(handle, exit)| (exit.exit_ts_ms, *handle));
    for (handle, exit) in exits {
        let size = ledger
            .position(handle)
            .ok_or(LedgerError::UnknownPosition(handle))?
            .size_usd;
        let fee = config.fees.round_trip_fee(size);
        ledger.close_position(handle, &exit, fee)?;
        open.remove(&handle);
    }
    Ok(())
}
