//! TradeExecution — the terminal, append-only record of a position.

use serde::{Deserialize, Serialize};

use super::call::CallId;

/// Why a trade (or attempted trade) terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    TakeProfit,
    StopLoss,
    TimeExit,
    NoEntry,
    InsufficientCapital,
}

impl ExitReason {
    /// True for reasons that correspond to a position actually held.
    pub fn is_real_exit(&self) -> bool {
        matches!(self, Self::TakeProfit | Self::StopLoss | Self::TimeExit)
    }
}

/// The terminal record of one position. Every `Position` transitions to
/// exactly one of these; none is double-closed or silently dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeExecution {
    pub call_id: CallId,
    pub entry_ts_ms: i64,
    pub exit_ts_ms: i64,
    pub entry_px: f64,
    pub exit_px: f64,
    pub size_usd: f64,
    pub gross_pnl: f64,
    pub fee: f64,
    pub pnl: f64,
    pub exit_reason: ExitReason,
    pub exit_mult: f64,
}

impl TradeExecution {
    pub fn is_winner(&self) -> bool {
        self.pnl > 0.0
    }

    /// Holding time in milliseconds.
    pub fn time_exposed_ms(&self) -> i64 {
        self.exit_ts_ms - self.entry_ts_ms
    }
}
