//! Position — an open trade, created once at entry and removed once at exit.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::call::CallId;

/// Stable handle into the ledger's position arena.
///
/// Handles are never reused within a run, so a stale handle cannot alias
/// a newer position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PositionHandle(pub u64);

impl fmt::Display for PositionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pos-{}", self.0)
    }
}

/// An open position in the capital ledger.
///
/// Immutable after creation: exit resolution produces a `TradeExecution`
/// and removes the position, it never edits it in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub call_id: CallId,
    pub mint: String,
    pub caller: String,
    pub entry_ts_ms: i64,
    pub entry_px: f64,
    pub size_usd: f64,
    pub tp_price: f64,
    pub sl_price: f64,
    pub max_hold_ts_ms: i64,
}
