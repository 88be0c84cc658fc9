//! Position sizing — pure function of risk, allocation, and free cash.

use crate::config::ConfigError;

/// Compute the trade size in USD for a stop at `sl_mult` times entry.
///
/// `sl_frac = 1 - sl_mult` is the fraction of the position at risk; the
/// size is capped so that a stop-out loses at most `max_risk_per_trade`,
/// by the per-trade allocation share of free cash, and by free cash
/// itself:
///
/// `min(max_risk_per_trade / sl_frac, max_allocation_pct * free_cash, free_cash)`
///
/// `sl_mult >= 1.0` is a configuration error: the stop would sit at or
/// above entry and bounds no risk.
pub fn position_size(
    sl_mult: f64,
    max_risk_per_trade: f64,
    max_allocation_pct: f64,
    free_cash: f64,
) -> Result<f64, ConfigError> {
    let sl_frac = 1.0 - sl_mult;
    if sl_frac <= 0.0 {
        return Err(ConfigError::StopAtOrAboveEntry(sl_mult));
    }
    let size_risk = max_risk_per_trade / sl_frac;
    let size_alloc = max_allocation_pct * free_cash;
    Ok(size_risk.min(size_alloc).min(free_cash))
}
