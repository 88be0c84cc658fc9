//! Truth layer — policy-free path statistics per call.
//!
//! Exactly one row per call, regardless of any policy or capital state.
//! These rows answer "what did the price actually do" and make callers
//! comparable without committing to an exit rule.

use serde::{Deserialize, Serialize};

use crate::config::SimulatorConfig;
use crate::domain::{CallRecord, Candle};
use crate::replay::locate_entry;

/// Per-call path statistics over the observation window
/// (alert to entry + max trade horizon).
///
/// `tradeable = false` means no candle data or no entry opportunity; all
/// path fields are then zeroed or `None`, which is distinct from "had
/// data, never moved".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathMetrics {
    pub call_id: String,
    pub mint: String,
    pub caller: String,
    pub tradeable: bool,
    pub hit_2x: bool,
    pub hit_3x: bool,
    pub hit_4x: bool,
    /// Entry to first touch of the multiple, epoch-ms delta.
    pub time_to_2x_ms: Option<i64>,
    pub time_to_3x_ms: Option<i64>,
    pub time_to_4x_ms: Option<i64>,
    /// Worst peak-to-trough decline as a fraction of the peak, in [0, 1].
    pub max_drawdown_frac: f64,
    /// Worst drawdown observed strictly before the first 2x touch.
    /// Equals `max_drawdown_frac` when 2x was never hit.
    pub drawdown_to_2x_frac: f64,
    /// Latency between the alert and the first tradeable candle.
    pub alert_to_first_candle_ms: i64,
    /// Max high over the window divided by entry price.
    pub peak_multiple: f64,
}

impl PathMetrics {
    fn untradeable(call: &CallRecord) -> Self {
        Self {
            call_id: call.id.to_string(),
            mint: call.mint.clone(),
            caller: call.caller.clone(),
            tradeable: false,
            hit_2x: false,
            hit_3x: false,
            hit_4x: false,
            time_to_2x_ms: None,
            time_to_3x_ms: None,
            time_to_4x_ms: None,
            max_drawdown_frac: 0.0,
            drawdown_to_2x_frac: 0.0,
            alert_to_first_candle_ms: 0,
            peak_multiple: 0.0,
        }
    }
}

/// Compute the truth row for one call. `candles` must be ascending by
/// timestamp (providers normalize; see `normalize_candles`).
pub fn compute_path_metrics(
    call: &CallRecord,
    candles: &[Candle],
    config: &SimulatorConfig,
) -> PathMetrics {
    let alert_ts = call.created_at_ms();
    let Some(entry) = locate_entry(candles, alert_ts) else {
        return PathMetrics::untradeable(call);
    };
    let window_end = entry.ts_ms + config.horizon_ms();

    let mut peak = 1.0_f64;
    let mut max_drawdown = 0.0_f64;
    let mut drawdown_to_2x: Option<f64> = None;
    let mut time_to = [None::<i64>; 3];

    for candle in &candles[entry.index..] {
        if candle.ts_ms() > window_end {
            break;
        }
        if candle.is_void() {
            continue;
        }
        let high_mult = candle.high / entry.price;
        let low_mult = candle.low / entry.price;

        for (i, threshold) in [2.0, 3.0, 4.0].into_iter().enumerate() {
            if time_to[i].is_none() && high_mult >= threshold {
                time_to[i] = Some(candle.ts_ms() - entry.ts_ms);
            }
        }
        if time_to[0].is_none() {
            // Still pre-2x: the running worst drawdown so far is the
            // drawdown an entrant would have had to sit through.
            let dd = drawdown_after_low(peak.max(high_mult), low_mult, max_drawdown);
            drawdown_to_2x = Some(dd);
        }

        // Peak first, then trough against it; a candle can both set a new
        // peak and draw down from it.
        peak = peak.max(high_mult);
        if peak > 0.0 {
            max_drawdown = max_drawdown.max((peak - low_mult) / peak);
        }
    }

    PathMetrics {
        call_id: call.id.to_string(),
        mint: call.mint.clone(),
        caller: call.caller.clone(),
        tradeable: true,
        hit_2x: time_to[0].is_some(),
        hit_3x: time_to[1].is_some(),
        hit_4x: time_to[2].is_some(),
        time_to_2x_ms: time_to[0],
        time_to_3x_ms: time_to[1],
        time_to_4x_ms: time_to[2],
        max_drawdown_frac: max_drawdown,
        drawdown_to_2x_frac: drawdown_to_2x.unwrap_or(0.0).max(0.0),
        alert_to_first_candle_ms: entry.ts_ms - alert_ts,
        peak_multiple: peak,
    }
}

fn drawdown_after_low(peak: f64, low_mult: f64, prior: f64) -> f64 {
    if peak > 0.0 {
        prior.max((peak - low_mult) / peak)
    } else {
        prior
    }
}
