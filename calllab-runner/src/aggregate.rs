//! Per-cell aggregation of policy outcomes.
//!
//! Every statistic here is order-insensitive and deterministic: medians
//! are lower-medians on the sorted slice, percentiles use nearest-rank.
//! No interpolation, so results are bit-identical across runs.

use serde::{Deserialize, Serialize};

use calllab_core::exec::PolicyOutcome;

/// Aggregated metrics for one policy cell across all evaluated calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellMetrics {
    /// All calls the cell saw, entered or not.
    pub calls: usize,
    /// Calls with an actual entry; the distributions below run over these.
    pub entered: usize,
    pub median_net_return_bps: f64,
    pub stop_out_rate: f64,
    pub p95_drawdown_bps: f64,
    pub median_time_exposed_ms: i64,
    pub median_tail_capture: f64,
    /// Median time to first 2x among entered calls that hit it; `None`
    /// when no entered call did.
    pub median_time_to_2x_ms: Option<i64>,
    pub median_drawdown_bps: f64,
}

impl CellMetrics {
    /// Aggregate one cell's outcomes. NoEntry rows count toward `calls`
    /// but are excluded from every distribution.
    pub fn aggregate(outcomes: &[PolicyOutcome]) -> Self {
        let entered: Vec<&PolicyOutcome> = outcomes.iter().filter(|o| o.entered()).collect();
        let n = entered.len();

        let returns: Vec<f64> = entered.iter().map(|o| o.realized_return_bps).collect();
        let drawdowns: Vec<f64> =
            entered.iter().map(|o| o.max_adverse_excursion_bps).collect();
        let exposures: Vec<i64> = entered.iter().map(|o| o.time_exposed_ms).collect();
        let captures: Vec<f64> = entered.iter().map(|o| o.tail_capture).collect();
        let times_to_2x: Vec<i64> = entered.iter().filter_map(|o| o.time_to_2x_ms).collect();
        let stop_outs = entered.iter().filter(|o| o.stop_out).count();

        Self {
            calls: outcomes.len(),
            entered: n,
            median_net_return_bps: median_f64(&returns),
            stop_out_rate: if n == 0 { 0.0 } else { stop_outs as f64 / n as f64 },
            p95_drawdown_bps: percentile_f64(&drawdowns, 0.95),
            median_time_exposed_ms: median_i64(&exposures),
            median_tail_capture: median_f64(&captures),
            median_time_to_2x_ms: if times_to_2x.is_empty() {
                None
            } else {
                Some(median_i64(&times_to_2x))
            },
            median_drawdown_bps: median_f64(&drawdowns),
        }
    }
}

/// Lower median of the values; 0.0 on an empty slice. NaNs are sorted to
/// the end and therefore never selected unless everything is NaN.
pub fn median_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted[(sorted.len() - 1) / 2]
}

pub fn median_i64(values: &[i64]) -> i64 {
    if values.is_empty() {
        return 0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    sorted[(sorted.len() - 1) / 2]
}

/// Nearest-rank percentile (p in [0, 1]); 0.0 on an empty slice.
pub fn percentile_f64(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let rank = ((p * sorted.len() as f64).ceil() as usize).clamp(1, sorted.len());
    sorted[rank - 1]
}
