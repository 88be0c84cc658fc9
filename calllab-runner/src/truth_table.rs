//! Truth table builder — one policy-free row per call, plus per-caller
//! rollups for cross-caller comparison.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use calllab_core::config::SimulatorConfig;
use calllab_core::domain::CallRecord;
use calllab_core::sources::CandleProvider;
use calllab_core::truth::{compute_path_metrics, PathMetrics};

use crate::aggregate::median_f64;

/// Per-caller rollup over truth rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallerSummary {
    pub caller: String,
    pub calls: usize,
    pub tradeable: usize,
    /// Fraction of tradeable calls that touched 2x inside the window.
    pub hit_2x_rate: f64,
    /// Median peak multiple across tradeable calls.
    pub median_peak_multiple: f64,
}

/// Build the truth table: exactly one row per call, sorted by alert time
/// with call-id tie-break, independent of any policy or capital state.
pub fn build_truth_table<P: CandleProvider + ?Sized>(
    calls: &[CallRecord],
    provider: &P,
    config: &SimulatorConfig,
) -> Vec<PathMetrics> {
    let mut sorted: Vec<&CallRecord> = calls.iter().collect();
    sorted.sort_by(|a, b| {
        a.created_at_ms()
            .cmp(&b.created_at_ms())
            .then_with(|| a.id.cmp(&b.id))
    });
    sorted
        .into_iter()
        .map(|call| compute_path_metrics(call, &provider.candles(&call.id), config))
        .collect()
}

/// Group truth rows per caller. BTreeMap keeps caller order deterministic.
pub fn caller_summary(rows: &[PathMetrics]) -> Vec<CallerSummary> {
    let mut groups: BTreeMap<&str, Vec<&PathMetrics>> = BTreeMap::new();
    for row in rows {
        groups.entry(row.caller.as_str()).or_default().push(row);
    }

    groups
        .into_iter()
        .map(|(caller, rows)| {
            let tradeable: Vec<&&PathMetrics> = rows.iter().filter(|r| r.tradeable).collect();
            let hits = tradeable.iter().filter(|r| r.hit_2x).count();
            let peaks: Vec<f64> = tradeable.iter().map(|r| r.peak_multiple).collect();
            CallerSummary {
                caller: caller.to_string(),
                calls: rows.len(),
                tradeable: tradeable.len(),
                hit_2x_rate: if tradeable.is_empty() {
                    0.0
                } else {
                    hits as f64 / tradeable.len() as f64
                },
                median_peak_multiple: median_f64(&peaks),
            }
        })
        .collect()
}
