//! Constrained grid search over exit policies.
//!
//! Every cell evaluates the same calls with no shared state, so the grid
//! is embarrassingly parallel. Selection applies a hard feasibility gate
//! first and only then ranks by score; constraints are never traded off
//! against returns and never relaxed. When every cell is infeasible the
//! honest answer is "no feasible policy", not the least-bad cell.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use calllab_core::config::SimulatorConfig;
use calllab_core::domain::{CallRecord, Candle, ExitPolicy};
use calllab_core::exec::execute_policy;
use calllab_core::sources::CandleProvider;

use crate::aggregate::CellMetrics;
use crate::config::{ConfigError, OptimizationConstraints};
use crate::grid::PolicyGrid;

/// One scored grid cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyScore {
    pub policy_id: String,
    pub policy: ExitPolicy,
    /// Median net return in bps; the ranking objective.
    pub score: f64,
    pub feasible: bool,
    pub metrics: CellMetrics,
}

/// Full optimizer output: every cell's score plus the selected policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerReport {
    pub scores: Vec<PolicyScore>,
    /// `None` when no cell passes the feasibility gate.
    pub best: Option<PolicyScore>,
}

impl OptimizerReport {
    pub fn feasible_count(&self) -> usize {
        self.scores.iter().filter(|s| s.feasible).count()
    }
}

/// Policy grid search executor.
pub struct PolicyOptimizer {
    constraints: OptimizationConstraints,
    simulator_config: SimulatorConfig,
    parallel: bool,
}

impl PolicyOptimizer {
    pub fn new(constraints: OptimizationConstraints, simulator_config: SimulatorConfig) -> Self {
        Self { constraints, simulator_config, parallel: true }
    }

    /// Enables or disables parallel execution. Results are identical
    /// either way; cell order is fixed by the grid, not by thread timing.
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Run the grid search over the given calls.
    pub fn optimize<P: CandleProvider + ?Sized>(
        &self,
        calls: &[CallRecord],
        provider: &P,
        grid: &PolicyGrid,
    ) -> Result<OptimizerReport, ConfigError> {
        self.constraints.validate()?;
        self.simulator_config.validate()?;
        let policies = grid.generate_policies();
        if policies.is_empty() {
            return Err(ConfigError::EmptyGrid);
        }

        // Fetch every series once, up front; cells then share immutable
        // slices and the provider does not need to be thread-safe.
        let inputs: Vec<(&CallRecord, Vec<Candle>)> =
            calls.iter().map(|c| (c, provider.candles(&c.id))).collect();

        let scores: Vec<PolicyScore> = if self.parallel {
            policies
                .par_iter()
                .map(|policy| self.score_cell(policy, &inputs))
                .collect()
        } else {
            policies
                .iter()
                .map(|policy| self.score_cell(policy, &inputs))
                .collect()
        };

        let best = select_best(&scores).cloned();
        Ok(OptimizerReport { scores, best })
    }

    fn score_cell(
        &self,
        policy: &ExitPolicy,
        inputs: &[(&CallRecord, Vec<Candle>)],
    ) -> PolicyScore {
        let outcomes: Vec<_> = inputs
            .iter()
            .map(|(call, candles)| execute_policy(call, candles, policy, &self.simulator_config))
            .collect();
        let metrics = CellMetrics::aggregate(&outcomes);
        let score = metrics.median_net_return_bps;
        let feasible = self.is_feasible(&metrics) && !score.is_nan();

        PolicyScore {
            policy_id: policy.policy_id(),
            policy: policy.clone(),
            score,
            feasible,
            metrics,
        }
    }

    fn is_feasible(&self, metrics: &CellMetrics) -> bool {
        metrics.stop_out_rate <= self.constraints.max_stop_out_rate
            && metrics.p95_drawdown_bps <= self.constraints.max_p95_drawdown_bps
            && metrics.median_time_exposed_ms <= self.constraints.max_time_exposed_ms
    }
}

/// Pick the best feasible cell. Ties on score break, in order, by higher
/// median tail capture, faster median time-to-2x (absent ranks worst),
/// then lower median drawdown; a full tie keeps the earlier grid cell, so
/// selection is bit-identical across runs and across parallel modes.
fn select_best(scores: &[PolicyScore]) -> Option<&PolicyScore> {
    let mut best: Option<&PolicyScore> = None;
    for candidate in scores.iter().filter(|s| s.feasible) {
        best = match best {
            None => Some(candidate),
            Some(current) if beats(candidate, current) => Some(candidate),
            Some(current) => Some(current),
        };
    }
    best
}

fn beats(a: &PolicyScore, b: &PolicyScore) -> bool {
    if a.score != b.score {
        return a.score > b.score;
    }
    if a.metrics.median_tail_capture != b.metrics.median_tail_capture {
        return a.metrics.median_tail_capture > b.metrics.median_tail_capture;
    }
    let time_rank = |s: &PolicyScore| s.metrics.median_time_to_2x_ms.unwrap_or(i64::MAX);
    if time_rank(a) != time_rank(b) {
        return time_rank(a) < time_rank(b);
    }
    if a.metrics.median_drawdown_bps != b.metrics.median_drawdown_bps {
        return a.metrics.median_drawdown_bps < b.metrics.median_drawdown_bps;
    }
    false
}
