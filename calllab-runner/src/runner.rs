//! High-level entry points wiring sources into the engine.
//!
//! These are the functions external callers use: fetch calls once through
//! the source, wrap the candle provider in an explicit cache, and hand
//! everything to the simulator, optimizer, or truth-table builder.

use thiserror::Error;

use calllab_core::config::SimulatorConfig;
use calllab_core::domain::ExitPolicy;
use calllab_core::simulator::{simulate_capital, CapitalSimulationResult, SimulatorError};
use calllab_core::sources::{CallCriteria, CallSource, CandleCache, CandleProvider};
use calllab_core::truth::PathMetrics;

use crate::config::{ConfigError, OptimizeConfig};
use crate::optimizer::{OptimizerReport, PolicyOptimizer};
use crate::truth_table::{build_truth_table, caller_summary, CallerSummary};

/// Errors from the high-level run entry points.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("simulation failed: {0}")]
    Simulation(#[from] SimulatorError),
    #[error("invalid run configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("no calls matched the criteria")]
    NoCalls,
}

/// Result of one optimizer run, tagged with the config's run id.
#[derive(Debug, Clone)]
pub struct OptimizationRun {
    pub run_id: String,
    pub report: OptimizerReport,
}

/// Run one capital-constrained simulation over the calls matching
/// `criteria`, with candle fetches memoized for the run's duration.
pub fn run_capital_simulation(
    source: &dyn CallSource,
    provider: &dyn CandleProvider,
    criteria: &CallCriteria,
    policy: &ExitPolicy,
    config: &SimulatorConfig,
) -> Result<CapitalSimulationResult, RunError> {
    let calls = source.list_calls(criteria);
    if calls.is_empty() {
        return Err(RunError::NoCalls);
    }
    let cache = CandleCache::new(provider);
    Ok(simulate_capital(&calls, &cache, policy, config)?)
}

/// Run the constrained policy grid search over the calls matching
/// `criteria`.
pub fn run_optimization(
    source: &dyn CallSource,
    provider: &dyn CandleProvider,
    criteria: &CallCriteria,
    config: &OptimizeConfig,
    parallel: bool,
) -> Result<OptimizationRun, RunError> {
    config.validate()?;
    let calls = source.list_calls(criteria);
    if calls.is_empty() {
        return Err(RunError::NoCalls);
    }
    let cache = CandleCache::new(provider);
    let optimizer =
        PolicyOptimizer::new(config.constraints, config.simulator.clone()).with_parallelism(parallel);
    let report = optimizer.optimize(&calls, &cache, &config.grid)?;
    Ok(OptimizationRun { run_id: config.run_id(), report })
}

/// Build the truth table and its per-caller rollup for the calls
/// matching `criteria`.
pub fn run_truth_table(
    source: &dyn CallSource,
    provider: &dyn CandleProvider,
    criteria: &CallCriteria,
    config: &SimulatorConfig,
) -> Result<(Vec<PathMetrics>, Vec<CallerSummary>), RunError> {
    let calls = source.list_calls(criteria);
    if calls.is_empty() {
        return Err(RunError::NoCalls);
    }
    let cache = CandleCache::new(provider);
    let rows = build_truth_table(&calls, &cache, config);
    let summaries = caller_summary(&rows);
    Ok((rows, summaries))
}
