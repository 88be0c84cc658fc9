//! CallLab Runner — orchestration on top of the CallLab core engine.
//!
//! Provides:
//! - Serializable run configuration with deterministic run ids
//! - Policy parameter grids and the constrained grid-search optimizer
//! - Per-cell outcome aggregation (medians, nearest-rank percentiles)
//! - Truth-table building with per-caller rollups
//! - Artifact export (CSV trade logs, opaque sink publishing)

pub mod aggregate;
pub mod config;
pub mod export;
pub mod grid;
pub mod optimizer;
pub mod runner;
pub mod truth_table;

pub use config::{OptimizationConstraints, OptimizeConfig};
pub use grid::PolicyGrid;
pub use optimizer::{OptimizerReport, PolicyOptimizer, PolicyScore};
pub use runner::{run_capital_simulation, run_optimization, run_truth_table, RunError};
