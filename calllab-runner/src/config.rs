//! Run configuration for optimizer runs.
//!
//! The full configuration is serializable, loadable from TOML, and hashes
//! to a deterministic run id so identical runs are identified as such.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use calllab_core::config::SimulatorConfig;

use crate::grid::PolicyGrid;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("max_stop_out_rate must be within [0, 1] (got {0})")]
    InvalidStopOutRate(f64),
    #[error("max_p95_drawdown_bps must be non-negative (got {0})")]
    NegativeDrawdownBound(f64),
    #[error("max_time_exposed_ms must be non-negative (got {0})")]
    NegativeTimeBound(i64),
    #[error("policy grid is empty after skipping invalid cells")]
    EmptyGrid,
    #[error("simulator config: {0}")]
    Simulator(#[from] calllab_core::config::ConfigError),
    #[error("failed to parse TOML config: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Hard feasibility bounds for policy selection. A policy violating any
/// bound is excluded outright; bounds are never soft-weighted into the
/// score and never relaxed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizationConstraints {
    /// Maximum tolerated fraction of entered calls that stop out.
    pub max_stop_out_rate: f64,
    /// Maximum tolerated p95 of max adverse excursion, in bps.
    pub max_p95_drawdown_bps: f64,
    /// Maximum tolerated median holding time, in milliseconds.
    pub max_time_exposed_ms: i64,
}

impl Default for OptimizationConstraints {
    fn default() -> Self {
        Self {
            max_stop_out_rate: 0.6,
            max_p95_drawdown_bps: 5_000.0,
            max_time_exposed_ms: 48 * 3_600_000,
        }
    }
}

impl OptimizationConstraints {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.max_stop_out_rate) || self.max_stop_out_rate.is_nan() {
            return Err(ConfigError::InvalidStopOutRate(self.max_stop_out_rate));
        }
        if self.max_p95_drawdown_bps < 0.0 || self.max_p95_drawdown_bps.is_nan() {
            return Err(ConfigError::NegativeDrawdownBound(self.max_p95_drawdown_bps));
        }
        if self.max_time_exposed_ms < 0 {
            return Err(ConfigError::NegativeTimeBound(self.max_time_exposed_ms));
        }
        Ok(())
    }
}

/// Complete configuration for one optimizer run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizeConfig {
    pub simulator: SimulatorConfig,
    pub grid: PolicyGrid,
    pub constraints: OptimizationConstraints,
}

impl Default for OptimizeConfig {
    fn default() -> Self {
        Self {
            simulator: SimulatorConfig::default(),
            grid: PolicyGrid::default_fixed_stop(),
            constraints: OptimizationConstraints::default(),
        }
    }
}

impl OptimizeConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.simulator.validate()?;
        self.constraints.validate()?;
        if self.grid.generate_policies().is_empty() {
            return Err(ConfigError::EmptyGrid);
        }
        Ok(())
    }

    /// Deterministic identifier for this configuration.
    ///
    /// Hash of the canonical JSON serialization, so the same config always
    /// maps to the same run id across processes and machines.
    pub fn run_id(&self) -> String {
        let canonical = serde_json::to_string(self).expect("OptimizeConfig serialization failed");
        blake3::hash(canonical.as_bytes()).to_hex().to_string()
    }
}
