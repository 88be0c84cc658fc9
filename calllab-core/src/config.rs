//! Simulator configuration with overridable defaults.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from configuration validation (fatal, pre-run).
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("initial_capital must be positive (got {0})")]
    NonPositiveCapital(f64),
    #[error("max_allocation_pct must be in (0, 1] (got {0})")]
    InvalidAllocationPct(f64),
    #[error("max_risk_per_trade must be positive (got {0})")]
    NonPositiveRisk(f64),
    #[error("max_trade_horizon_hrs must be positive (got {0})")]
    NonPositiveHorizon(f64),
    #[error("min_executable_size must be non-negative (got {0})")]
    NegativeMinSize(f64),
    #[error("fee bps must be non-negative (taker {taker_fee_bps}, slippage {slippage_bps})")]
    NegativeFees { taker_fee_bps: f64, slippage_bps: f64 },
    #[error("sl_mult must be < 1.0 (got {0}): a stop at or above entry is not a risk boundary")]
    StopAtOrAboveEntry(f64),
}

/// Per-leg fee assumptions, charged on both entry and exit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeeConfig {
    pub taker_fee_bps: f64,
    pub slippage_bps: f64,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self { taker_fee_bps: 30.0, slippage_bps: 10.0 }
    }
}

impl FeeConfig {
    /// Total round-trip fee for a position of `size_usd`: both legs.
    pub fn round_trip_fee(&self, size_usd: f64) -> f64 {
        size_usd * (self.taker_fee_bps + self.slippage_bps) / 10_000.0 * 2.0
    }

    /// Round-trip fee expressed in basis points of size.
    pub fn round_trip_bps(&self) -> f64 {
        (self.taker_fee_bps + self.slippage_bps) * 2.0
    }
}

/// Capital and execution constraints for one simulation run.
///
/// All fields have defaults; callers override any subset via struct
/// update syntax or serde.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    pub initial_capital: f64,
    pub max_allocation_pct: f64,
    pub max_risk_per_trade: f64,
    pub max_concurrent_positions: usize,
    pub max_trade_horizon_hrs: f64,
    pub min_executable_size: f64,
    pub fees: FeeConfig,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            initial_capital: 10_000.0,
            max_allocation_pct: 0.04,
            max_risk_per_trade: 200.0,
            max_concurrent_positions: 25,
            max_trade_horizon_hrs: 48.0,
            min_executable_size: 10.0,
            fees: FeeConfig::default(),
        }
    }
}

impl SimulatorConfig {
    /// Validate the configuration. Called before any state mutation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_capital <= 0.0 || !self.initial_capital.is_finite() {
            return Err(ConfigError::NonPositiveCapital(self.initial_capital));
        }
        if !(self.max_allocation_pct > 0.0 && self.max_allocation_pct <= 1.0) {
            return Err(ConfigError::InvalidAllocationPct(self.max_allocation_pct));
        }
        if self.max_risk_per_trade <= 0.0 || !self.max_risk_per_trade.is_finite() {
            return Err(ConfigError::NonPositiveRisk(self.max_risk_per_trade));
        }
        if self.max_trade_horizon_hrs <= 0.0 || !self.max_trade_horizon_hrs.is_finite() {
            return Err(ConfigError::NonPositiveHorizon(self.max_trade_horizon_hrs));
        }
        if self.min_executable_size < 0.0 {
            return Err(ConfigError::NegativeMinSize(self.min_executable_size));
        }
        if self.fees.taker_fee_bps < 0.0 || self.fees.slippage_bps < 0.0 {
            return Err(ConfigError::NegativeFees {
                taker_fee_bps: self.fees.taker_fee_bps,
                slippage_bps: self.fees.slippage_bps,
            });
        }
        Ok(())
    }

    /// Trade observation horizon in milliseconds.
    pub fn horizon_ms(&self) -> i64 {
        (self.max_trade_horizon_hrs * 3_600_000.0) as i64
    }
}
