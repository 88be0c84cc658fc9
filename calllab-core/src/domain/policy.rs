//! ExitPolicy — the exhaustive tagged union of trade-management policies.
//!
//! Each variant carries only its own parameters, and the replay layer
//! matches exhaustively, so adding a policy kind is a compile-time-checked
//! change. `validate()` runs before any simulation; an invalid policy is a
//! fatal pre-run error, never a per-call skip.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from policy parameter validation (fatal, pre-run).
#[derive(Debug, Error, PartialEq)]
pub enum PolicyError {
    #[error("sl_mult must be < 1.0 (got {0}): a stop at or above entry is not a risk boundary")]
    StopAtOrAboveEntry(f64),
    #[error("tp_mult must be > 1.0 (got {0})")]
    TakeProfitAtOrBelowEntry(f64),
    #[error("sl_mult must be positive (got {0})")]
    NonPositiveStop(f64),
    #[error("max_hold_hrs must be positive (got {0})")]
    NonPositiveHold(f64),
    #[error("trail_frac must be in (0, 1) (got {0})")]
    InvalidTrailFrac(f64),
    #[error("ladder must have at least one level")]
    EmptyLadder,
    #[error("ladder level {index}: trigger_mult must be > 1.0 (got {trigger_mult})")]
    InvalidLadderTrigger { index: usize, trigger_mult: f64 },
    #[error("ladder level {index}: fraction must be in (0, 1] (got {fraction})")]
    InvalidLadderFraction { index: usize, fraction: f64 },
    #[error("ladder trigger multiples must be strictly increasing")]
    NonIncreasingLadder,
    #[error("ladder fractions sum to {0}, must be <= 1.0")]
    LadderOversold(f64),
}

/// One rung of a ladder policy: sell `fraction` of the position when the
/// price first reaches `trigger_mult` times entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LadderLevel {
    pub trigger_mult: f64,
    pub fraction: f64,
}

/// A trade-management policy, identified by a stable content hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitPolicy {
    /// Fixed take-profit and stop-loss multiples with a hold cap.
    FixedStop {
        tp_mult: f64,
        sl_mult: f64,
        max_hold_hrs: f64,
    },

    /// Exit at the hold cap (or end of data) only.
    TimeStop { max_hold_hrs: f64 },

    /// Stop trails the running high: exit when price falls `trail_frac`
    /// below the peak since entry.
    TrailingStop {
        trail_frac: f64,
        max_hold_hrs: f64,
    },

    /// Multi-level exits: sell fractions at rising trigger multiples,
    /// remainder managed by the stop and hold cap.
    Ladder {
        levels: Vec<LadderLevel>,
        sl_mult: f64,
        max_hold_hrs: f64,
    },
}

impl ExitPolicy {
    /// Validate policy parameters. Must pass before any simulation runs.
    pub fn validate(&self) -> Result<(), PolicyError> {
        match self {
            Self::FixedStop { tp_mult, sl_mult, max_hold_hrs } => {
                validate_stop(*sl_mult)?;
                if *tp_mult <= 1.0 {
                    return Err(PolicyError::TakeProfitAtOrBelowEntry(*tp_mult));
                }
                validate_hold(*max_hold_hrs)
            }
            Self::TimeStop { max_hold_hrs } => validate_hold(*max_hold_hrs),
            Self::TrailingStop { trail_frac, max_hold_hrs } => {
                if !(*trail_frac > 0.0 && *trail_frac < 1.0) {
                    return Err(PolicyError::InvalidTrailFrac(*trail_frac));
                }
                validate_hold(*max_hold_hrs)
            }
            Self::Ladder { levels, sl_mult, max_hold_hrs } => {
                validate_stop(*sl_mult)?;
                validate_hold(*max_hold_hrs)?;
                if levels.is_empty() {
                    return Err(PolicyError::EmptyLadder);
                }
                let mut prev = 1.0;
                let mut total_fraction = 0.0;
                for (index, level) in levels.iter().enumerate() {
                    if level.trigger_mult <= 1.0 || !level.trigger_mult.is_finite() {
                        return Err(PolicyError::InvalidLadderTrigger {
                            index,
                            trigger_mult: level.trigger_mult,
                        });
                    }
                    if !(level.fraction > 0.0 && level.fraction <= 1.0) {
                        return Err(PolicyError::InvalidLadderFraction {
                            index,
                            fraction: level.fraction,
                        });
                    }
                    if level.trigger_mult <= prev {
                        return Err(PolicyError::NonIncreasingLadder);
                    }
                    prev = level.trigger_mult;
                    total_fraction += level.fraction;
                }
                if total_fraction > 1.0 + 1e-9 {
                    return Err(PolicyError::LadderOversold(total_fraction));
                }
                Ok(())
            }
        }
    }

    /// Stable content-addressed id: blake3 over the canonical JSON form.
    ///
    /// Two policies with identical parameters share an id, which is what
    /// the optimizer keys its grid cells by.
    pub fn policy_id(&self) -> String {
        let json = serde_json::to_string(self).expect("ExitPolicy serialization failed");
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }

    /// Hold cap shared by every variant.
    pub fn max_hold_hrs(&self) -> f64 {
        match self {
            Self::FixedStop { max_hold_hrs, .. }
            | Self::TimeStop { max_hold_hrs }
            | Self::TrailingStop { max_hold_hrs, .. }
            | Self::Ladder { max_hold_hrs, .. } => *max_hold_hrs,
        }
    }
}

fn validate_stop(sl_mult: f64) -> Result<(), PolicyError> {
    if sl_mult >= 1.0 {
        return Err(PolicyError::StopAtOrAboveEntry(sl_mult));
    }
    if sl_mult <= 0.0 || !sl_mult.is_finite() {
        return Err(PolicyError::NonPositiveStop(sl_mult));
    }
    Ok(())
}

fn validate_hold(max_hold_hrs: f64) -> Result<(), PolicyError> {
    if max_hold_hrs <= 0.0 || !max_hold_hrs.is_finite() {
        return Err(PolicyError::NonPositiveHold(max_hold_hrs));
    }
    Ok(())
}
