//! Policy parameter grid for the optimizer's search space.

use serde::{Deserialize, Serialize};

use calllab_core::domain::ExitPolicy;

/// Parameter grid specification.
///
/// The cross product of the three axes defines the fixed-stop policies to
/// evaluate. Invalid combinations are skipped, not errored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyGrid {
    /// Take-profit multiples to test (must exceed 1.0 to be kept)
    pub tp_mults: Vec<f64>,

    /// Stop-loss multiples to test (must sit below 1.0 to be kept)
    pub sl_mults: Vec<f64>,

    /// Maximum holding periods in hours
    pub max_hold_hrs: Vec<f64>,
}

impl PolicyGrid {
    /// A reasonable default grid for token-call exit policies.
    ///
    /// TP multiples: 1.5, 2, 3, 4
    /// SL multiples: 0.5, 0.7, 0.85
    /// Hold caps: 12h, 24h, 48h
    pub fn default_fixed_stop() -> Self {
        Self {
            tp_mults: vec![1.5, 2.0, 3.0, 4.0],
            sl_mults: vec![0.5, 0.7, 0.85],
            max_hold_hrs: vec![12.0, 24.0, 48.0],
        }
    }

    /// Upper bound on the number of cells (before invalid-combination
    /// skipping).
    pub fn size(&self) -> usize {
        self.tp_mults.len() * self.sl_mults.len() * self.max_hold_hrs.len()
    }

    /// Generates all valid policies in the grid, in deterministic axis
    /// order (tp outermost, hold innermost). Cells that could never pass
    /// validation (tp <= 1, sl >= 1, non-positive hold) are skipped.
    pub fn generate_policies(&self) -> Vec<ExitPolicy> {
        let mut policies = Vec::new();

        for &tp_mult in &self.tp_mults {
            if tp_mult <= 1.0 {
                continue;
            }
            for &sl_mult in &self.sl_mults {
                if sl_mult >= 1.0 || sl_mult <= 0.0 {
                    continue;
                }
                for &max_hold_hrs in &self.max_hold_hrs {
                    if max_hold_hrs <= 0.0 {
                        continue;
                    }
                    policies.push(ExitPolicy::FixedStop { tp_mult, sl_mult, max_hold_hrs });
                }
            }
        }

        policies
    }
}
