//! Capital ledger — free cash, open positions, completed trades.
//!
//! Positions live in an arena addressed by stable handles; handles are
//! never reused within a run, so removing a position mid-iteration cannot
//! alias another one. The ledger is owned exclusively by one simulation
//! run and never shared across runs or threads.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Position, PositionHandle, TradeExecution};
use crate::replay::ResolvedExit;

/// Errors from ledger operations. These indicate a simulator bug, not a
/// recoverable per-alert condition; the simulator's capacity/cash checks
/// run before the ledger is touched.
#[derive(Debug, Error, PartialEq)]
pub enum LedgerError {
    #[error("position size {size} exceeds free cash {free_cash}")]
    InsufficientCash { size: f64, free_cash: f64 },
    #[error("position size must be non-negative (got {0})")]
    NegativeSize(f64),
    #[error("unknown or already closed position {0}")]
    UnknownPosition(PositionHandle),
}

/// Arena of open positions with insertion-order iteration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PositionArena {
    slots: Vec<Option<Position>>,
    open: usize,
}

impl PositionArena {
    pub fn insert(&mut self, position: Position) -> PositionHandle {
        let handle = PositionHandle(self.slots.len() as u64);
        self.slots.push(Some(position));
        self.open += 1;
        handle
    }

    pub fn remove(&mut self, handle: PositionHandle) -> Option<Position> {
        let slot = self.slots.get_mut(handle.0 as usize)?;
        let position = slot.take();
        if position.is_some() {
            self.open -= 1;
        }
        position
    }

    pub fn get(&self, handle: PositionHandle) -> Option<&Position> {
        self.slots.get(handle.0 as usize)?.as_ref()
    }

    /// Open positions in insertion order (deterministic).
    pub fn iter_open(&self) -> impl Iterator<Item = (PositionHandle, &Position)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|p| (PositionHandle(i as u64), p)))
    }

    /// Handles of open positions in insertion order.
    pub fn open_handles(&self) -> Vec<PositionHandle> {
        self.iter_open().map(|(h, _)| h).collect()
    }

    pub fn open_count(&self) -> usize {
        self.open
    }
}

/// Snapshot of the capital state, handed out with the simulation result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapitalState {
    pub initial_capital: f64,
    pub free_cash: f64,
    pub total_capital: f64,
    pub positions: Vec<Position>,
    pub completed_trades: Vec<TradeExecution>,
}

/// The single mutable aggregate of one simulation run.
#[derive(Debug, Clone)]
pub struct CapitalLedger {
    initial_capital: f64,
    free_cash: f64,
    arena: PositionArena,
    completed: Vec<TradeExecution>,
}

impl CapitalLedger {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            initial_capital,
            free_cash: initial_capital,
            arena: PositionArena::default(),
            completed: Vec::new(),
        }
    }

    pub fn free_cash(&self) -> f64 {
        self.free_cash
    }

    pub fn initial_capital(&self) -> f64 {
        self.initial_capital
    }

    /// Sum of the sizes of currently open positions.
    pub fn open_exposure(&self) -> f64 {
        self.arena.iter_open().map(|(_, p)| p.size_usd).sum()
    }

    /// Free cash plus open exposure at entry size. Unrealized PnL of open
    /// positions is treated as zero (documented modeling simplification,
    /// not a live mark-to-market).
    pub fn total_capital(&self) -> f64 {
        self.free_cash + self.open_exposure()
    }

    pub fn open_count(&self) -> usize {
        self.arena.open_count()
    }

    pub fn open_handles(&self) -> Vec<PositionHandle> {
        self.arena.open_handles()
    }

    pub fn position(&self, handle: PositionHandle) -> Option<&Position> {
        self.arena.get(handle)
    }

    pub fn completed_trades(&self) -> &[TradeExecution] {
        &self.completed
    }

    /// Debit free cash and insert the position. The size must already be
    /// within free cash; violating that is a simulator bug.
    pub fn open_position(&mut self, position: Position) -> Result<PositionHandle, LedgerError> {
        let size = position.size_usd;
        if size < 0.0 || !size.is_finite() {
            return Err(LedgerError::NegativeSize(size));
        }
        if size > self.free_cash {
            return Err(LedgerError::InsufficientCash { size, free_cash: self.free_cash });
        }
        self.free_cash -= size;
        Ok(self.arena.insert(position))
    }

    /// Close a position with a resolved exit: credit the proceeds back to
    /// free cash, remove the position, append the trade.
    ///
    /// Proceeds are floored at zero so round-trip fees on a near-total
    /// loss cannot drive free cash negative; the recorded pnl stays
    /// consistent with the credited amount.
    pub fn close_position(
        &mut self,
        handle: PositionHandle,
        exit: &ResolvedExit,
        fee: f64,
    ) -> Result<&TradeExecution, LedgerError> {
        let position = self
            .arena
            .remove(handle)
            .ok_or(LedgerError::UnknownPosition(handle))?;

        let size = position.size_usd;
        let gross_pnl = size * (exit.exit_mult - 1.0);
        let proceeds = (size + gross_pnl - fee).max(0.0);
        let pnl = proceeds - size;
        self.free_cash += proceeds;

        self.completed.push(TradeExecution {
            call_id: position.call_id,
            entry_ts_ms: position.entry_ts_ms,
            exit_ts_ms: exit.exit_ts_ms,
            entry_px: position.entry_px,
            exit_px: exit.exit_px,
            size_usd: size,
            gross_pnl,
            fee,
            pnl,
            exit_reason: exit.reason,
            exit_mult: exit.exit_mult,
        });
        Ok(self.completed.last().expect("just pushed"))
    }

    pub fn snapshot(&self) -> CapitalState {
        CapitalState {
            initial_capital: self.initial_capital,
            free_cash: self.free_cash,
            total_capital: self.total_capital(),
            positions: self.arena.iter_open().map(|(_, p)| p.clone()).collect(),
            completed_trades: self.completed.clone(),
        }
    }
}
