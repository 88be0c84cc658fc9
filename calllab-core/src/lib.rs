//! CallLab Core — capital-constrained simulation engine for token-call alerts.
//!
//! This crate contains the heart of the backtester:
//! - Domain types (calls, candles, positions, trades, exit policies)
//! - Candle replay resolver (entry location, first-triggered-exit scan)
//! - Capital ledger with an arena of open positions
//! - Capital-aware simulator over the chronological alert stream
//! - Truth layer (policy-free per-call path statistics)
//! - Policy executor (one call x one policy, grid-search building block)
//! - Collaborator seams for call and candle providers
//!
//! Everything in here is deterministic by contract: no wall clock, no
//! RNG, no hash-map iteration on any result-shaping path.

pub mod config;
pub mod domain;
pub mod exec;
pub mod ledger;
pub mod replay;
pub mod simulator;
pub mod sizing;
pub mod sources;
pub mod truth;
