//! Artifact export — CSV trade dumps and opaque artifact publishing.
//!
//! Downstream storage is somebody else's problem: results leave through
//! the `ArtifactSink` trait as serialized JSON payloads, and trade logs
//! can be written to CSV for spreadsheet-level inspection.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use calllab_core::domain::{ExitReason, TradeExecution};
use calllab_core::simulator::CapitalSimulationResult;

use crate::optimizer::OptimizerReport;

/// Opaque destination for run artifacts. Implementations may write to
/// disk, a database, or an object store; the engine never knows which.
/// `publish` returns the stored artifact's identifier.
pub trait ArtifactSink {
    fn publish(&mut self, artifact_type: &str, payload: &serde_json::Value) -> Result<String>;
}

/// In-memory sink for tests and dry runs. Artifact ids are content
/// hashes, so identical payloads get identical ids.
#[derive(Debug, Default)]
pub struct MemorySink {
    artifacts: Vec<(String, String, serde_json::Value)>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn artifacts(&self) -> &[(String, String, serde_json::Value)] {
        &self.artifacts
    }

    pub fn get(&self, id: &str) -> Option<&serde_json::Value> {
        self.artifacts
            .iter()
            .find(|(stored_id, _, _)| stored_id == id)
            .map(|(_, _, payload)| payload)
    }
}

impl ArtifactSink for MemorySink {
    fn publish(&mut self, artifact_type: &str, payload: &serde_json::Value) -> Result<String> {
        let canonical = serde_json::to_string(payload)?;
        let id = blake3::hash(canonical.as_bytes()).to_hex().to_string();
        self.artifacts
            .push((id.clone(), artifact_type.to_string(), payload.clone()));
        Ok(id)
    }
}

/// Publish a capital simulation result to the sink.
pub fn publish_simulation(
    sink: &mut dyn ArtifactSink,
    run_id: &str,
    result: &CapitalSimulationResult,
) -> Result<String> {
    let payload = serde_json::json!({
        "run_id": run_id,
        "result": result,
    });
    sink.publish("capital_simulation", &payload)
}

/// Publish an optimizer report to the sink.
pub fn publish_optimizer_report(
    sink: &mut dyn ArtifactSink,
    run_id: &str,
    report: &OptimizerReport,
) -> Result<String> {
    let payload = serde_json::json!({
        "run_id": run_id,
        "report": report,
    });
    sink.publish("optimizer_report", &payload)
}

#[derive(Debug, Serialize)]
struct TradeCsvRow<'a> {
    call_id: &'a str,
    entry_time: String,
    exit_time: String,
    entry_px: f64,
    exit_px: f64,
    size_usd: f64,
    gross_pnl: f64,
    fee: f64,
    pnl: f64,
    exit_reason: ExitReason,
    exit_mult: f64,
}

fn iso_ts(ms: i64) -> Result<String> {
    let dt: DateTime<Utc> = DateTime::from_timestamp_millis(ms)
        .with_context(|| format!("timestamp {ms} out of range"))?;
    Ok(dt.to_rfc3339())
}

/// Write completed trades to a CSV file, one row per trade, timestamps
/// in ISO-8601 UTC.
pub fn write_trades_csv(path: &Path, trades: &[TradeExecution]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    for trade in trades {
        writer.serialize(TradeCsvRow {
            call_id: trade.call_id.as_str(),
            entry_time: iso_ts(trade.entry_ts_ms)?,
            exit_time: iso_ts(trade.exit_ts_ms)?,
            entry_px: trade.entry_px,
            exit_px: trade.exit_px,
            size_usd: trade.size_usd,
            gross_pnl: trade.gross_pnl,
            fee: trade.fee,
            pnl: trade.pnl,
            exit_reason: trade.exit_reason,
            exit_mult: trade.exit_mult,
        })?;
    }
    writer.flush()?;
    Ok(())
}
