//! Result export: snapshots as JSON and flat CSV, metrics and sweeps as JSON.
//!
//! `export_run` writes the standard artifact set of one backtest into a
//! directory:
//!
//! ```text
//! <dir>/result.json      run id, config, dataset hash, metrics
//! <dir>/metrics.json
//! <dir>/snapshots.json
//! <dir>/snapshots.csv    one row per step and symbol
//! ```

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use quotelab_core::domain::Side;
use quotelab_core::engine::{RunState, SimulationReport};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::metrics::PerformanceMetrics;
use crate::runner::BacktestResult;
use crate::sweep::SweepReport;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Paths written by `export_run`.
#[derive(Debug, Clone, PartialEq)]
pub struct RunArtifacts {
    pub result: PathBuf,
    pub metrics: PathBuf,
    pub snapshots_json: PathBuf,
    pub snapshots_csv: PathBuf,
}

/// One CSV row: a symbol's view of one step plus the portfolio totals.
#[derive(Debug, Serialize)]
struct SnapshotRow<'a> {
    step: usize,
    timestamp: DateTime<Utc>,
    state: RunState,
    symbol: &'a str,
    bid_count: usize,
    ask_count: usize,
    best_bid: Option<f64>,
    best_ask: Option<f64>,
    reservation_price: Option<f64>,
    spread: Option<f64>,
    rejected: usize,
    fills: usize,
    bought: f64,
    sold: f64,
    quantity: f64,
    avg_entry_price: Option<f64>,
    mark_price: Option<f64>,
    realized_pnl: Option<f64>,
    unrealized_pnl: Option<f64>,
    leverage: Option<f64>,
    cash: f64,
    equity: f64,
    aggregate_leverage: f64,
    margin_ratio: Option<f64>,
    drawdown: f64,
}

/// Run summary without the (large) snapshot list.
#[derive(Serialize)]
struct ResultSummary<'a> {
    schema_version: u32,
    run_id: &'a str,
    dataset_hash: &'a str,
    config: &'a crate::config::BacktestConfig,
    metrics: &'a PerformanceMetrics,
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ExportError> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, value)?;
    Ok(())
}

pub fn write_snapshots_json(path: &Path, report: &SimulationReport) -> Result<(), ExportError> {
    write_json(path, &report.snapshots)
}

pub fn write_snapshots_csv(path: &Path, report: &SimulationReport) -> Result<(), ExportError> {
    let mut writer = csv::Writer::from_path(path)?;
    for snap in &report.snapshots {
        for (symbol, view) in &snap.symbols {
            let bids = view.quotes.iter().filter(|q| q.order.side() == Side::Bid);
            let asks = view.quotes.iter().filter(|q| q.order.side() == Side::Ask);
            let position = view.position.as_ref();
            writer.serialize(SnapshotRow {
                step: snap.step,
                timestamp: snap.timestamp,
                state: snap.state,
                symbol,
                bid_count: bids.clone().count(),
                ask_count: asks.clone().count(),
                best_bid: bids.map(|q| q.order.price()).reduce(f64::max),
                best_ask: asks.map(|q| q.order.price()).reduce(f64::min),
                reservation_price: view.reservation_price,
                spread: view.spread,
                rejected: view.rejected.len(),
                fills: view.fills.len(),
                bought: view.fills.iter().filter(|f| f.side == Side::Bid).map(|f| f.size).sum(),
                sold: view.fills.iter().filter(|f| f.side == Side::Ask).map(|f| f.size).sum(),
                quantity: position.map_or(0.0, |p| p.quantity),
                avg_entry_price: position.and_then(|p| p.avg_entry_price),
                mark_price: position.map(|p| p.mark_price),
                realized_pnl: position.map(|p| p.realized_pnl),
                unrealized_pnl: position.map(|p| p.unrealized_pnl),
                leverage: position.map(|p| p.leverage),
                cash: snap.portfolio.cash,
                equity: snap.portfolio.equity,
                aggregate_leverage: snap.portfolio.aggregate_leverage,
                margin_ratio: snap.portfolio.margin_ratio,
                drawdown: snap.portfolio.drawdown,
            })?;
        }
    }
    writer.flush()?;
    Ok(())
}

pub fn write_metrics_json(path: &Path, metrics: &PerformanceMetrics) -> Result<(), ExportError> {
    write_json(path, metrics)
}

pub fn write_sweep_json(path: &Path, report: &SweepReport) -> Result<(), ExportError> {
    write_json(path, report)
}

/// Write the standard artifact set of one run into `dir`, creating it if needed.
pub fn export_run(dir: &Path, result: &BacktestResult) -> Result<RunArtifacts, ExportError> {
    fs::create_dir_all(dir)?;
    let artifacts = RunArtifacts {
        result: dir.join("result.json"),
        metrics: dir.join("metrics.json"),
        snapshots_json: dir.join("snapshots.json"),
        snapshots_csv: dir.join("snapshots.csv"),
    };

    write_json(
        &artifacts.result,
        &ResultSummary {
            schema_version: result.schema_version,
            run_id: &result.run_id,
            dataset_hash: &result.dataset_hash,
            config: &result.config,
            metrics: &result.metrics,
        },
    )?;
    write_metrics_json(&artifacts.metrics, &result.metrics)?;
    write_snapshots_json(&artifacts.snapshots_json, &result.report)?;
    write_snapshots_csv(&artifacts.snapshots_csv, &result.report)?;

    info!(dir = %dir.display(), run_id = %result.run_id, "artifacts written");
    Ok(artifacts)
}
