//! Backtest runner: wires config, data, engine and metrics together.
//!
//! - `run_backtest()`: one config against pre-loaded data. No I/O.
//! - `run_from_config()`: resolves the config's data source first. Used by the CLI.
//! - `run_batch()`: independent runs, optionally on the rayon pool.

use std::path::Path;

use quotelab_core::data::MarketData;
use quotelab_core::engine::{RunState, Simulation, SimulationError, SimulationReport};
use quotelab_core::indicators::attach_indicators;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{BacktestConfig, ConfigError, RunId};
use crate::data_loader::{load_market_data, LoadError};
use crate::metrics::PerformanceMetrics;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("engine config error: {0}")]
    Engine(#[from] quotelab_core::engine::ConfigError),
    #[error("simulation failed: {0}")]
    Simulation(#[from] SimulationError),
}

/// Current schema version for persisted results.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete result of one backtest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: RunId,
    pub config: BacktestConfig,
    pub dataset_hash: String,
    pub metrics: PerformanceMetrics,
    pub report: SimulationReport,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Run `config` against `data`.
///
/// Indicator columns the strategies need are computed on a copy of `data`;
/// columns already present are kept.
pub fn run_backtest(config: &BacktestConfig, data: &MarketData) -> Result<BacktestResult, RunError> {
    config.validate()?;
    let run_id = config.run_id()?;

    let mut data = data.clone();
    for symbol in &config.symbols {
        if let Some(series) = data.get_mut(&symbol.name) {
            attach_indicators(series, &symbol.strategy.required_indicators());
        }
    }
    let dataset_hash = crate::data_loader::dataset_hash(&data);

    let simulation = Simulation::new(config.simulation_config(), config.build_strategies()?, config.risk.build())?;
    info!(run_id = %short(&run_id), symbols = config.symbols.len(), steps = data.num_steps(), "backtest starting");

    let report = simulation.run(&data)?;
    let metrics = PerformanceMetrics::compute(&report, config.metrics.periods_per_year);
    info!(
        run_id = %short(&run_id),
        state = %report.final_state,
        total_return = metrics.total_return,
        fills = metrics.fill_count,
        "backtest finished"
    );

    Ok(BacktestResult {
        schema_version: SCHEMA_VERSION,
        run_id,
        config: config.clone(),
        dataset_hash,
        metrics,
        report,
    })
}

/// Load the config's data (or CSVs from `data_dir`) and run it.
pub fn run_from_config(config: &BacktestConfig, data_dir: Option<&Path>) -> Result<BacktestResult, RunError> {
    config.validate()?;
    let loaded = load_market_data(&config.data, &config.symbol_names(), data_dir)?;
    run_backtest(config, &loaded.data)
}

/// One run of a batch and how it ended.
#[derive(Debug)]
pub struct BatchEntry {
    pub index: usize,
    pub outcome: Result<BacktestResult, RunError>,
}

impl BatchEntry {
    /// Final state of the run; runs that never produced a report count as failed.
    pub fn state(&self) -> RunState {
        match &self.outcome {
            Ok(result) => result.report.final_state,
            Err(_) => RunState::Failed,
        }
    }

    pub fn result(&self) -> Option<&BacktestResult> {
        self.outcome.as_ref().ok()
    }
}

/// Run every config against the same data. Entries come back in input order,
/// and a failed run does not stop the others.
pub fn run_batch(configs: &[BacktestConfig], data: &MarketData, parallel: bool) -> Vec<BatchEntry> {
    let run = |(index, config): (usize, &BacktestConfig)| {
        let outcome = run_backtest(config, data);
        if let Err(e) = &outcome {
            warn!(index, error = %e, "batch run failed");
        }
        BatchEntry { index, outcome }
    };

    if parallel {
        configs.par_iter().enumerate().map(run).collect()
    } else {
        configs.iter().enumerate().map(run).collect()
    }
}

fn short(run_id: &str) -> &str {
    run_id.get(..12).unwrap_or(run_id)
}
