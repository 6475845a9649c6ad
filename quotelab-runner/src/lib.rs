//! quotelab runner: backtest orchestration around `quotelab-core`.
//!
//! This crate provides:
//! - TOML run files and content-addressed run ids
//! - CSV loading with timestamp alignment, and a synthetic Brownian generator
//! - Single runs, batches and parameter sweeps (rayon)
//! - Performance metrics over the snapshot sequence
//! - JSON and CSV export

pub mod config;
pub mod data_loader;
pub mod export;
pub mod metrics;
pub mod runner;
pub mod sweep;
pub mod synthetic;

pub use config::{BacktestConfig, ConfigError, DataConfig, RiskConfig, RunId, SymbolConfig};
pub use data_loader::{load_market_data, LoadError, LoadedData};
pub use export::{export_run, ExportError, RunArtifacts};
pub use metrics::PerformanceMetrics;
pub use runner::{run_backtest, run_batch, run_from_config, BacktestResult, BatchEntry, RunError};
pub use sweep::{Objective, ParamGrid, ParamSweep, SweepEntry, SweepError, SweepReport};
pub use synthetic::SyntheticConfig;
