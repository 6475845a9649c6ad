//! Parameter sweep: grid search over one symbol's strategy parameters.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::str::FromStr;

use quotelab_core::data::MarketData;
use quotelab_core::engine::RunState;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::config::{BacktestConfig, RunId};
use crate::metrics::PerformanceMetrics;
use crate::runner::run_batch;

#[derive(Debug, Error)]
pub enum SweepError {
    #[error("config has no [sweep] section")]
    NotConfigured,
    #[error("sweep symbol '{0}' is not in the config")]
    UnknownSymbol(String),
    #[error("parameter grid is empty")]
    EmptyGrid,
}

/// What a sweep maximizes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Objective {
    #[default]
    Sharpe,
    TotalReturn,
    Sortino,
}

impl Objective {
    pub fn score(&self, metrics: &PerformanceMetrics) -> f64 {
        match self {
            Objective::Sharpe => metrics.sharpe,
            Objective::TotalReturn => metrics.total_return,
            Objective::Sortino => metrics.sortino,
        }
    }
}

impl FromStr for Objective {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sharpe" => Ok(Objective::Sharpe),
            "total_return" => Ok(Objective::TotalReturn),
            "sortino" => Ok(Objective::Sortino),
            other => Err(format!("unknown objective '{other}' (sharpe, total_return, sortino)")),
        }
    }
}

/// Named parameter → candidate values.
///
/// Combinations are enumerated in parameter-name order with the last name
/// varying fastest, so the same grid always yields the same sequence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamGrid {
    params: BTreeMap<String, Vec<f64>>,
}

impl ParamGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(params: BTreeMap<String, Vec<f64>>) -> Self {
        Self { params }
    }

    pub fn with_param(mut self, name: impl Into<String>, values: Vec<f64>) -> Self {
        self.params.insert(name.into(), values);
        self
    }

    /// Number of combinations. Zero when any parameter has no values.
    pub fn size(&self) -> usize {
        if self.params.is_empty() {
            return 0;
        }
        self.params.values().map(Vec::len).product()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn combinations(&self) -> Vec<BTreeMap<String, f64>> {
        if self.is_empty() {
            return Vec::new();
        }
        let mut combos = vec![BTreeMap::new()];
        for (name, values) in &self.params {
            combos = combos
                .into_iter()
                .flat_map(|combo| {
                    values.iter().map(move |&v| {
                        let mut next = combo.clone();
                        next.insert(name.clone(), v);
                        next
                    })
                })
                .collect();
        }
        combos
    }
}

/// Parameter sweep executor.
///
/// Runs one backtest per grid point, in parallel unless told otherwise.
#[derive(Debug, Clone)]
pub struct ParamSweep {
    base: BacktestConfig,
    symbol: String,
    grid: ParamGrid,
    objective: Objective,
    parallel: bool,
}

impl ParamSweep {
    pub fn new(base: BacktestConfig, symbol: impl Into<String>, grid: ParamGrid) -> Self {
        Self {
            base,
            symbol: symbol.into(),
            grid,
            objective: Objective::default(),
            parallel: true,
        }
    }

    /// Build from the config's `[sweep]` section.
    pub fn from_config(config: &BacktestConfig) -> Result<Self, SweepError> {
        let sweep = config.sweep.as_ref().ok_or(SweepError::NotConfigured)?;
        Ok(Self::new(config.clone(), sweep.symbol.clone(), ParamGrid::from_map(sweep.params.clone()))
            .with_objective(sweep.objective))
    }

    pub fn with_objective(mut self, objective: Objective) -> Self {
        self.objective = objective;
        self
    }

    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn grid(&self) -> &ParamGrid {
        &self.grid
    }

    /// One config per grid point, with the sweep section stripped so run ids
    /// depend only on the resulting backtest.
    pub fn configs(&self) -> Result<Vec<BacktestConfig>, SweepError> {
        if self.base.symbol(&self.symbol).is_none() {
            return Err(SweepError::UnknownSymbol(self.symbol.clone()));
        }
        if self.grid.is_empty() {
            return Err(SweepError::EmptyGrid);
        }
        let mut base = self.base.clone();
        base.sweep = None;

        Ok(self
            .grid
            .combinations()
            .into_iter()
            .map(|combo| {
                let mut config = base.clone();
                if let Some(symbol) = config.symbol_mut(&self.symbol) {
                    for (name, value) in combo {
                        symbol.strategy = symbol.strategy.clone().with_param(name, value);
                    }
                }
                config
            })
            .collect())
    }

    pub fn run(&self, data: &MarketData) -> Result<SweepReport, SweepError> {
        let configs = self.configs()?;
        let combos = self.grid.combinations();
        info!(symbol = %self.symbol, runs = configs.len(), parallel = self.parallel, "sweep starting");

        let entries: Vec<SweepEntry> = run_batch(&configs, data, self.parallel)
            .into_iter()
            .zip(combos)
            .map(|(entry, params)| {
                let state = entry.state();
                match entry.outcome {
                    Ok(result) => SweepEntry {
                        index: entry.index,
                        params,
                        run_id: Some(result.run_id),
                        score: Some(self.objective.score(&result.metrics)),
                        final_state: state,
                        metrics: Some(result.metrics),
                        error: None,
                    },
                    Err(e) => SweepEntry {
                        index: entry.index,
                        params,
                        run_id: None,
                        score: None,
                        final_state: state,
                        metrics: None,
                        error: Some(e.to_string()),
                    },
                }
            })
            .collect();

        let report = SweepReport::new(self.symbol.clone(), self.objective, entries);
        if let Some(best) = report.best() {
            info!(index = best.index, score = ?best.score, params = ?best.params, "sweep finished");
        }
        Ok(report)
    }
}

/// One grid point and how its run went.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepEntry {
    pub index: usize,
    pub params: BTreeMap<String, f64>,
    pub run_id: Option<RunId>,
    pub score: Option<f64>,
    pub final_state: RunState,
    pub metrics: Option<PerformanceMetrics>,
    pub error: Option<String>,
}

impl SweepEntry {
    fn rank_key(&self) -> f64 {
        match self.score {
            Some(s) if !s.is_nan() => s,
            _ => f64::NEG_INFINITY,
        }
    }
}

/// Results of a sweep, in grid order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepReport {
    pub symbol: String,
    pub objective: Objective,
    pub entries: Vec<SweepEntry>,
    /// Index into `entries` of the best scored run.
    pub best: Option<usize>,
}

impl SweepReport {
    fn new(symbol: String, objective: Objective, entries: Vec<SweepEntry>) -> Self {
        let mut report = Self {
            symbol,
            objective,
            entries,
            best: None,
        };
        let best = report.ranked().first().filter(|e| e.score.is_some()).map(|e| e.index);
        report.best = best;
        report
    }

    /// Entries by score, best first. Ties keep grid order; failed runs sort last.
    pub fn ranked(&self) -> Vec<&SweepEntry> {
        let mut sorted: Vec<&SweepEntry> = self.entries.iter().collect();
        sorted.sort_by(|a, b| {
            b.rank_key()
                .partial_cmp(&a.rank_key())
                .unwrap_or(Ordering::Equal)
                .then(a.index.cmp(&b.index))
        });
        sorted
    }

    pub fn top_n(&self, n: usize) -> Vec<&SweepEntry> {
        self.ranked().into_iter().take(n).collect()
    }

    pub fn best(&self) -> Option<&SweepEntry> {
        self.best.and_then(|i| self.entries.get(i))
    }

    pub fn failed_count(&self) -> usize {
        self.entries.iter().filter(|e| e.error.is_some()).count()
    }
}
