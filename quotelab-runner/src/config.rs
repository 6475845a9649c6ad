//! Serializable backtest configuration.
//!
//! A run file is TOML:
//!
//! ```toml
//! [simulation]
//! initial_cash = 100000.0
//! maker_fee = 0.0002
//!
//! [risk]
//! type = "BASIC"
//! [risk.limits]
//! max_leverage = 1.0
//!
//! [data]
//! source = "csv"
//! dir = "data/hourly"
//!
//! [[symbols]]
//! name = "BTCUSDT"
//! [symbols.strategy]
//! type = "avellaneda_stoikov"
//! [symbols.strategy.params]
//! risk_aversion = 0.1
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use quotelab_core::domain::Instrument;
use quotelab_core::engine::SimulationConfig;
use quotelab_core::risk::{BasicRiskPolicy, PermissiveRiskPolicy, RiskLimits, RiskPolicy};
use quotelab_core::strategy::{create_strategy, FactoryError, Strategy, StrategyConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::metrics::DEFAULT_PERIODS_PER_YEAR;
use crate::sweep::Objective;
use crate::synthetic::SyntheticConfig;

/// Content hash of a config, stable across runs and machines.
pub type RunId = String;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("config serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Simulation(#[from] quotelab_core::engine::ConfigError),

    #[error("strategy for '{symbol}': {source}")]
    Factory {
        symbol: String,
        #[source]
        source: FactoryError,
    },

    #[error("invalid risk limits: {0}")]
    RiskLimits(String),

    #[error("config lists no symbols")]
    NoSymbols,

    #[error("symbol '{0}' is listed more than once")]
    DuplicateSymbol(String),

    #[error("invalid synthetic data settings: {0}")]
    Synthetic(String),

    #[error("invalid sweep: {0}")]
    Sweep(String),

    #[error("periods_per_year must be positive, got {0}")]
    PeriodsPerYear(f64),
}

/// Everything needed to reproduce one backtest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    #[serde(default)]
    pub simulation: SimulationConfig,

    #[serde(default)]
    pub risk: RiskConfig,

    #[serde(default)]
    pub data: DataConfig,

    pub symbols: Vec<SymbolConfig>,

    #[serde(default)]
    pub metrics: MetricsConfig,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sweep: Option<SweepConfig>,
}

/// Risk policy selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskConfig {
    Basic {
        #[serde(default)]
        limits: RiskLimits,
    },
    Permissive,
}

impl Default for RiskConfig {
    fn default() -> Self {
        RiskConfig::Basic {
            limits: RiskLimits::default(),
        }
    }
}

impl RiskConfig {
    pub fn build(&self) -> Box<dyn RiskPolicy> {
        match self {
            RiskConfig::Basic { limits } => Box::new(BasicRiskPolicy::new(limits.clone())),
            RiskConfig::Permissive => Box::new(PermissiveRiskPolicy),
        }
    }
}

/// Where market data comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum DataConfig {
    /// One `<SYMBOL>.csv` per symbol under `dir`.
    Csv { dir: PathBuf },
    Synthetic(SyntheticConfig),
}

impl Default for DataConfig {
    fn default() -> Self {
        DataConfig::Synthetic(SyntheticConfig::default())
    }
}

/// One traded symbol: its strategy and optional instrument overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolConfig {
    pub name: String,
    pub strategy: StrategyConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instrument: Option<Instrument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Steps per year used to annualize Sharpe and Sortino.
    pub periods_per_year: f64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            periods_per_year: DEFAULT_PERIODS_PER_YEAR,
        }
    }
}

/// Grid search over one symbol's strategy parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepConfig {
    pub symbol: String,
    #[serde(default)]
    pub objective: Objective,
    pub params: BTreeMap<String, Vec<f64>>,
}

impl BacktestConfig {
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Hash of the canonical JSON form. Identical configs share a run id.
    pub fn run_id(&self) -> Result<RunId, ConfigError> {
        let json = serde_json::to_string(self)?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }

    pub fn symbol_names(&self) -> Vec<String> {
        self.symbols.iter().map(|s| s.name.clone()).collect()
    }

    pub fn symbol(&self, name: &str) -> Option<&SymbolConfig> {
        self.symbols.iter().find(|s| s.name == name)
    }

    pub fn symbol_mut(&mut self, name: &str) -> Option<&mut SymbolConfig> {
        self.symbols.iter_mut().find(|s| s.name == name)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbols.is_empty() {
            return Err(ConfigError::NoSymbols);
        }
        let mut seen = BTreeSet::new();
        for symbol in &self.symbols {
            if !seen.insert(symbol.name.as_str()) {
                return Err(ConfigError::DuplicateSymbol(symbol.name.clone()));
            }
        }

        self.simulation_config().validate()?;

        if let RiskConfig::Basic { limits } = &self.risk {
            limits.validate().map_err(ConfigError::RiskLimits)?;
        }

        if let DataConfig::Synthetic(synthetic) = &self.data {
            synthetic.validate().map_err(ConfigError::Synthetic)?;
        }

        let ppy = self.metrics.periods_per_year;
        if !(ppy.is_finite() && ppy > 0.0) {
            return Err(ConfigError::PeriodsPerYear(ppy));
        }

        if let Some(sweep) = &self.sweep {
            if self.symbol(&sweep.symbol).is_none() {
                return Err(ConfigError::Sweep(format!("unknown symbol '{}'", sweep.symbol)));
            }
            if sweep.params.is_empty() {
                return Err(ConfigError::Sweep("no parameters to sweep".into()));
            }
            if let Some((name, _)) = sweep.params.iter().find(|(_, values)| values.is_empty()) {
                return Err(ConfigError::Sweep(format!("parameter '{name}' has no values")));
            }
        }
        Ok(())
    }

    /// Simulation settings with per-symbol instrument overrides merged in.
    pub fn simulation_config(&self) -> SimulationConfig {
        let mut config = self.simulation.clone();
        for symbol in &self.symbols {
            if let Some(instrument) = &symbol.instrument {
                config.instruments.insert(symbol.name.clone(), instrument.clone());
            }
        }
        config
    }

    pub fn build_strategies(&self) -> Result<BTreeMap<String, Box<dyn Strategy>>, ConfigError> {
        self.symbols
            .iter()
            .map(|symbol| {
                let strategy = create_strategy(&symbol.strategy).map_err(|source| ConfigError::Factory {
                    symbol: symbol.name.clone(),
                    source,
                })?;
                Ok((symbol.name.clone(), strategy))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[simulation]
initial_cash = 50000.0
maker_fee = 0.0001
flatten_at_end = true

[risk]
type = "BASIC"
[risk.limits]
max_leverage = 2.0
emergency_leverage = 3.0

[data]
source = "csv"
dir = "data/hourly"

[[symbols]]
name = "BTCUSDT"
[symbols.strategy]
type = "avellaneda_stoikov"
[symbols.strategy.params]
risk_aversion = 0.1
sigma = 0.02
order_size = 0.5

[[symbols]]
name = "ETHUSDT"
[symbols.strategy]
type = "symmetric_grid"
[symbols.strategy.params]
spread = 0.002
[symbols.instrument]
tick_size = 0.01

[sweep]
symbol = "BTCUSDT"
objective = "total_return"
[sweep.params]
risk_aversion = [0.05, 0.1]
"#;

    #[test]
    fn parses_full_run_file() {
        let config = BacktestConfig::from_toml(SAMPLE).unwrap();
        assert_eq!(config.simulation.initial_cash, 50_000.0);
        assert_eq!(config.simulation.maker_fee, 0.0001);
        assert_eq!(config.simulation.taker_fee, 0.0005);
        assert!(config.simulation.flatten_at_end);
        match &config.risk {
            RiskConfig::Basic { limits } => {
                assert_eq!(limits.max_leverage, 2.0);
                assert_eq!(limits.max_drawdown, RiskLimits::default().max_drawdown);
            }
            other => panic!("expected basic risk, got {other:?}"),
        }
        assert_eq!(
            config.data,
            DataConfig::Csv {
                dir: PathBuf::from("data/hourly")
            }
        );
        assert_eq!(config.symbol_names(), vec!["BTCUSDT", "ETHUSDT"]);
        assert_eq!(config.symbols[0].strategy.params["sigma"], 0.02);
        let sweep = config.sweep.as_ref().unwrap();
        assert_eq!(sweep.objective, Objective::TotalReturn);
        assert_eq!(sweep.params["risk_aversion"], vec![0.05, 0.1]);
    }

    #[test]
    fn instrument_overrides_merge_into_simulation() {
        let config = BacktestConfig::from_toml(SAMPLE).unwrap();
        let sim = config.simulation_config();
        assert_eq!(sim.instruments["ETHUSDT"].tick_size, Some(0.01));
        assert!(!sim.instruments.contains_key("BTCUSDT"));
    }

    #[test]
    fn minimal_file_takes_defaults() {
        let config = BacktestConfig::from_toml(
            r#"
[[symbols]]
name = "SYN"
[symbols.strategy]
type = "symmetric_grid"
"#,
        )
        .unwrap();
        assert_eq!(config.simulation, SimulationConfig::default());
        assert_eq!(config.risk, RiskConfig::default());
        assert!(matches!(config.data, DataConfig::Synthetic(_)));
        assert_eq!(config.metrics.periods_per_year, DEFAULT_PERIODS_PER_YEAR);
        assert!(config.sweep.is_none());
    }

    #[test]
    fn permissive_risk_parses() {
        let config = BacktestConfig::from_toml(
            r#"
[risk]
type = "PERMISSIVE"

[[symbols]]
name = "SYN"
[symbols.strategy]
type = "symmetric_grid"
"#,
        )
        .unwrap();
        assert_eq!(config.risk, RiskConfig::Permissive);
        assert_eq!(config.risk.build().name(), PermissiveRiskPolicy.name());
    }

    #[test]
    fn run_id_is_deterministic_and_param_sensitive() {
        let a = BacktestConfig::from_toml(SAMPLE).unwrap();
        let b = BacktestConfig::from_toml(SAMPLE).unwrap();
        assert_eq!(a.run_id().unwrap(), b.run_id().unwrap());
        assert_eq!(a.run_id().unwrap().len(), 64);

        let mut c = a.clone();
        c.symbols[0].strategy = c.symbols[0].strategy.clone().with_param("risk_aversion", 0.2);
        assert_ne!(a.run_id().unwrap(), c.run_id().unwrap());
    }

    #[test]
    fn rejects_empty_and_duplicate_symbols() {
        let err = BacktestConfig::from_toml("symbols = []").unwrap_err();
        assert!(matches!(err, ConfigError::NoSymbols));

        let err = BacktestConfig::from_toml(
            r#"
[[symbols]]
name = "A"
[symbols.strategy]
type = "symmetric_grid"

[[symbols]]
name = "A"
[symbols.strategy]
type = "symmetric_grid"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateSymbol(ref s) if s == "A"));
    }

    #[test]
    fn rejects_bad_simulation_and_limits() {
        let err = BacktestConfig::from_toml(
            r#"
[simulation]
initial_cash = -1.0

[[symbols]]
name = "A"
[symbols.strategy]
type = "symmetric_grid"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Simulation(_)));

        let err = BacktestConfig::from_toml(
            r#"
[risk]
type = "BASIC"
[risk.limits]
max_leverage = 0.0

[[symbols]]
name = "A"
[symbols.strategy]
type = "symmetric_grid"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::RiskLimits(_)));
    }

    #[test]
    fn rejects_sweep_on_unknown_symbol() {
        let err = BacktestConfig::from_toml(
            r#"
[[symbols]]
name = "A"
[symbols.strategy]
type = "symmetric_grid"

[sweep]
symbol = "B"
[sweep.params]
spread = [0.001]
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Sweep(_)));
    }

    #[test]
    fn unknown_strategy_fails_at_build() {
        let config = BacktestConfig::from_toml(
            r#"
[[symbols]]
name = "A"
[symbols.strategy]
type = "martingale"
"#,
        )
        .unwrap();
        let err = config.build_strategies().map(|_| ()).unwrap_err();
        assert!(matches!(err, ConfigError::Factory { ref symbol, .. } if symbol == "A"));
    }

    #[test]
    fn malformed_toml_is_reported() {
        let err = BacktestConfig::from_toml("[[symbols]\nname = ").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }
}
