//! Factory: converts a `StrategyConfig` into a runtime `Box<dyn Strategy>`.
//!
//! Configs are a type name plus a flat map of numeric parameters, which keeps
//! them trivially serializable and lets a parameter sweep override any value by
//! name. `required_indicators` tells the caller which indicator columns must be
//! precomputed for a config.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::avellaneda_stoikov::{AvellanedaStoikov, VolatilitySource};
use super::indicator_skew::{IndicatorSkew, SkewFactors};
use super::symmetric_grid::SymmetricGrid;
use super::{Sizing, Strategy};
use crate::indicators::{IndicatorKind, IndicatorSpec};

pub const AVELLANEDA_STOIKOV: &str = "avellaneda_stoikov";
pub const SYMMETRIC_GRID: &str = "symmetric_grid";
pub const INDICATOR_SKEW: &str = "indicator_skew";

/// Four maker fees of 2 bps: the narrowest spread that still earns after fees.
const DEFAULT_MIN_SPREAD: f64 = 0.0008;
const DEFAULT_WINDOW: usize = 7;
const DEFAULT_INVENTORY_FRACTION: f64 = 0.1;

// ─── Error type ──────────────────────────────────────────────────────

/// Errors that can occur during strategy construction.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FactoryError {
    #[error("Unknown strategy type: {0}")]
    UnknownStrategy(String),
    #[error("Invalid parameter '{param}' = {value} for {strategy}: {reason}")]
    InvalidParam {
        strategy: String,
        param: String,
        value: f64,
        reason: &'static str,
    },
}

// ─── Config ──────────────────────────────────────────────────────────

/// Serializable description of one strategy.
///
/// Uses `BTreeMap` for deterministic key ordering during serialization → hashing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StrategyConfig {
    #[serde(rename = "type")]
    pub strategy_type: String,
    #[serde(default)]
    pub params: BTreeMap<String, f64>,
}

impl StrategyConfig {
    pub fn new(strategy_type: impl Into<String>) -> Self {
        Self {
            strategy_type: strategy_type.into(),
            params: BTreeMap::new(),
        }
    }

    /// Set (or override) one parameter.
    pub fn with_param(mut self, name: impl Into<String>, value: f64) -> Self {
        self.params.insert(name.into(), value);
        self
    }

    /// Indicator columns this config reads, deduplicated, in a stable order.
    pub fn required_indicators(&self) -> Vec<IndicatorSpec> {
        let mut specs = match self.strategy_type.as_str() {
            AVELLANEDA_STOIKOV if !self.params.contains_key("sigma") => {
                vec![IndicatorSpec::new(
                    IndicatorKind::Volatility,
                    param_usize(self, "volatility_window", DEFAULT_WINDOW),
                )]
            }
            INDICATOR_SKEW => vec![
                IndicatorSpec::new(
                    IndicatorKind::Volatility,
                    param_usize(self, "volatility_window", DEFAULT_WINDOW),
                ),
                IndicatorSpec::new(
                    IndicatorKind::SmaDeviation,
                    param_usize(self, "sma_window", DEFAULT_WINDOW),
                ),
                IndicatorSpec::new(
                    IndicatorKind::Momentum,
                    param_usize(self, "momentum_window", DEFAULT_WINDOW),
                ),
            ],
            _ => Vec::new(),
        };
        specs.sort();
        specs.dedup();
        specs
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────

/// Extract a named f64 parameter, falling back to `default`.
fn param(config: &StrategyConfig, name: &str, default: f64) -> f64 {
    config.params.get(name).copied().unwrap_or(default)
}

/// Extract a named usize parameter, falling back to `default`.
fn param_usize(config: &StrategyConfig, name: &str, default: usize) -> usize {
    config
        .params
        .get(name)
        .copied()
        .map(|v| v as usize)
        .unwrap_or(default)
}

fn invalid(config: &StrategyConfig, param: &str, value: f64, reason: &'static str) -> FactoryError {
    FactoryError::InvalidParam {
        strategy: config.strategy_type.clone(),
        param: param.to_string(),
        value,
        reason,
    }
}

fn positive(config: &StrategyConfig, name: &str, default: f64) -> Result<f64, FactoryError> {
    let v = param(config, name, default);
    if v.is_finite() && v > 0.0 {
        Ok(v)
    } else {
        Err(invalid(config, name, v, "must be > 0"))
    }
}

fn non_negative(config: &StrategyConfig, name: &str, default: f64) -> Result<f64, FactoryError> {
    let v = param(config, name, default);
    if v.is_finite() && v >= 0.0 {
        Ok(v)
    } else {
        Err(invalid(config, name, v, "must be >= 0"))
    }
}

fn count(config: &StrategyConfig, name: &str, default: usize) -> Result<usize, FactoryError> {
    let v = param(config, name, default as f64);
    if v >= 1.0 && v.fract() == 0.0 {
        Ok(v as usize)
    } else {
        Err(invalid(config, name, v, "must be a whole number >= 1"))
    }
}

fn finite(config: &StrategyConfig, name: &str, default: f64) -> Result<f64, FactoryError> {
    let v = param(config, name, default);
    if v.is_finite() {
        Ok(v)
    } else {
        Err(invalid(config, name, v, "must be finite"))
    }
}

/// `order_size` selects fixed sizing. Otherwise a nonzero `adaptive_sizes`
/// selects adaptive sizing with `aggressivity` (default 1), and anything else
/// falls back to `inventory_fraction` (default 0.1) of the limit per side.
fn sizing(config: &StrategyConfig) -> Result<Sizing, FactoryError> {
    if config.params.contains_key("order_size") {
        Ok(Sizing::Fixed {
            size: positive(config, "order_size", 0.0)?,
        })
    } else if param(config, "adaptive_sizes", 0.0) != 0.0 {
        Ok(Sizing::Adaptive {
            aggressivity: positive(config, "aggressivity", 1.0)?,
        })
    } else {
        Ok(Sizing::InventoryFraction {
            fraction: positive(config, "inventory_fraction", DEFAULT_INVENTORY_FRACTION)?,
        })
    }
}

// ─── Strategy factory ────────────────────────────────────────────────

/// Create a strategy from a `StrategyConfig`.
pub fn create_strategy(config: &StrategyConfig) -> Result<Box<dyn Strategy>, FactoryError> {
    match config.strategy_type.as_str() {
        AVELLANEDA_STOIKOV => {
            let min_spread = non_negative(config, "min_spread", DEFAULT_MIN_SPREAD)?;
            let volatility = if config.params.contains_key("sigma") {
                VolatilitySource::Fixed(non_negative(config, "sigma", 0.0)?)
            } else {
                let window = count(config, "volatility_window", DEFAULT_WINDOW)?;
                let spec = IndicatorSpec::new(IndicatorKind::Volatility, window);
                VolatilitySource::Indicator {
                    name: spec.name(),
                    lookback: spec.build().lookback(),
                }
            };
            let mut strategy = AvellanedaStoikov::new(
                positive(config, "risk_aversion", 0.1)?,
                volatility,
                min_spread,
                sizing(config)?,
            )
            .with_levels(
                count(config, "levels", 1)?,
                non_negative(config, "level_spacing", min_spread)?,
            );
            if config.params.contains_key("resilience") {
                strategy = strategy.with_resilience(positive(config, "resilience", 0.0)?);
            }
            if config.params.contains_key("horizon") {
                strategy = strategy.with_horizon(
                    positive(config, "horizon", 0.0)?,
                    positive(config, "time_step", 1.0)?,
                );
            }
            Ok(Box::new(strategy))
        }
        SYMMETRIC_GRID => {
            let spread = positive(config, "spread", 0.002)?;
            Ok(Box::new(SymmetricGrid::new(
                spread,
                count(config, "levels", 1)?,
                non_negative(config, "level_spacing", spread)?,
                sizing(config)?,
            )))
        }
        INDICATOR_SKEW => {
            let defaults = SkewFactors::default();
            let factors = SkewFactors {
                inventory: finite(config, "inventory_factor", defaults.inventory)?,
                pnl: finite(config, "pnl_factor", defaults.pnl)?,
                mean_revert: finite(config, "mean_revert_factor", defaults.mean_revert)?,
                momentum: finite(config, "momentum_factor", defaults.momentum)?,
                base_spread: non_negative(config, "base_spread", defaults.base_spread)?,
                volatility: non_negative(config, "volatility_factor", defaults.volatility)?,
                momentum_spread: non_negative(
                    config,
                    "momentum_spread_factor",
                    defaults.momentum_spread,
                )?,
            };
            let strategy = IndicatorSkew::new(
                factors,
                positive(config, "min_spread", DEFAULT_MIN_SPREAD)?,
                count(config, "levels", 1)?,
                sizing(config)?,
            )
            .with_windows(
                count(config, "volatility_window", DEFAULT_WINDOW)?,
                count(config, "sma_window", DEFAULT_WINDOW)?,
                count(config, "momentum_window", DEFAULT_WINDOW)?,
            );
            Ok(Box::new(strategy))
        }
        other => Err(FactoryError::UnknownStrategy(other.into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(strategy_type: &str, params: &[(&str, f64)]) -> StrategyConfig {
        params
            .iter()
            .fold(StrategyConfig::new(strategy_type), |c, (k, v)| c.with_param(*k, *v))
    }

    fn bare(strategy_type: &str) -> StrategyConfig {
        StrategyConfig::new(strategy_type)
    }

    #[test]
    fn param_returns_value_if_present() {
        let c = config("x", &[("levels", 3.0)]);
        assert_eq!(param(&c, "levels", 1.0), 3.0);
        assert_eq!(param_usize(&c, "levels", 1), 3);
    }

    #[test]
    fn param_returns_default_if_missing() {
        let c = bare("x");
        assert_eq!(param(&c, "levels", 1.0), 1.0);
        assert_eq!(param_usize(&c, "levels", 1), 1);
    }

    // ── Factory (exhaustive) ────────────────────────────────────

    #[test]
    fn strategy_avellaneda_stoikov() {
        let s = create_strategy(&bare(AVELLANEDA_STOIKOV)).unwrap();
        assert!(s.name().starts_with("avellaneda_stoikov"));
        // volatility indicator window 7
        assert_eq!(s.warmup(), 7);
    }

    #[test]
    fn strategy_avellaneda_stoikov_fixed_sigma_has_no_warmup() {
        let s = create_strategy(&config(AVELLANEDA_STOIKOV, &[("sigma", 0.01)])).unwrap();
        assert_eq!(s.warmup(), 0);
    }

    #[test]
    fn strategy_symmetric_grid() {
        let s = create_strategy(&bare(SYMMETRIC_GRID)).unwrap();
        assert!(s.name().starts_with("symmetric_grid"));
    }

    #[test]
    fn strategy_indicator_skew() {
        let s = create_strategy(&config(INDICATOR_SKEW, &[("sma_window", 12.0)])).unwrap();
        assert_eq!(s.name(), "indicator_skew");
        assert_eq!(s.warmup(), 11);
    }

    #[test]
    fn unknown_strategy_is_an_error() {
        assert!(matches!(
            create_strategy(&bare("martingale")),
            Err(FactoryError::UnknownStrategy(_))
        ));
    }

    #[test]
    fn invalid_params_are_rejected() {
        let err = create_strategy(&config(AVELLANEDA_STOIKOV, &[("risk_aversion", 0.0)]))
            .err()
            .unwrap();
        assert!(matches!(err, FactoryError::InvalidParam { ref param, .. } if param == "risk_aversion"));

        assert!(create_strategy(&config(SYMMETRIC_GRID, &[("levels", 1.5)])).is_err());
        assert!(create_strategy(&config(SYMMETRIC_GRID, &[("order_size", -1.0)])).is_err());
        assert!(create_strategy(&config(INDICATOR_SKEW, &[("min_spread", 0.0)])).is_err());
    }

    #[test]
    fn sizing_mode_from_params() {
        assert_eq!(
            sizing(&config(SYMMETRIC_GRID, &[("order_size", 2.0), ("adaptive_sizes", 1.0)])),
            Ok(Sizing::Fixed { size: 2.0 })
        );
        assert_eq!(
            sizing(&config(SYMMETRIC_GRID, &[("adaptive_sizes", 1.0), ("aggressivity", 0.4)])),
            Ok(Sizing::Adaptive { aggressivity: 0.4 })
        );
        assert_eq!(
            sizing(&config(SYMMETRIC_GRID, &[("adaptive_sizes", 0.0)])),
            Ok(Sizing::InventoryFraction {
                fraction: DEFAULT_INVENTORY_FRACTION
            })
        );
        assert!(sizing(&config(SYMMETRIC_GRID, &[("adaptive_sizes", 1.0), ("aggressivity", 0.0)])).is_err());
    }

    // ── Required indicators ─────────────────────────────────────

    #[test]
    fn required_indicators_per_type() {
        assert_eq!(
            bare(AVELLANEDA_STOIKOV).required_indicators(),
            vec![IndicatorSpec::new(IndicatorKind::Volatility, 7)]
        );
        assert!(config(AVELLANEDA_STOIKOV, &[("sigma", 0.02)])
            .required_indicators()
            .is_empty());
        assert!(bare(SYMMETRIC_GRID).required_indicators().is_empty());
        assert_eq!(bare(INDICATOR_SKEW).required_indicators().len(), 3);
    }

    #[test]
    fn required_indicators_dedup_same_window() {
        let c = config(
            INDICATOR_SKEW,
            &[("volatility_window", 5.0), ("sma_window", 5.0), ("momentum_window", 5.0)],
        );
        // three different kinds, nothing to merge
        assert_eq!(c.required_indicators().len(), 3);
    }

    #[test]
    fn config_deserializes_from_toml_shape() {
        let c: StrategyConfig =
            serde_json::from_str(r#"{"type": "symmetric_grid", "params": {"spread": 0.004}}"#)
                .unwrap();
        assert_eq!(c.strategy_type, SYMMETRIC_GRID);
        assert_eq!(c.params["spread"], 0.004);
    }
}
