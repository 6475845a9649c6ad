//! Construction-time configuration of one simulation run.

use crate::domain::Instrument;
use crate::execution::{FeeSchedule, IntrabarPolicy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Invalid run configuration, reported before any step runs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("initial cash must be positive and finite, got {0}")]
    InitialCash(f64),

    #[error("{name} fee must be non-negative and finite, got {value}")]
    Fee { name: &'static str, value: f64 },

    #[error("instrument {symbol}: {reason}")]
    Instrument { symbol: String, reason: String },

    #[error("risk limits: {0}")]
    RiskLimits(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub initial_cash: f64,
    pub maker_fee: f64,
    pub taker_fee: f64,
    pub intrabar_policy: IntrabarPolicy,
    /// Liquidate every open position at the close of the last step.
    pub flatten_at_end: bool,
    /// Per-symbol overrides (tick size, leverage cap, margin rate).
    pub instruments: BTreeMap<String, Instrument>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        let fees = FeeSchedule::default();
        Self {
            initial_cash: 100_000.0,
            maker_fee: fees.maker,
            taker_fee: fees.taker,
            intrabar_policy: IntrabarPolicy::default(),
            flatten_at_end: false,
            instruments: BTreeMap::new(),
        }
    }
}

impl SimulationConfig {
    /// Default configuration with zero fees.
    pub fn frictionless(initial_cash: f64) -> Self {
        Self {
            initial_cash,
            maker_fee: 0.0,
            taker_fee: 0.0,
            ..Self::default()
        }
    }

    pub fn with_instrument(mut self, symbol: impl Into<String>, instrument: Instrument) -> Self {
        self.instruments.insert(symbol.into(), instrument);
        self
    }

    pub fn fees(&self) -> FeeSchedule {
        FeeSchedule {
            maker: self.maker_fee,
            taker: self.taker_fee,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.initial_cash.is_finite() && self.initial_cash > 0.0) {
            return Err(ConfigError::InitialCash(self.initial_cash));
        }
        for (name, value) in [("maker", self.maker_fee), ("taker", self.taker_fee)] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::Fee { name, value });
            }
        }
        for (symbol, instrument) in &self.instruments {
            let overrides = [
                ("tick_size", instrument.tick_size),
                ("max_leverage", instrument.max_leverage),
                ("margin_rate", instrument.margin_rate),
            ];
            for (field, value) in overrides {
                if let Some(v) = value {
                    if !(v.is_finite() && v > 0.0) {
                        return Err(ConfigError::Instrument {
                            symbol: symbol.clone(),
                            reason: format!("{field} must be positive, got {v}"),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}
