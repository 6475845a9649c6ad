use super::config::ConfigError;
use super::snapshot::PortfolioSnapshot;
use crate::data::DataShapeError;
use crate::execution::FillEngineInvariantError;
use crate::strategy::StrategyError;
use thiserror::Error;

/// How a strategy broke its contract with the engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ContractViolation {
    #[error(transparent)]
    Failed(#[from] StrategyError),

    #[error("emitted an order with price {price} and size {size}")]
    MalformedOrder { price: f64, size: f64 },

    #[error("emitted an order for {0}")]
    ForeignSymbol(String),
}

/// A fatal run error. Step-level failures carry the portfolio as it stood.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid market data: {0}")]
    DataShape(#[from] DataShapeError),

    #[error("strategy for {symbol} failed at step {step}: {reason}")]
    StrategyContract {
        step: usize,
        symbol: String,
        reason: ContractViolation,
        state: Box<PortfolioSnapshot>,
    },

    #[error("fill engine invariant violated at step {step}: {source}")]
    FillInvariant {
        step: usize,
        source: FillEngineInvariantError,
        state: Box<PortfolioSnapshot>,
    },
}

impl SimulationError {
    /// Step at which the run failed, `None` when it never started.
    pub fn step(&self) -> Option<usize> {
        match self {
            SimulationError::StrategyContract { step, .. } | SimulationError::FillInvariant { step, .. } => {
                Some(*step)
            }
            _ => None,
        }
    }

    pub fn state(&self) -> Option<&PortfolioSnapshot> {
        match self {
            SimulationError::StrategyContract { state, .. } | SimulationError::FillInvariant { state, .. } => {
                Some(state)
            }
            _ => None,
        }
    }
}
