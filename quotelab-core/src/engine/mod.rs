//! Simulation engine: one run, step by step, from quotes to snapshots.
//!
//! A `Simulation` is built from a `SimulationConfig`, one strategy per symbol
//! and a shared risk policy. `run` validates the market data up front, then
//! drives Strategy → Risk → Fill → Portfolio → continuation once per step and
//! records a `SimulationSnapshot` for every processed step.

pub mod config;
pub mod error;
pub mod portfolio_update;
pub mod simulation;
pub mod snapshot;
pub mod state;

pub use config::{ConfigError, SimulationConfig};
pub use error::{ContractViolation, SimulationError};
pub use portfolio_update::{apply_fills, cash_flow};
pub use simulation::Simulation;
pub use snapshot::{
    PortfolioSnapshot, PositionSummary, RejectedOrder, SimulationReport, SimulationSnapshot, SymbolSnapshot,
};
pub use state::{RunState, StopReason};
