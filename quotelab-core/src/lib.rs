//! quotelab core: market-making backtest engine.
//!
//! - Domain types (bars, orders, fills, positions, portfolio, instruments)
//! - Market data containers and timestamp alignment
//! - Causal indicators computed ahead of the run
//! - Quoting strategies and their factory
//! - Risk policies and portfolio risk metrics
//! - Fill engine with pluggable intrabar assumptions
//! - The step loop that ties them together and records snapshots

pub mod data;
pub mod domain;
pub mod engine;
pub mod execution;
pub mod indicators;
pub mod risk;
pub mod strategy;
