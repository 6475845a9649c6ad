//! Per-step records: the engine's only output.

use super::state::{RunState, StopReason};
use crate::domain::{Fill, Order, Portfolio, Position, RestingOrder};
use crate::risk::{RejectReason, RiskMetrics, SymbolRiskMetrics};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A candidate order the risk policy refused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedOrder {
    pub order: Order,
    pub reason: RejectReason,
}

/// One symbol's position, valued at the step's mark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSummary {
    pub quantity: f64,
    pub avg_entry_price: Option<f64>,
    pub realized_pnl: f64,
    pub unrealized_pnl: f64,
    pub fees_paid: f64,
    pub mark_price: f64,
    pub leverage: f64,
}

impl PositionSummary {
    pub fn new(position: Option<&Position>, metrics: Option<&SymbolRiskMetrics>) -> Self {
        Self {
            quantity: position.map_or(0.0, |p| p.quantity),
            avg_entry_price: position.and_then(|p| p.avg_entry_price),
            realized_pnl: position.map_or(0.0, |p| p.realized_pnl),
            unrealized_pnl: metrics.map_or(0.0, |m| m.unrealized_pnl),
            fees_paid: position.map_or(0.0, |p| p.fees_paid),
            mark_price: metrics.map_or(0.0, |m| m.mark_price),
            leverage: metrics.map_or(0.0, |m| m.leverage),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SymbolSnapshot {
    /// Orders accepted this step, with their ids.
    pub quotes: Vec<RestingOrder>,
    pub rejected: Vec<RejectedOrder>,
    /// Maker fills first, then any liquidation fill.
    pub fills: Vec<Fill>,
    pub position: Option<PositionSummary>,
    /// Strategy's reservation price this step; `None` during warmup.
    #[serde(default)]
    pub reservation_price: Option<f64>,
    /// Strategy's top-of-book spread this step, in price units.
    #[serde(default)]
    pub spread: Option<f64>,
}

/// Portfolio-level figures at the step's mark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub cash: f64,
    pub equity: f64,
    pub unrealized_pnl: f64,
    pub realized_pnl: f64,
    pub margin_used: f64,
    pub margin_ratio: Option<f64>,
    pub aggregate_leverage: f64,
    pub maker_fees: f64,
    pub taker_fees: f64,
    pub peak_equity: f64,
    pub drawdown: f64,
}

impl PortfolioSnapshot {
    pub fn new(portfolio: &Portfolio, metrics: &RiskMetrics) -> Self {
        Self {
            cash: portfolio.cash,
            equity: metrics.equity,
            unrealized_pnl: metrics.unrealized_pnl,
            realized_pnl: metrics.realized_pnl,
            margin_used: metrics.margin_used,
            margin_ratio: metrics.margin_ratio,
            aggregate_leverage: metrics.aggregate_leverage,
            maker_fees: portfolio.maker_fees,
            taker_fees: portfolio.taker_fees,
            peak_equity: metrics.peak_equity,
            drawdown: metrics.drawdown,
        }
    }

    pub fn total_fees(&self) -> f64 {
        self.maker_fees + self.taker_fees
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSnapshot {
    pub step: usize,
    pub timestamp: DateTime<Utc>,
    /// Run state after this step.
    pub state: RunState,
    pub stop_reason: Option<StopReason>,
    pub symbols: BTreeMap<String, SymbolSnapshot>,
    pub portfolio: PortfolioSnapshot,
}

impl SimulationSnapshot {
    pub fn fills(&self) -> impl Iterator<Item = &Fill> {
        self.symbols.values().flat_map(|s| s.fills.iter())
    }

    pub fn fill_count(&self) -> usize {
        self.symbols.values().map(|s| s.fills.len()).sum()
    }

    pub fn rejected_count(&self) -> usize {
        self.symbols.values().map(|s| s.rejected.len()).sum()
    }

    pub fn quantity(&self, symbol: &str) -> f64 {
        self.symbols
            .get(symbol)
            .and_then(|s| s.position.as_ref())
            .map_or(0.0, |p| p.quantity)
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationReport {
    pub initial_cash: f64,
    pub snapshots: Vec<SimulationSnapshot>,
    pub final_state: RunState,
    pub stop_reason: Option<StopReason>,
    pub total_fills: usize,
    pub rejected_orders: usize,
}

impl SimulationReport {
    pub fn steps_processed(&self) -> usize {
        self.snapshots.len()
    }

    pub fn last(&self) -> Option<&SimulationSnapshot> {
        self.snapshots.last()
    }

    pub fn final_equity(&self) -> f64 {
        self.last().map_or(self.initial_cash, |s| s.portfolio.equity)
    }

    pub fn final_cash(&self) -> f64 {
        self.last().map_or(self.initial_cash, |s| s.portfolio.cash)
    }

    /// Equity after each step.
    pub fn equity_curve(&self) -> Vec<f64> {
        self.snapshots.iter().map(|s| s.portfolio.equity).collect()
    }

    pub fn fills(&self) -> impl Iterator<Item = &Fill> {
        self.snapshots.iter().flat_map(|s| s.fills())
    }
}
