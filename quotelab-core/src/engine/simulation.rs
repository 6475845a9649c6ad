//! Step loop of one simulation run.
//!
//! Per step, for every symbol in name order:
//! 1. Quote: value the portfolio at the open, ask the strategy for orders,
//!    check the strategy contract, validate each order with the risk policy.
//! 2. Fill: match the accepted orders against the step's bar.
//! 3. Book: apply the fills to the portfolio.
//! 4. Mark: value the portfolio at the close and update the equity peak.
//! 5. Risk: emergency exit (liquidate and stop), else soft stop, else the
//!    last step ends the run, optionally flattening first.
//! 6. Record the step's snapshot.

use super::config::{ConfigError, SimulationConfig};
use super::error::{ContractViolation, SimulationError};
use super::portfolio_update::apply_fills;
use super::snapshot::{
    PortfolioSnapshot, PositionSummary, RejectedOrder, SimulationReport, SimulationSnapshot, SymbolSnapshot,
};
use super::state::{RunState, StopReason};
use crate::data::{DataShapeError, MarketData};
use crate::domain::{Bar, IdGen, Instrument, Portfolio, RestingOrder};
use crate::execution::{FillEngine, FillEngineInvariantError};
use crate::risk::{RiskMetrics, RiskPolicy};
use crate::strategy::{MarketState, PortfolioState, Strategy};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// One configured backtest: strategies per symbol, a shared risk policy and
/// the fill model. Every call to `run` starts from a fresh portfolio.
pub struct Simulation {
    config: SimulationConfig,
    strategies: BTreeMap<String, Box<dyn Strategy>>,
    risk: Box<dyn RiskPolicy>,
    fill_engine: FillEngine,
}

impl Simulation {
    pub fn new(
        config: SimulationConfig,
        strategies: BTreeMap<String, Box<dyn Strategy>>,
        risk: Box<dyn RiskPolicy>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let fill_engine = FillEngine::new(config.fees(), config.intrabar_policy);
        Ok(Self {
            config,
            strategies,
            risk,
            fill_engine,
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn risk_policy(&self) -> &dyn RiskPolicy {
        self.risk.as_ref()
    }

    /// Run over `data` until the data ends or the risk policy stops the run.
    pub fn run(&self, data: &MarketData) -> Result<SimulationReport, SimulationError> {
        let num_steps = data.validate()?;
        self.check_assignment(data)?;

        let symbols: Vec<&str> = data.symbols().collect();
        let bars: BTreeMap<&str, Vec<Bar>> = data.iter().map(|(s, series)| (s, series.bars())).collect();
        let mut run = Run::new(self.config.initial_cash);

        info!(
            symbols = symbols.len(),
            steps = num_steps,
            risk_policy = self.risk.name(),
            initial_cash = self.config.initial_cash,
            "simulation started"
        );

        for step in 0..num_steps {
            let step_bars: BTreeMap<&str, Bar> = bars.iter().map(|(&s, b)| (s, b[step])).collect();
            let Some(timestamp) = step_bars.values().next().map(|b| b.timestamp) else {
                break;
            };
            let snapshot = self.step(data, &symbols, &step_bars, step, timestamp, num_steps, &mut run)?;
            let finished = snapshot.state.is_terminal();
            run.snapshots.push(snapshot);
            if finished {
                break;
            }
        }

        let last = run.snapshots.last();
        let final_state = last.map_or(RunState::Stopped, |s| s.state);
        let stop_reason = last.and_then(|s| s.stop_reason);
        info!(
            steps = run.snapshots.len(),
            stop_reason = ?stop_reason,
            equity = last.map_or(self.config.initial_cash, |s| s.portfolio.equity),
            fills = run.total_fills,
            rejected = run.rejected_orders,
            "simulation stopped"
        );

        Ok(SimulationReport {
            initial_cash: self.config.initial_cash,
            snapshots: run.snapshots,
            final_state,
            stop_reason,
            total_fills: run.total_fills,
            rejected_orders: run.rejected_orders,
        })
    }

    fn check_assignment(&self, data: &MarketData) -> Result<(), DataShapeError> {
        if let Some(symbol) = data.symbols().find(|s| !self.strategies.contains_key(*s)) {
            return Err(DataShapeError::MissingStrategy {
                symbol: symbol.to_string(),
            });
        }
        if let Some(symbol) = self.strategies.keys().find(|s| data.get(s).is_none()) {
            return Err(DataShapeError::UnknownSymbol { symbol: symbol.clone() });
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn step(
        &self,
        data: &MarketData,
        symbols: &[&str],
        bars: &BTreeMap<&str, Bar>,
        step: usize,
        timestamp: DateTime<Utc>,
        num_steps: usize,
        run: &mut Run,
    ) -> Result<SimulationSnapshot, SimulationError> {
        let symbol_count = symbols.len();
        let default_instrument = Instrument::default();
        let mut snapshots: BTreeMap<String, SymbolSnapshot> = symbols
            .iter()
            .map(|s| (s.to_string(), SymbolSnapshot::default()))
            .collect();

        // ─── Quote ───
        let open_marks: BTreeMap<String, f64> = bars.iter().map(|(s, b)| (s.to_string(), b.open)).collect();
        let open_metrics = RiskMetrics::compute(&run.portfolio, &open_marks, &self.config.instruments, run.peak_equity);

        for &symbol in symbols {
            let (Some(strategy), Some(series), Some(bar)) =
                (self.strategies.get(symbol), data.get(symbol), bars.get(symbol))
            else {
                continue;
            };
            if step < strategy.warmup() {
                continue;
            }

            let instrument = self.config.instruments.get(symbol).unwrap_or(&default_instrument);
            let market = MarketState::new(step, *bar, series, instrument);
            let book = self.portfolio_state(symbol, &run.portfolio, &open_metrics, bar.open, symbol_count);

            let contract_error = |reason: ContractViolation| SimulationError::StrategyContract {
                step,
                symbol: symbol.to_string(),
                reason,
                state: Box::new(PortfolioSnapshot::new(&run.portfolio, &open_metrics)),
            };
            let output = strategy
                .quote(symbol, &market, &book, step)
                .map_err(|e| contract_error(e.into()))?;

            let snap = snapshots.entry(symbol.to_string()).or_default();
            snap.reservation_price = output.reservation_price;
            snap.spread = output.spread;
            for order in output.orders {
                if order.symbol() != symbol {
                    return Err(contract_error(ContractViolation::ForeignSymbol(order.symbol().to_string())));
                }
                if !order.is_well_formed() {
                    return Err(contract_error(ContractViolation::MalformedOrder {
                        price: order.price(),
                        size: order.size(),
                    }));
                }

                match self
                    .risk
                    .validate_single_order(&order, bar.open, &open_metrics, symbol_count)
                {
                    Ok(()) => snap.quotes.push(RestingOrder::new(run.ids.next_order_id(), order)),
                    Err(reason) => {
                        debug!(
                            symbol,
                            step,
                            side = %order.side(),
                            price = order.price(),
                            size = order.size(),
                            %reason,
                            "order rejected"
                        );
                        run.rejected_orders += 1;
                        snap.rejected.push(RejectedOrder { order, reason });
                    }
                }
            }
        }

        // ─── Fill + book ───
        for (symbol, snap) in snapshots.iter_mut() {
            let Some(bar) = bars.get(symbol.as_str()) else {
                continue;
            };
            let fills = self
                .fill_engine
                .match_orders(&snap.quotes, bar, step)
                .map_err(|source| self.fill_error(step, source, &run.portfolio, &open_metrics))?;
            apply_fills(&fills, &mut run.portfolio);
            run.total_fills += fills.len();
            snap.fills = fills;
        }

        // ─── Mark ───
        let close_marks: BTreeMap<String, f64> = bars.iter().map(|(s, b)| (s.to_string(), b.close)).collect();
        let mut metrics = self.mark(run, &close_marks);

        // ─── Risk ───
        let mut state = RunState::Running;
        let mut stop_reason = None;
        if self.risk.check_emergency_exit(&metrics, symbol_count) {
            warn!(
                step,
                equity = metrics.equity,
                leverage = metrics.aggregate_leverage,
                drawdown = metrics.drawdown,
                "emergency exit, liquidating"
            );
            debug!(step, state = %RunState::Liquidating, "state transition");
            self.liquidate(run, &close_marks, &mut snapshots, step, timestamp, &metrics)?;
            metrics = self.mark(run, &close_marks);
            state = RunState::Stopped;
            stop_reason = Some(StopReason::EmergencyExit);
        } else if !self.risk.continue_simulation(&metrics, self.config.initial_cash) {
            info!(step, equity = metrics.equity, "risk policy ended the run");
            state = RunState::Stopped;
            stop_reason = Some(StopReason::SoftStop);
        } else if step + 1 == num_steps {
            if self.config.flatten_at_end {
                self.liquidate(run, &close_marks, &mut snapshots, step, timestamp, &metrics)?;
                metrics = self.mark(run, &close_marks);
            }
            state = RunState::Stopped;
            stop_reason = Some(StopReason::EndOfData);
        }

        // ─── Record ───
        for (symbol, snap) in snapshots.iter_mut() {
            let position = run.portfolio.position(symbol);
            let symbol_metrics = metrics.symbol(symbol);
            snap.position = Some(PositionSummary::new(position, symbol_metrics));
        }

        Ok(SimulationSnapshot {
            step,
            timestamp,
            state,
            stop_reason,
            symbols: snapshots,
            portfolio: PortfolioSnapshot::new(&run.portfolio, &metrics),
        })
    }

    fn portfolio_state(
        &self,
        symbol: &str,
        portfolio: &Portfolio,
        metrics: &RiskMetrics,
        reference_price: f64,
        symbol_count: usize,
    ) -> PortfolioState {
        let position = portfolio.position(symbol);
        let limit = self.risk.position_limit(symbol, metrics, symbol_count);
        PortfolioState {
            inventory: position.map_or(0.0, |p| p.quantity),
            avg_entry_price: position.and_then(|p| p.avg_entry_price),
            unrealized_pnl: metrics.symbol(symbol).map_or(0.0, |m| m.unrealized_pnl),
            realized_pnl: position.map_or(0.0, |p| p.realized_pnl),
            equity: metrics.equity,
            margin_share: metrics.equity / symbol_count.max(1) as f64,
            max_inventory: limit.map(|l| l / reference_price),
            symbol_count,
        }
    }

    /// Close-of-step valuation; moves the equity peak.
    fn mark(&self, run: &mut Run, marks: &BTreeMap<String, f64>) -> RiskMetrics {
        let metrics = RiskMetrics::compute(&run.portfolio, marks, &self.config.instruments, run.peak_equity);
        run.peak_equity = metrics.peak_equity;
        metrics
    }

    /// Close every open position at `marks` with the taker fee.
    fn liquidate(
        &self,
        run: &mut Run,
        marks: &BTreeMap<String, f64>,
        snapshots: &mut BTreeMap<String, SymbolSnapshot>,
        step: usize,
        timestamp: DateTime<Utc>,
        metrics: &RiskMetrics,
    ) -> Result<(), SimulationError> {
        let open: Vec<(String, f64)> = run
            .portfolio
            .open_positions()
            .map(|p| (p.symbol.clone(), p.quantity))
            .collect();

        for (symbol, quantity) in open {
            let mark = marks.get(&symbol).copied().unwrap_or(f64::NAN);
            let fill = self
                .fill_engine
                .liquidation_fill(&symbol, quantity, mark, step, timestamp)
                .map_err(|source| self.fill_error(step, source, &run.portfolio, metrics))?;
            debug!(symbol = %symbol, quantity, price = mark, "liquidated");
            apply_fills(std::slice::from_ref(&fill), &mut run.portfolio);
            run.total_fills += 1;
            snapshots.entry(symbol).or_default().fills.push(fill);
        }
        Ok(())
    }

    fn fill_error(
        &self,
        step: usize,
        source: FillEngineInvariantError,
        portfolio: &Portfolio,
        metrics: &RiskMetrics,
    ) -> SimulationError {
        SimulationError::FillInvariant {
            step,
            source,
            state: Box::new(PortfolioSnapshot::new(portfolio, metrics)),
        }
    }
}

/// Mutable state of one run. Never outlives `Simulation::run`.
struct Run {
    portfolio: Portfolio,
    ids: IdGen,
    peak_equity: f64,
    snapshots: Vec<SimulationSnapshot>,
    total_fills: usize,
    rejected_orders: usize,
}

impl Run {
    fn new(initial_cash: f64) -> Self {
        Self {
            portfolio: Portfolio::new(initial_cash),
            ids: IdGen::default(),
            peak_equity: initial_cash,
            snapshots: Vec::new(),
            total_fills: 0,
            rejected_orders: 0,
        }
    }
}
