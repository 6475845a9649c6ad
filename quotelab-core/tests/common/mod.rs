//! Shared builders for engine integration tests.

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use quotelab_core::data::{MarketData, SymbolSeries};
use quotelab_core::domain::{Bar, Order};
use quotelab_core::engine::{Simulation, SimulationConfig, SimulationReport};
use quotelab_core::risk::RiskPolicy;
use quotelab_core::strategy::{MarketState, PortfolioState, QuoteOutput, Strategy, StrategyError};
use std::collections::BTreeMap;

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// Hourly bars from (open, high, low, close) tuples.
pub fn bars(ohlc: &[(f64, f64, f64, f64)]) -> Vec<Bar> {
    ohlc.iter()
        .enumerate()
        .map(|(i, &(open, high, low, close))| Bar {
            timestamp: start() + Duration::hours(i as i64),
            open,
            high,
            low,
            close,
        })
        .collect()
}

pub fn flat_bars(n: usize, price: f64) -> Vec<Bar> {
    bars(&vec![(price, price, price, price); n])
}

pub fn series(bars: &[Bar]) -> SymbolSeries {
    SymbolSeries::from_bars(bars)
}

/// Gentle oscillation around `base`, wide enough to fill a 1% quote now and then.
pub fn wavy_bars(n: usize, base: f64) -> Vec<Bar> {
    let ohlc: Vec<_> = (0..n)
        .map(|i| {
            let open = base * (1.0 + 0.02 * (i as f64 * 0.3).sin());
            let close = base * (1.0 + 0.02 * ((i + 1) as f64 * 0.3).sin());
            let high = open.max(close) * 1.008;
            let low = open.min(close) * 0.992;
            (open, high, low, close)
        })
        .collect();
    bars(&ohlc)
}

pub fn one_symbol(symbol: &str, bars: &[Bar]) -> MarketData {
    MarketData::new().with_symbol(symbol, series(bars))
}

pub fn strategies(entries: Vec<(&str, Box<dyn Strategy>)>) -> BTreeMap<String, Box<dyn Strategy>> {
    entries.into_iter().map(|(s, b)| (s.to_string(), b)).collect()
}

pub fn run_one(
    config: SimulationConfig,
    symbol: &str,
    strategy: Box<dyn Strategy>,
    risk: Box<dyn RiskPolicy>,
    data: &MarketData,
) -> SimulationReport {
    Simulation::new(config, strategies(vec![(symbol, strategy)]), risk)
        .unwrap()
        .run(data)
        .unwrap()
}

/// Quotes the same absolute bid/ask every step.
#[derive(Debug, Clone)]
pub struct StaticQuotes {
    pub bid: f64,
    pub ask: f64,
    pub size: f64,
    pub warmup: usize,
}

impl StaticQuotes {
    pub fn new(bid: f64, ask: f64, size: f64) -> Self {
        Self {
            bid,
            ask,
            size,
            warmup: 0,
        }
    }
}

impl Strategy for StaticQuotes {
    fn name(&self) -> &str {
        "static_quotes"
    }

    fn warmup(&self) -> usize {
        self.warmup
    }

    fn quote(
        &self,
        symbol: &str,
        market: &MarketState<'_>,
        _portfolio: &PortfolioState,
        _step: usize,
    ) -> Result<QuoteOutput, StrategyError> {
        let ts = market.timestamp();
        Ok(QuoteOutput::from_orders(vec![
            Order::bid(symbol, self.bid, self.size, ts),
            Order::ask(symbol, self.ask, self.size, ts),
        ]))
    }
}

/// Quotes `half_spread` (fraction) either side of the open.
#[derive(Debug, Clone)]
pub struct SpreadQuotes {
    pub half_spread: f64,
    pub size: f64,
}

impl Strategy for SpreadQuotes {
    fn name(&self) -> &str {
        "spread_quotes"
    }

    fn quote(
        &self,
        symbol: &str,
        market: &MarketState<'_>,
        _portfolio: &PortfolioState,
        _step: usize,
    ) -> Result<QuoteOutput, StrategyError> {
        let s = market.reference_price();
        let ts = market.timestamp();
        Ok(QuoteOutput {
            orders: vec![
                Order::bid(symbol, s * (1.0 - self.half_spread), self.size, ts),
                Order::ask(symbol, s * (1.0 + self.half_spread), self.size, ts),
            ],
            reservation_price: Some(s),
            spread: Some(2.0 * s * self.half_spread),
        })
    }
}

/// Fails at `fail_at`, quotes nothing before.
#[derive(Debug, Clone)]
pub struct FailingStrategy {
    pub fail_at: usize,
}

impl Strategy for FailingStrategy {
    fn name(&self) -> &str {
        "failing"
    }

    fn quote(
        &self,
        _symbol: &str,
        _market: &MarketState<'_>,
        _portfolio: &PortfolioState,
        step: usize,
    ) -> Result<QuoteOutput, StrategyError> {
        if step >= self.fail_at {
            Err(StrategyError::InvalidInput("boom".into()))
        } else {
            Ok(QuoteOutput::default())
        }
    }
}

/// Emits one fixed order regardless of symbol.
#[derive(Debug, Clone)]
pub struct FixedOrder {
    pub order: Order,
}

impl Strategy for FixedOrder {
    fn name(&self) -> &str {
        "fixed_order"
    }

    fn quote(
        &self,
        _symbol: &str,
        _market: &MarketState<'_>,
        _portfolio: &PortfolioState,
        _step: usize,
    ) -> Result<QuoteOutput, StrategyError> {
        Ok(QuoteOutput::from_orders(vec![self.order.clone()]))
    }
}
