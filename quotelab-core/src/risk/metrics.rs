use crate::domain::{Instrument, Portfolio};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Valuation of one symbol's position at a mark price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolRiskMetrics {
    pub mark_price: f64,
    pub quantity: f64,
    /// Signed market value (quantity × mark).
    pub position_value: f64,
    pub unrealized_pnl: f64,
    pub realized_pnl: f64,
    /// Equity allotted to this symbol (equity / symbol count).
    pub margin_share: f64,
    /// Signed: position value / margin share.
    pub leverage: f64,
    pub max_leverage: Option<f64>,
    pub margin_rate: f64,
}

/// Read-only snapshot of the portfolio valued at a set of marks.
///
/// Built fresh whenever the engine needs it; nothing here is ever mutated
/// back into the portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskMetrics {
    pub cash: f64,
    pub equity: f64,
    pub unrealized_pnl: f64,
    pub realized_pnl: f64,
    /// Σ |position value|.
    pub gross_exposure: f64,
    /// Σ |position value| × margin rate.
    pub margin_used: f64,
    /// equity / margin used; `None` while nothing is margined.
    pub margin_ratio: Option<f64>,
    /// gross exposure / equity.
    pub aggregate_leverage: f64,
    pub peak_equity: f64,
    /// 1 − equity / peak, never negative.
    pub drawdown: f64,
    pub per_symbol: BTreeMap<String, SymbolRiskMetrics>,
}

impl RiskMetrics {
    /// Value `portfolio` at `marks`. Every marked symbol gets an entry, held or not.
    ///
    /// `peak_equity` is the highest equity seen before this valuation.
    pub fn compute(
        portfolio: &Portfolio,
        marks: &BTreeMap<String, f64>,
        instruments: &BTreeMap<String, Instrument>,
        peak_equity: f64,
    ) -> Self {
        let equity = portfolio.equity(marks);
        let symbol_count = marks.len().max(1);
        let margin_share = equity / symbol_count as f64;
        let default_instrument = Instrument::default();

        let mut per_symbol = BTreeMap::new();
        let mut gross_exposure = 0.0;
        let mut margin_used = 0.0;
        for (symbol, &mark) in marks {
            let instrument = instruments.get(symbol).unwrap_or(&default_instrument);
            let position = portfolio.position(symbol);
            let quantity = position.map_or(0.0, |p| p.quantity);
            let position_value = quantity * mark;
            gross_exposure += position_value.abs();
            margin_used += position_value.abs() * instrument.margin_rate();

            per_symbol.insert(
                symbol.clone(),
                SymbolRiskMetrics {
                    mark_price: mark,
                    quantity,
                    position_value,
                    unrealized_pnl: position.map_or(0.0, |p| p.unrealized_pnl(mark)),
                    realized_pnl: position.map_or(0.0, |p| p.realized_pnl),
                    margin_share,
                    leverage: ratio(position_value, margin_share),
                    max_leverage: instrument.max_leverage,
                    margin_rate: instrument.margin_rate(),
                },
            );
        }

        let peak_equity = peak_equity.max(equity);
        let drawdown = if peak_equity > 0.0 {
            (1.0 - equity / peak_equity).max(0.0)
        } else {
            0.0
        };

        Self {
            cash: portfolio.cash,
            equity,
            unrealized_pnl: portfolio.unrealized_pnl(marks),
            realized_pnl: portfolio.realized_pnl(),
            gross_exposure,
            margin_used,
            margin_ratio: (margin_used > 0.0).then(|| equity / margin_used),
            aggregate_leverage: ratio(gross_exposure, equity),
            peak_equity,
            drawdown,
            per_symbol,
        }
    }

    pub fn symbol(&self, symbol: &str) -> Option<&SymbolRiskMetrics> {
        self.per_symbol.get(symbol)
    }

    pub fn symbol_count(&self) -> usize {
        self.per_symbol.len()
    }
}

/// `value / base`, where a non-positive base with non-zero exposure is unbounded.
fn ratio(value: f64, base: f64) -> f64 {
    if base > 0.0 {
        value / base
    } else if value == 0.0 {
        0.0
    } else {
        f64::INFINITY.copysign(value)
    }
}
