//! Portfolio: cash plus every position the run has touched.

use super::fill::{Fill, Liquidity};
use super::position::Position;
use std::collections::BTreeMap;

/// Aggregate portfolio state.
///
/// Only fills mutate it. Equity, margin and leverage are derived from
/// positions and mark prices on demand and never stored. Positions live in an
/// ordered map so every iteration (and everything serialized from it) is
/// deterministic.
#[derive(Debug, Clone)]
pub struct Portfolio {
    pub cash: f64,
    pub initial_cash: f64,
    pub positions: BTreeMap<String, Position>,
    pub maker_fees: f64,
    pub taker_fees: f64,
}

impl Portfolio {
    pub fn new(initial_cash: f64) -> Self {
        Self {
            cash: initial_cash,
            initial_cash,
            positions: BTreeMap::new(),
            maker_fees: 0.0,
            taker_fees: 0.0,
        }
    }

    /// Book one fill: move cash, update the symbol's position, account the fee.
    ///
    /// Returns the realized PnL of the fill, fees excluded.
    pub fn apply_fill(&mut self, fill: &Fill) -> f64 {
        self.cash += fill.cash_delta();
        match fill.liquidity {
            Liquidity::Maker => self.maker_fees += fill.fee,
            Liquidity::Taker => self.taker_fees += fill.fee,
        }
        self.positions
            .entry(fill.symbol.clone())
            .or_insert_with(|| Position::new(fill.symbol.clone()))
            .apply_trade(fill.side, fill.price, fill.size, fill.fee)
    }

    /// Signed quantity held in `symbol` (0.0 when never traded).
    pub fn quantity(&self, symbol: &str) -> f64 {
        self.positions.get(symbol).map_or(0.0, |p| p.quantity)
    }

    /// Whether a symbol has a non-flat position.
    pub fn has_position(&self, symbol: &str) -> bool {
        self.positions.get(symbol).is_some_and(|p| !p.is_flat())
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    /// Iterate non-flat positions in symbol order.
    pub fn open_positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values().filter(|p| !p.is_flat())
    }

    /// Total equity = cash + sum of position market values.
    ///
    /// Symbols without a mark fall back to their entry price.
    pub fn equity(&self, marks: &BTreeMap<String, f64>) -> f64 {
        let position_value: f64 = self
            .positions
            .values()
            .map(|pos| pos.market_value(mark_for(pos, marks)))
            .sum();
        self.cash + position_value
    }

    pub fn unrealized_pnl(&self, marks: &BTreeMap<String, f64>) -> f64 {
        self.positions
            .values()
            .map(|pos| pos.unrealized_pnl(mark_for(pos, marks)))
            .sum()
    }

    pub fn realized_pnl(&self) -> f64 {
        self.positions.values().map(|p| p.realized_pnl).sum()
    }

    pub fn total_fees(&self) -> f64 {
        self.maker_fees + self.taker_fees
    }
}

fn mark_for(pos: &Position, marks: &BTreeMap<String, f64>) -> f64 {
    marks
        .get(&pos.symbol)
        .copied()
        .or(pos.avg_entry_price)
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::Side;
    use chrono::{TimeZone, Utc};

    fn fill(symbol: &str, side: Side, price: f64, size: f64, fee: f64, liquidity: Liquidity) -> Fill {
        Fill {
            order_id: None,
            symbol: symbol.into(),
            side,
            price,
            size,
            fee,
            liquidity,
            step: 0,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
        }
    }

    fn marks(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(s, p)| (s.to_string(), *p)).collect()
    }

    #[test]
    fn equity_with_no_positions() {
        let portfolio = Portfolio::new(100_000.0);
        assert_eq!(portfolio.equity(&BTreeMap::new()), 100_000.0);
    }

    #[test]
    fn equity_with_position() {
        let mut portfolio = Portfolio::new(100_000.0);
        portfolio.apply_fill(&fill("BTC", Side::Bid, 100.0, 100.0, 0.0, Liquidity::Maker));
        assert_eq!(portfolio.cash, 90_000.0);
        // 90_000 + 100 * 110 = 101_000
        assert_eq!(portfolio.equity(&marks(&[("BTC", 110.0)])), 101_000.0);
        assert_eq!(portfolio.unrealized_pnl(&marks(&[("BTC", 110.0)])), 1_000.0);
    }

    #[test]
    fn fees_split_by_liquidity() {
        let mut portfolio = Portfolio::new(1_000.0);
        portfolio.apply_fill(&fill("BTC", Side::Bid, 10.0, 1.0, 0.1, Liquidity::Maker));
        portfolio.apply_fill(&fill("BTC", Side::Ask, 10.0, 1.0, 0.3, Liquidity::Taker));
        assert!((portfolio.maker_fees - 0.1).abs() < 1e-12);
        assert!((portfolio.taker_fees - 0.3).abs() < 1e-12);
        assert!((portfolio.cash - 999.6).abs() < 1e-9);
    }

    #[test]
    fn flat_position_is_retained() {
        let mut portfolio = Portfolio::new(1_000.0);
        portfolio.apply_fill(&fill("BTC", Side::Bid, 10.0, 1.0, 0.0, Liquidity::Maker));
        portfolio.apply_fill(&fill("BTC", Side::Ask, 12.0, 1.0, 0.0, Liquidity::Maker));
        assert!(!portfolio.has_position("BTC"));
        assert_eq!(portfolio.position("BTC").unwrap().realized_pnl, 2.0);
        assert_eq!(portfolio.open_positions().count(), 0);
        assert_eq!(portfolio.realized_pnl(), 2.0);
    }
}
