//! Constant-spread grid around the reference price.
//!
//! Top quotes sit `spread / 2` either side of S; deeper levels step out by
//! `level_spacing`. Inventory only matters through the risk limit: a side
//! whose limit is reached stops quoting.

use super::{Ladder, MarketState, PortfolioState, QuoteOutput, Sizing, Strategy, StrategyError};

#[derive(Debug, Clone)]
pub struct SymmetricGrid {
    name: String,
    spread: f64,
    levels: usize,
    level_spacing: f64,
    sizing: Sizing,
}

impl SymmetricGrid {
    pub fn new(spread: f64, levels: usize, level_spacing: f64, sizing: Sizing) -> Self {
        assert!(spread > 0.0, "spread must be > 0");
        assert!(levels >= 1, "levels must be >= 1");
        Self {
            name: format!("symmetric_grid_{spread}x{levels}"),
            spread,
            levels,
            level_spacing,
            sizing,
        }
    }
}

impl Strategy for SymmetricGrid {
    fn name(&self) -> &str {
        &self.name
    }

    fn quote(
        &self,
        symbol: &str,
        market: &MarketState<'_>,
        portfolio: &PortfolioState,
        _step: usize,
    ) -> Result<QuoteOutput, StrategyError> {
        let s = market.reference_price();
        let half = 0.5 * self.spread;
        let ladder = Ladder::new(
            s,
            s * (1.0 - half),
            s * (1.0 + half),
            self.levels,
            s * self.level_spacing,
            self.sizing.level_sizes(portfolio, self.levels)?,
        );
        Ok(ladder.into_output(symbol, market, portfolio))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::domain::Instrument;

    #[test]
    fn quotes_are_symmetric_and_ignore_inventory() {
        let s = series(2, 200.0, &[]);
        let inst = Instrument::default();
        let grid = SymmetricGrid::new(0.01, 1, 0.01, Sizing::Fixed { size: 0.5 });
        let flat = grid.quote("ETH", &state(&s, &inst, 0), &book(0.0, None), 0).unwrap().orders;
        let long = grid.quote("ETH", &state(&s, &inst, 0), &book(3.0, None), 0).unwrap().orders;
        assert_eq!(flat, long);
        assert!((flat[0].price() - 199.0).abs() < 1e-9);
        assert!((flat[1].price() - 201.0).abs() < 1e-9);
        assert_eq!(flat[0].size(), 0.5);
    }

    #[test]
    fn grid_levels_step_outward() {
        let s = series(2, 100.0, &[]);
        let inst = Instrument::default();
        let grid = SymmetricGrid::new(0.02, 3, 0.01, Sizing::Fixed { size: 1.0 });
        let orders = grid.quote("BTC", &state(&s, &inst, 1), &book(0.0, None), 1).unwrap().orders;
        let (bids, asks) = sides(&orders);
        let bid_prices: Vec<f64> = bids.iter().map(|o| o.price()).collect();
        let ask_prices: Vec<f64> = asks.iter().map(|o| o.price()).collect();
        for (got, want) in bid_prices.iter().zip([99.0, 98.0, 97.0]) {
            assert!((got - want).abs() < 1e-9);
        }
        for (got, want) in ask_prices.iter().zip([101.0, 102.0, 103.0]) {
            assert!((got - want).abs() < 1e-9);
        }
    }

    #[test]
    fn short_limit_disables_asks() {
        let s = series(2, 100.0, &[]);
        let inst = Instrument::default();
        let grid = SymmetricGrid::new(0.02, 1, 0.01, Sizing::InventoryFraction { fraction: 0.5 });
        let orders = grid.quote("BTC", &state(&s, &inst, 1), &book(-4.0, Some(4.0)), 1).unwrap().orders;
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].size(), 2.0);
    }
}
