//! Indicator-driven skewed quoting.
//!
//! The quote center moves away from the reference price S by a linear blend of
//! inventory, unrealized PnL, mean reversion and momentum:
//!
//!   shift   = inventory·q + pnl·(upnl / margin share) + mean_revert·sma_dev − momentum·mom
//!   center  = S · (1 − shift)
//!   spacing = S · max(base + volatility·vol + momentum_spread·|mom|, min_spread)
//!
//! A long book (q > 0) or a price stretched above its average pushes the
//! center down, positive momentum pulls it up. Quotes sit `spacing / 2` either
//! side of the center, deeper levels step out by `spacing`, and the top quotes
//! never come closer than `min_spread / 2` to S on their own side.

use super::{Ladder, MarketState, PortfolioState, QuoteOutput, Sizing, Strategy, StrategyError};
use crate::indicators::{IndicatorKind, IndicatorSpec};
use serde::{Deserialize, Serialize};

/// Blend weights of `IndicatorSkew`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkewFactors {
    pub inventory: f64,
    pub pnl: f64,
    pub mean_revert: f64,
    pub momentum: f64,
    pub base_spread: f64,
    pub volatility: f64,
    pub momentum_spread: f64,
}

impl Default for SkewFactors {
    fn default() -> Self {
        Self {
            inventory: 0.001,
            pnl: 0.0,
            mean_revert: 0.1,
            momentum: 0.1,
            base_spread: 0.001,
            volatility: 1.0,
            momentum_spread: 0.5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndicatorSkew {
    name: String,
    factors: SkewFactors,
    min_spread: f64,
    levels: usize,
    sizing: Sizing,
    volatility: IndicatorSpec,
    sma_deviation: IndicatorSpec,
    momentum: IndicatorSpec,
}

impl IndicatorSkew {
    pub fn new(factors: SkewFactors, min_spread: f64, levels: usize, sizing: Sizing) -> Self {
        assert!(min_spread > 0.0, "min spread must be > 0");
        assert!(levels >= 1, "levels must be >= 1");
        Self {
            name: "indicator_skew".to_string(),
            factors,
            min_spread,
            levels,
            sizing,
            volatility: IndicatorSpec::new(IndicatorKind::Volatility, 7),
            sma_deviation: IndicatorSpec::new(IndicatorKind::SmaDeviation, 7),
            momentum: IndicatorSpec::new(IndicatorKind::Momentum, 7),
        }
    }

    /// Override the indicator windows (volatility, SMA deviation, momentum).
    pub fn with_windows(mut self, volatility: usize, sma: usize, momentum: usize) -> Self {
        self.volatility.window = volatility;
        self.sma_deviation.window = sma;
        self.momentum.window = momentum;
        self
    }

    /// Indicator columns this strategy reads.
    pub fn required_indicators(&self) -> Vec<IndicatorSpec> {
        vec![self.volatility, self.sma_deviation, self.momentum]
    }
}

impl Strategy for IndicatorSkew {
    fn name(&self) -> &str {
        &self.name
    }

    fn warmup(&self) -> usize {
        self.required_indicators()
            .iter()
            .map(|spec| spec.build().lookback())
            .max()
            .unwrap_or(0)
    }

    fn quote(
        &self,
        symbol: &str,
        market: &MarketState<'_>,
        portfolio: &PortfolioState,
        _step: usize,
    ) -> Result<QuoteOutput, StrategyError> {
        let s = market.reference_price();
        let vol = market.require_indicator(&self.volatility.name())?;
        let sma_dev = market.require_indicator(&self.sma_deviation.name())?;
        let mom = market.require_indicator(&self.momentum.name())?;
        let f = &self.factors;

        let pnl_ratio = if portfolio.margin_share > 0.0 {
            portfolio.unrealized_pnl / portfolio.margin_share
        } else {
            0.0
        };
        let shift = f.inventory * portfolio.normalized_inventory() + f.pnl * pnl_ratio
            + f.mean_revert * sma_dev
            - f.momentum * mom;
        let center = s * (1.0 - shift);
        let spacing = s * (f.base_spread + f.volatility * vol + f.momentum_spread * mom.abs())
            .max(self.min_spread);

        let floor = 0.5 * self.min_spread;
        let ladder = Ladder::new(
            center,
            (center - 0.5 * spacing).min(s * (1.0 - floor)),
            (center + 0.5 * spacing).max(s * (1.0 + floor)),
            self.levels,
            spacing,
            self.sizing.level_sizes(portfolio, self.levels)?,
        );
        Ok(ladder.into_output(symbol, market, portfolio))
    }
}
