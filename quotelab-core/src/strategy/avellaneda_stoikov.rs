//! Avellaneda-Stoikov style inventory-aware quoting.
//!
//! With reference price S, inventory q, risk aversion γ, volatility σ (of log
//! returns, so a relative quantity) and remaining horizon τ:
//!
//!   reservation r = S · (1 − q·γ·σ²·τ)
//!   half-spread h = ½ · (γ·σ²·τ + (2/γ)·ln(1 + γ/k))      (relative to S)
//!
//! The liquidity term is dropped when no resilience k is configured. The
//! half-spread never goes below `min_spread / 2`, and the top quotes never sit
//! closer than that to S on their own side, so a heavily skewed reservation
//! price cannot produce a crossing quote.

use super::{Ladder, MarketState, PortfolioState, QuoteOutput, Sizing, Strategy, StrategyError};
use serde::{Deserialize, Serialize};

/// Where σ comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VolatilitySource {
    Fixed(f64),
    /// Named indicator column plus the bars it needs before its first value.
    Indicator { name: String, lookback: usize },
}

#[derive(Debug, Clone)]
pub struct AvellanedaStoikov {
    name: String,
    risk_aversion: f64,
    resilience: Option<f64>,
    volatility: VolatilitySource,
    horizon: Option<f64>,
    time_step: f64,
    min_spread: f64,
    levels: usize,
    level_spacing: f64,
    sizing: Sizing,
}

impl AvellanedaStoikov {
    pub fn new(risk_aversion: f64, volatility: VolatilitySource, min_spread: f64, sizing: Sizing) -> Self {
        assert!(risk_aversion > 0.0, "risk aversion must be > 0");
        assert!(min_spread >= 0.0, "min spread must be >= 0");
        Self {
            name: format!("avellaneda_stoikov_g{risk_aversion}"),
            risk_aversion,
            resilience: None,
            volatility,
            horizon: None,
            time_step: 1.0,
            min_spread,
            levels: 1,
            level_spacing: min_spread,
            sizing,
        }
    }

    /// Add the order-book liquidity term with resilience `k`.
    pub fn with_resilience(mut self, k: f64) -> Self {
        assert!(k > 0.0, "resilience must be > 0");
        self.resilience = Some(k);
        self
    }

    /// Finite horizon `horizon`, consumed by `time_step` per step.
    pub fn with_horizon(mut self, horizon: f64, time_step: f64) -> Self {
        assert!(horizon > 0.0 && time_step > 0.0, "horizon and time step must be > 0");
        self.horizon = Some(horizon);
        self.time_step = time_step;
        self
    }

    /// Quote `levels` orders per side, `spacing` apart (relative to S).
    pub fn with_levels(mut self, levels: usize, spacing: f64) -> Self {
        assert!(levels >= 1, "levels must be >= 1");
        self.levels = levels;
        self.level_spacing = spacing;
        self
    }

    fn sigma(&self, market: &MarketState<'_>) -> Result<f64, StrategyError> {
        let sigma = match &self.volatility {
            VolatilitySource::Fixed(v) => *v,
            VolatilitySource::Indicator { name, .. } => market.require_indicator(name)?,
        };
        if sigma.is_finite() && sigma >= 0.0 {
            Ok(sigma)
        } else {
            Err(StrategyError::InvalidInput(format!("volatility {sigma}")))
        }
    }

    /// Remaining horizon at `step`; 1 for a stationary (infinite-horizon) quote.
    fn tau(&self, step: usize) -> f64 {
        self.horizon
            .map_or(1.0, |t| (t - step as f64 * self.time_step).max(0.0))
    }

    /// (reservation price, half-spread) relative to the reference price.
    fn reservation_and_half_spread(&self, q: f64, sigma: f64, tau: f64) -> (f64, f64) {
        let gamma = self.risk_aversion;
        let inventory_risk = gamma * sigma * sigma * tau;
        let liquidity = self
            .resilience
            .map_or(0.0, |k| (2.0 / gamma) * (1.0 + gamma / k).ln());
        let reservation = 1.0 - q * inventory_risk;
        let half = (0.5 * (inventory_risk + liquidity)).max(0.5 * self.min_spread);
        (reservation, half)
    }
}

impl Strategy for AvellanedaStoikov {
    fn name(&self) -> &str {
        &self.name
    }

    fn warmup(&self) -> usize {
        match &self.volatility {
            VolatilitySource::Fixed(_) => 0,
            VolatilitySource::Indicator { lookback, .. } => *lookback,
        }
    }

    fn quote(
        &self,
        symbol: &str,
        market: &MarketState<'_>,
        portfolio: &PortfolioState,
        step: usize,
    ) -> Result<QuoteOutput, StrategyError> {
        let s = market.reference_price();
        let sigma = self.sigma(market)?;
        let (reservation, half) =
            self.reservation_and_half_spread(portfolio.normalized_inventory(), sigma, self.tau(step));

        let floor = 0.5 * self.min_spread;
        let bid = (s * (reservation - half)).min(s * (1.0 - floor));
        let ask = (s * (reservation + half)).max(s * (1.0 + floor));

        let ladder = Ladder::new(
            s * reservation,
            bid,
            ask,
            self.levels,
            s * self.level_spacing,
            self.sizing.level_sizes(portfolio, self.levels)?,
        );
        Ok(ladder.into_output(symbol, market, portfolio))
    }
}
