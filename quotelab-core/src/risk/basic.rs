//! Leverage-budget risk policy.
//!
//! Each symbol gets an equal share of equity as margin. Orders are checked
//! against a per-symbol leverage ceiling (an instrument override, or the
//! aggregate cap split evenly across symbols), a minimum notional and a price
//! band around the current price. The run is force-liquidated on excessive
//! aggregate or per-symbol leverage, a thin margin ratio or a deep drawdown, and winds down
//! softly once equity falls below a fraction of the starting margin.

use super::{check_well_formed, RejectReason, RiskMetrics, RiskPolicy};
use crate::domain::Order;
use serde::{Deserialize, Serialize};

/// Limits of `BasicRiskPolicy`. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskLimits {
    /// Aggregate leverage budget, split evenly across symbols per order check.
    pub max_leverage: f64,
    /// Smallest accepted order notional, in quote currency.
    pub min_order_value: f64,
    /// Largest accepted |price / current − 1|.
    pub max_price_deviation: f64,
    /// Aggregate leverage at which everything is liquidated. A single symbol
    /// triggers the same exit at this divided by the symbol count.
    pub emergency_leverage: f64,
    /// Margin ratio below which everything is liquidated.
    pub min_margin_ratio: f64,
    /// Drawdown from peak equity at which everything is liquidated.
    pub max_drawdown: f64,
    /// The run stops once equity / initial margin drops to this.
    pub early_stopping_margin: f64,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_leverage: 1.0,
            min_order_value: 10.0,
            max_price_deviation: 0.10,
            emergency_leverage: 2.0,
            min_margin_ratio: 0.25,
            max_drawdown: 0.5,
            early_stopping_margin: 0.1,
        }
    }
}

impl RiskLimits {
    /// All limits finite and positive (minimum order value may be zero).
    pub fn validate(&self) -> Result<(), String> {
        let positive = [
            ("max_leverage", self.max_leverage),
            ("max_price_deviation", self.max_price_deviation),
            ("emergency_leverage", self.emergency_leverage),
            ("max_drawdown", self.max_drawdown),
        ];
        for (name, v) in positive {
            if !(v.is_finite() && v > 0.0) {
                return Err(format!("{name} must be > 0, got {v}"));
            }
        }
        let non_negative = [
            ("min_order_value", self.min_order_value),
            ("min_margin_ratio", self.min_margin_ratio),
            ("early_stopping_margin", self.early_stopping_margin),
        ];
        for (name, v) in non_negative {
            if !(v.is_finite() && v >= 0.0) {
                return Err(format!("{name} must be >= 0, got {v}"));
            }
        }
        Ok(())
    }
}

/// Relative slack on the leverage ceiling so an order sized exactly at the
/// limit is not lost to rounding.
const CEILING_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Default)]
pub struct BasicRiskPolicy {
    limits: RiskLimits,
}

impl BasicRiskPolicy {
    pub fn new(limits: RiskLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &RiskLimits {
        &self.limits
    }

    fn margin_share(metrics: &RiskMetrics, symbol_count: usize) -> f64 {
        metrics.equity / symbol_count.max(1) as f64
    }

    fn ceiling(&self, symbol: &str, metrics: &RiskMetrics, symbol_count: usize) -> f64 {
        metrics
            .symbol(symbol)
            .and_then(|s| s.max_leverage)
            .unwrap_or(self.limits.max_leverage / symbol_count.max(1) as f64)
    }
}

impl RiskPolicy for BasicRiskPolicy {
    fn name(&self) -> &str {
        "basic"
    }

    fn validate_single_order(
        &self,
        order: &Order,
        current_price: f64,
        metrics: &RiskMetrics,
        symbol_count: usize,
    ) -> Result<(), RejectReason> {
        check_well_formed(order)?;

        let margin_share = Self::margin_share(metrics, symbol_count);
        if !(margin_share > 0.0) {
            return Err(RejectReason::NoMargin { margin_share });
        }

        let notional = order.size() * current_price;
        if notional < self.limits.min_order_value {
            return Err(RejectReason::BelowMinimumNotional {
                notional,
                minimum: self.limits.min_order_value,
            });
        }

        if (order.price() / current_price - 1.0).abs() > self.limits.max_price_deviation {
            return Err(RejectReason::PriceOutOfBand {
                price: order.price(),
                reference: current_price,
                max_deviation: self.limits.max_price_deviation,
            });
        }

        let position_value = metrics
            .symbol(order.symbol())
            .map_or(0.0, |s| s.position_value);
        let new_value = position_value + order.side().sign() * notional;
        let leverage = new_value.abs() / margin_share;
        let ceiling = self.ceiling(order.symbol(), metrics, symbol_count);
        if leverage > ceiling * (1.0 + CEILING_TOLERANCE) {
            return Err(RejectReason::LeverageCeiling { leverage, ceiling });
        }

        Ok(())
    }

    fn check_emergency_exit(&self, metrics: &RiskMetrics, symbol_count: usize) -> bool {
        let exposed = metrics.gross_exposure > 0.0;
        let per_symbol = self.limits.emergency_leverage / symbol_count.max(1) as f64;
        (exposed && metrics.equity <= 0.0)
            || metrics.aggregate_leverage >= self.limits.emergency_leverage
            || metrics
                .per_symbol
                .values()
                .any(|s| s.leverage.abs() >= per_symbol)
            || metrics
                .margin_ratio
                .is_some_and(|r| r < self.limits.min_margin_ratio)
            || metrics.drawdown >= self.limits.max_drawdown
    }

    fn continue_simulation(&self, metrics: &RiskMetrics, initial_margin: f64) -> bool {
        initial_margin > 0.0
            && metrics.equity > 0.0
            && metrics.equity / initial_margin > self.limits.early_stopping_margin
    }

    fn position_limit(&self, symbol: &str, metrics: &RiskMetrics, symbol_count: usize) -> Option<f64> {
        let share = Self::margin_share(metrics, symbol_count).max(0.0);
        Some(self.ceiling(symbol, metrics, symbol_count) * share)
    }
}
