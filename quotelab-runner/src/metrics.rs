//! Performance metrics: pure functions over a run's snapshots.
//!
//! The equity curve always starts with the initial cash, so a one-step run
//! still has one return. Ratios that are undefined (no variance, no downside)
//! come out as 0.0.

use std::collections::BTreeMap;

use quotelab_core::domain::{Fill, Liquidity, Side};
use quotelab_core::engine::{RunState, SimulationReport, StopReason};
use serde::{Deserialize, Serialize};

/// Hourly bars, around the clock.
pub const DEFAULT_PERIODS_PER_YEAR: f64 = 365.0 * 24.0;

/// Aggregate performance of a single run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_return: f64,
    pub sharpe: f64,
    pub sortino: f64,
    /// Largest peak-to-trough fall, as a negative fraction.
    pub max_drawdown: f64,
    pub final_equity: f64,
    pub realized_pnl: f64,
    pub unrealized_pnl: f64,
    pub fill_count: usize,
    pub buy_count: usize,
    pub sell_count: usize,
    pub maker_fill_count: usize,
    pub taker_fill_count: usize,
    pub traded_volume: f64,
    pub traded_notional: f64,
    pub maker_fees: f64,
    pub taker_fees: f64,
    pub rejected_orders: usize,
    pub final_inventory: BTreeMap<String, f64>,
    pub steps: usize,
    pub final_state: RunState,
    pub stop_reason: Option<StopReason>,
}

impl PerformanceMetrics {
    pub fn compute(report: &SimulationReport, periods_per_year: f64) -> Self {
        let curve = equity_curve(report);
        let returns = step_returns(&curve);
        let fills: Vec<&Fill> = report.fills().collect();
        let last = report.last();

        let (maker_fees, taker_fees) = fees_by_liquidity(&fills);
        let final_inventory = last
            .map(|snap| {
                snap.symbols
                    .keys()
                    .map(|symbol| (symbol.clone(), snap.quantity(symbol)))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            total_return: total_return(&curve),
            sharpe: sharpe_ratio(&returns, periods_per_year),
            sortino: sortino_ratio(&returns, periods_per_year),
            max_drawdown: max_drawdown(&curve),
            final_equity: report.final_equity(),
            realized_pnl: last.map_or(0.0, |s| s.portfolio.realized_pnl),
            unrealized_pnl: last.map_or(0.0, |s| s.portfolio.unrealized_pnl),
            fill_count: fills.len(),
            buy_count: fills.iter().filter(|f| f.side == Side::Bid).count(),
            sell_count: fills.iter().filter(|f| f.side == Side::Ask).count(),
            maker_fill_count: fills.iter().filter(|f| f.liquidity == Liquidity::Maker).count(),
            taker_fill_count: fills.iter().filter(|f| f.liquidity == Liquidity::Taker).count(),
            traded_volume: fills.iter().map(|f| f.size).sum(),
            traded_notional: fills.iter().map(|f| f.notional()).sum(),
            maker_fees,
            taker_fees,
            rejected_orders: report.rejected_orders,
            final_inventory,
            steps: report.steps_processed(),
            final_state: report.final_state,
            stop_reason: report.stop_reason,
        }
    }
}

/// Initial cash followed by the closing equity of every processed step.
pub fn equity_curve(report: &SimulationReport) -> Vec<f64> {
    std::iter::once(report.initial_cash)
        .chain(report.equity_curve())
        .collect()
}

/// Total return as a fraction: (final - initial) / initial.
pub fn total_return(equity_curve: &[f64]) -> f64 {
    match (equity_curve.first(), equity_curve.last()) {
        (Some(&initial), Some(&last)) if equity_curve.len() >= 2 && initial > 0.0 => (last - initial) / initial,
        _ => 0.0,
    }
}

/// Simple returns between consecutive equity points.
pub fn step_returns(equity_curve: &[f64]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect()
}

/// Annualized Sharpe ratio: mean / std * sqrt(periods_per_year).
///
/// Returns 0.0 with fewer than two returns or zero variance.
pub fn sharpe_ratio(returns: &[f64], periods_per_year: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let std = std_dev(returns);
    if std < 1e-15 {
        return 0.0;
    }
    mean_f64(returns) / std * periods_per_year.sqrt()
}

/// Annualized Sortino ratio, using downside deviation over all periods.
///
/// Returns 0.0 with fewer than two returns or no losing period.
pub fn sortino_ratio(returns: &[f64], periods_per_year: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let downside_sq: f64 = returns.iter().filter(|&&r| r < 0.0).map(|r| r * r).sum();
    let downside_std = (downside_sq / returns.len() as f64).sqrt();
    if downside_std < 1e-15 {
        return 0.0;
    }
    mean_f64(returns) / downside_std * periods_per_year.sqrt()
}

/// Maximum drawdown as a negative fraction (e.g. -0.15 for a 15% fall).
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd = 0.0_f64;
    for &eq in equity_curve {
        peak = peak.max(eq);
        if peak > 0.0 {
            max_dd = max_dd.min((eq - peak) / peak);
        }
    }
    max_dd
}

fn fees_by_liquidity(fills: &[&Fill]) -> (f64, f64) {
    fills.iter().fold((0.0, 0.0), |(maker, taker), f| match f.liquidity {
        Liquidity::Maker => (maker + f.fee, taker),
        Liquidity::Taker => (maker, taker + f.fee),
    })
}

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_approx(actual: f64, expected: f64) {
        assert!((actual - expected).abs() < 1e-9, "expected {expected}, got {actual}");
    }

    #[test]
    fn total_return_cases() {
        assert_approx(total_return(&[100.0, 110.0, 120.0]), 0.2);
        assert_approx(total_return(&[100.0, 90.0]), -0.1);
        assert_approx(total_return(&[100.0]), 0.0);
        assert_approx(total_return(&[]), 0.0);
        assert_approx(total_return(&[0.0, 10.0]), 0.0);
    }

    #[test]
    fn step_returns_skip_non_positive_base() {
        let r = step_returns(&[100.0, 110.0, 0.0, 5.0]);
        assert_eq!(r.len(), 3);
        assert_approx(r[0], 0.1);
        assert_approx(r[1], -1.0);
        assert_approx(r[2], 0.0);
    }

    #[test]
    fn sharpe_known_returns() {
        let returns = [0.01, -0.01, 0.02, 0.0];
        let mean = 0.005;
        let var = ((0.005f64).powi(2) + (0.015f64).powi(2) + (0.015f64).powi(2) + (0.005f64).powi(2)) / 3.0;
        assert_approx(sharpe_ratio(&returns, 1.0), mean / var.sqrt());
        assert_approx(sharpe_ratio(&returns, 4.0), 2.0 * mean / var.sqrt());
    }

    #[test]
    fn sharpe_is_zero_when_undefined() {
        assert_eq!(sharpe_ratio(&[0.01, 0.01, 0.01], 8760.0), 0.0);
        assert_eq!(sharpe_ratio(&[0.01], 8760.0), 0.0);
    }

    #[test]
    fn sortino_uses_downside_only() {
        assert_eq!(sortino_ratio(&[0.01, 0.02, 0.03], 1.0), 0.0);
        let returns = [0.02, -0.01, 0.02, -0.01];
        let downside = ((0.0001 + 0.0001) / 4.0f64).sqrt();
        assert_approx(sortino_ratio(&returns, 1.0), 0.005 / downside);
    }

    #[test]
    fn max_drawdown_cases() {
        assert_approx(max_drawdown(&[100.0, 120.0, 90.0, 130.0, 117.0]), -0.25);
        assert_approx(max_drawdown(&[100.0, 101.0, 102.0]), 0.0);
        assert_approx(max_drawdown(&[]), 0.0);
    }

    proptest::proptest! {
        #[test]
        fn drawdown_bounded_and_returns_chain(curve in proptest::collection::vec(1.0f64..1e6, 1..60)) {
            let dd = max_drawdown(&curve);
            proptest::prop_assert!((-1.0..=0.0).contains(&dd));

            let compounded = step_returns(&curve).iter().fold(1.0, |acc, r| acc * (1.0 + r));
            proptest::prop_assert!((compounded - 1.0 - total_return(&curve)).abs() < 1e-6);
        }
    }
}
