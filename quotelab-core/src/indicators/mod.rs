//! Indicator pipeline.
//!
//! Indicators are pure functions: bar history in, numeric series out. They are
//! precomputed once per symbol before a run and attached to the symbol's
//! `SymbolSeries` as named columns, which strategies read per step. Every
//! indicator here is built from opens (and the previous bar's range), so the
//! value at step t is known when quotes are placed at step t's open.

pub mod hl_range;
pub mod momentum;
pub mod sma_deviation;
pub mod volatility;

pub use hl_range::HlRange;
pub use momentum::Momentum;
pub use sma_deviation::SmaDeviation;
pub use volatility::Volatility;

use crate::data::SymbolSeries;
use crate::domain::Bar;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Trait for indicators.
///
/// `compute` returns a series of the same length as `bars`. The first
/// `lookback()` values are `f64::NAN`. No value at index t may depend on data
/// that is unknown at bar t's open.
pub trait Indicator: Send + Sync {
    /// Column name, including the window (e.g. "volatility_7").
    fn name(&self) -> &str;

    /// Number of leading bars without a valid value.
    fn lookback(&self) -> usize;

    fn compute(&self, bars: &[Bar]) -> Vec<f64>;
}

/// Indicator families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorKind {
    Volatility,
    Momentum,
    SmaDeviation,
    HlRange,
}

impl fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IndicatorKind::Volatility => "volatility",
            IndicatorKind::Momentum => "momentum",
            IndicatorKind::SmaDeviation => "sma_deviation",
            IndicatorKind::HlRange => "hl_range",
        };
        f.write_str(s)
    }
}

/// A requested indicator column: family plus window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IndicatorSpec {
    pub kind: IndicatorKind,
    pub window: usize,
}

impl IndicatorSpec {
    pub fn new(kind: IndicatorKind, window: usize) -> Self {
        Self { kind, window }
    }

    /// Column name the strategy reads, e.g. "momentum_7".
    pub fn name(&self) -> String {
        format!("{}_{}", self.kind, self.window)
    }

    pub fn build(&self) -> Box<dyn Indicator> {
        match self.kind {
            IndicatorKind::Volatility => Box::new(Volatility::new(self.window)),
            IndicatorKind::Momentum => Box::new(Momentum::new(self.window)),
            IndicatorKind::SmaDeviation => Box::new(SmaDeviation::new(self.window)),
            IndicatorKind::HlRange => Box::new(HlRange::new(self.window)),
        }
    }
}

/// Compute `specs` over `series` and store each result as a named column.
///
/// Columns that already exist are left untouched.
pub fn attach_indicators(series: &mut SymbolSeries, specs: &[IndicatorSpec]) {
    let bars = series.bars();
    for spec in specs {
        let name = spec.name();
        if series.indicators.contains_key(&name) {
            continue;
        }
        let values = spec.build().compute(&bars);
        series.insert_indicator(name, values);
    }
}

/// Create bars from open prices for testing.
///
/// close = next open (or the open for the last bar), high/low = max/min(open, close) ± 1.0.
#[cfg(test)]
pub fn make_bars(opens: &[f64]) -> Vec<Bar> {
    use chrono::{Duration, TimeZone, Utc};
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    opens
        .iter()
        .enumerate()
        .map(|(i, &open)| {
            let close = opens.get(i + 1).copied().unwrap_or(open);
            Bar {
                timestamp: start + Duration::hours(i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
            }
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_names_include_window() {
        assert_eq!(IndicatorSpec::new(IndicatorKind::Volatility, 7).name(), "volatility_7");
        assert_eq!(IndicatorSpec::new(IndicatorKind::SmaDeviation, 3).name(), "sma_deviation_3");
    }

    #[test]
    fn attach_adds_named_columns_of_full_length() {
        let bars = make_bars(&[100.0, 101.0, 102.0, 101.0, 100.0, 99.0]);
        let mut series = SymbolSeries::from_bars(&bars);
        attach_indicators(
            &mut series,
            &[
                IndicatorSpec::new(IndicatorKind::Volatility, 2),
                IndicatorSpec::new(IndicatorKind::Momentum, 2),
            ],
        );
        assert_eq!(series.indicators["volatility_2"].len(), 6);
        assert_eq!(series.indicators["momentum_2"].len(), 6);
        assert!(series.indicator("momentum_2", 1).is_none());
        assert!(series.indicator("momentum_2", 2).is_some());
    }

    /// Truncating the input must not change any earlier value.
    #[test]
    fn no_lookahead_for_any_indicator() {
        let opens: Vec<f64> = (0..40).map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0).collect();
        let full = make_bars(&opens);
        for kind in [
            IndicatorKind::Volatility,
            IndicatorKind::Momentum,
            IndicatorKind::SmaDeviation,
            IndicatorKind::HlRange,
        ] {
            let ind = IndicatorSpec::new(kind, 5).build();
            let all = ind.compute(&full);
            let cut = ind.compute(&full[..25]);
            for i in 0..25 {
                // the last truncated bar's close differs from the full series,
                // opens and earlier ranges do not
                if all[i].is_nan() {
                    assert!(cut[i].is_nan(), "{kind} index {i}");
                } else {
                    assert_approx(cut[i], all[i], DEFAULT_EPSILON);
                }
            }
        }
    }
}
