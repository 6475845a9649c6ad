//! Deviation of the open from its simple moving average.
//!
//! sma_deviation[t] = (open[t] - SMA(open, period)[t]) / SMA(open, period)[t]
//! Lookback: period - 1 (first valid value at index period-1).

use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct SmaDeviation {
    period: usize,
    name: String,
}

impl SmaDeviation {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "SMA deviation period must be >= 1");
        Self {
            period,
            name: format!("sma_deviation_{period}"),
        }
    }
}

impl Indicator for SmaDeviation {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let n = bars.len();
        let mut result = vec![f64::NAN; n];

        if n < self.period {
            return result;
        }

        let mut sum: f64 = bars.iter().take(self.period).map(|b| b.open).sum();
        for i in (self.period - 1)..n {
            if i >= self.period {
                sum += bars[i].open - bars[i - self.period].open;
            }
            let sma = sum / self.period as f64;
            if sma.is_finite() && sma != 0.0 {
                result[i] = (bars[i].open - sma) / sma;
            }
        }

        result
    }
}
