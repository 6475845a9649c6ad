//! Moving average of the previous bar's high-low range, normalized by the current open.
//!
//! range[t] = (high[t-1] - low[t-1]) / open[t], defined from t = 1.
//! hl_range[t] = mean of range over the last `period` values.
//! Lookback: period.

use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct HlRange {
    period: usize,
    name: String,
}

impl HlRange {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "HL range period must be >= 1");
        Self {
            period,
            name: format!("hl_range_{period}"),
        }
    }
}

impl Indicator for HlRange {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let n = bars.len();
        let mut result = vec![f64::NAN; n];
        if n <= self.period {
            return result;
        }

        let mut ranges = vec![f64::NAN; n];
        for i in 1..n {
            ranges[i] = (bars[i - 1].high - bars[i - 1].low) / bars[i].open;
        }

        for i in self.period..n {
            let window = &ranges[(i + 1 - self.period)..=i];
            if window.iter().all(|r| r.is_finite()) {
                result[i] = window.iter().sum::<f64>() / self.period as f64;
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, DEFAULT_EPSILON};

    #[test]
    fn uses_previous_bar_range() {
        // make_bars: high/low = max/min(open, next open) ± 1
        let bars = make_bars(&[100.0, 100.0, 100.0, 100.0]);
        let result = HlRange::new(2).compute(&bars);
        assert!(result[1].is_nan());
        // every range is 2 / 100
        assert_approx(result[2], 0.02, DEFAULT_EPSILON);
        assert_approx(result[3], 0.02, DEFAULT_EPSILON);
    }
}
