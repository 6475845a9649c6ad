//! Rolling volatility of open-to-open log returns.
//!
//! r[t] = ln(open[t] / open[t-1]), defined from t = 1.
//! volatility[t] = population std-dev of r over the last `period` returns.
//! Lookback: period.

use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Volatility {
    period: usize,
    name: String,
}

impl Volatility {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "Volatility period must be >= 1");
        Self {
            period,
            name: format!("volatility_{period}"),
        }
    }
}

impl Indicator for Volatility {
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

        let mut returns = vec![f64::NAN; n];
        for i in 1..n {
            returns[i] = (bars[i].open / bars[i - 1].open).ln();
        }

        for i in self.period..n {
            let window = &returns[(i + 1 - self.period)..=i];
            if window.iter().any(|r| !r.is_finite()) {
                continue;
            }
            let mean = window.iter().sum::<f64>() / self.period as f64;
            let var = window.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / self.period as f64;
            result[i] = var.sqrt();
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, DEFAULT_EPSILON};

    #[test]
    fn constant_growth_has_zero_volatility() {
        let opens: Vec<f64> = (0..10).map(|i| 100.0 * 1.01_f64.powi(i)).collect();
        let result = Volatility::new(3).compute(&make_bars(&opens));
        for v in result.iter().take(3) {
            assert!(v.is_nan());
        }
        assert_approx(result[5], 0.0, 1e-12);
    }

    #[test]
    fn alternating_returns() {
        // log returns alternate +a, -a: std = a
        let a: f64 = 0.02;
        let opens = [100.0, 100.0 * a.exp(), 100.0, 100.0 * a.exp(), 100.0];
        let result = Volatility::new(2).compute(&make_bars(&opens));
        assert_approx(result[2], a, DEFAULT_EPSILON);
        assert_approx(result[4], a, DEFAULT_EPSILON);
    }

    #[test]
    fn too_few_bars() {
        let result = Volatility::new(5).compute(&make_bars(&[1.0, 2.0, 3.0]));
        assert!(result.iter().all(|v| v.is_nan()));
    }
}
