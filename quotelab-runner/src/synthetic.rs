//! Synthetic OHLC bars from an arithmetic Brownian motion.
//!
//! Each bar is cut from `substeps` Gaussian increments of the path: the open is
//! the previous close, high and low are the extremes of the sub-path, the close
//! is its last point. The generator is seeded from BLAKE3(seed, symbol), so a
//! given (seed, symbol) pair always yields the same series.

use chrono::{DateTime, Duration, Utc};
use quotelab_core::data::{MarketData, SymbolSeries};
use quotelab_core::domain::Bar;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    pub bars: usize,
    pub seed: u64,
    /// Starting price.
    pub x0: f64,
    /// Path speed: increments have standard deviation `delta * sqrt(dt)`.
    pub delta: f64,
    pub dt: f64,
    /// Increments per bar.
    pub substeps: usize,
    /// Price floor applied to every path point.
    pub min_price: f64,
    /// Timestamp of the first bar, unix seconds.
    pub start_unix: i64,
    pub interval_secs: i64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            bars: 1_000,
            seed: 42,
            x0: 100.0,
            delta: 2.0,
            dt: 0.001,
            substeps: 3,
            min_price: 0.01,
            start_unix: 1_704_067_200,
            interval_secs: 3_600,
        }
    }
}

impl SyntheticConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.bars == 0 {
            return Err("bars must be >= 1".into());
        }
        if self.substeps == 0 {
            return Err("substeps must be >= 1".into());
        }
        if !(self.min_price.is_finite() && self.min_price > 0.0) {
            return Err(format!("min_price must be > 0, got {}", self.min_price));
        }
        if !(self.x0.is_finite() && self.x0 >= self.min_price) {
            return Err(format!("x0 must be >= min_price, got {}", self.x0));
        }
        if !(self.delta.is_finite() && self.delta >= 0.0) {
            return Err(format!("delta must be >= 0, got {}", self.delta));
        }
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return Err(format!("dt must be > 0, got {}", self.dt));
        }
        if self.interval_secs <= 0 {
            return Err(format!("interval_secs must be > 0, got {}", self.interval_secs));
        }
        if DateTime::from_timestamp(self.start_unix, 0).is_none() {
            return Err(format!("start_unix {} is out of range", self.start_unix));
        }
        Ok(())
    }

    /// Bars for one symbol.
    pub fn generate_bars(&self, symbol: &str) -> Vec<Bar> {
        let mut normal = Gaussian::new(symbol_rng(self.seed, symbol));
        let scale = self.delta * self.dt.sqrt();
        let start = DateTime::from_timestamp(self.start_unix, 0).unwrap_or_default();

        let mut bars = Vec::with_capacity(self.bars);
        let mut price = self.x0.max(self.min_price);
        for i in 0..self.bars {
            let open = price;
            let mut high = open;
            let mut low = open;
            for _ in 0..self.substeps {
                price = (price + scale * normal.sample()).max(self.min_price);
                high = high.max(price);
                low = low.min(price);
            }
            bars.push(Bar {
                timestamp: bar_time(start, self.interval_secs, i),
                open,
                high,
                low,
                close: price,
            });
        }
        bars
    }

    /// Aligned market data for `symbols`, all on the same timeline.
    pub fn generate(&self, symbols: &[String]) -> MarketData {
        let mut data = MarketData::new();
        for symbol in symbols {
            data.insert(symbol.clone(), SymbolSeries::from_bars(&self.generate_bars(symbol)));
        }
        data
    }
}

fn bar_time(start: DateTime<Utc>, interval_secs: i64, index: usize) -> DateTime<Utc> {
    start + Duration::seconds(interval_secs.saturating_mul(index as i64))
}

fn symbol_rng(seed: u64, symbol: &str) -> StdRng {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&seed.to_le_bytes());
    hasher.update(symbol.as_bytes());
    StdRng::from_seed(*hasher.finalize().as_bytes())
}

/// Standard normal draws via Box-Muller, keeping the second variate of each pair.
struct Gaussian {
    rng: StdRng,
    spare: Option<f64>,
}

impl Gaussian {
    fn new(rng: StdRng) -> Self {
        Self { rng, spare: None }
    }

    fn sample(&mut self) -> f64 {
        if let Some(z) = self.spare.take() {
            return z;
        }
        // 1 - u keeps the log argument in (0, 1].
        let u1 = 1.0 - self.rng.gen::<f64>();
        let u2 = self.rng.gen::<f64>();
        let radius = (-2.0 * u1.ln()).sqrt();
        let angle = 2.0 * std::f64::consts::PI * u2;
        self.spare = Some(radius * angle.sin());
        radius * angle.cos()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(bars: usize) -> SyntheticConfig {
        SyntheticConfig {
            bars,
            ..SyntheticConfig::default()
        }
    }

    #[test]
    fn same_seed_same_bars() {
        let a = config(200).generate_bars("BTC");
        let b = config(200).generate_bars("BTC");
        assert_eq!(a, b);
    }

    #[test]
    fn symbol_and_seed_change_the_path() {
        let base = config(50);
        assert_ne!(base.generate_bars("BTC"), base.generate_bars("ETH"));

        let reseeded = SyntheticConfig { seed: 7, ..config(50) };
        assert_ne!(base.generate_bars("BTC"), reseeded.generate_bars("BTC"));
    }

    #[test]
    fn bars_are_sane_and_chained() {
        let bars = config(500).generate_bars("BTC");
        assert_eq!(bars.len(), 500);
        assert_eq!(bars[0].open, 100.0);
        for bar in &bars {
            assert!(bar.is_sane(), "{bar:?}");
        }
        for w in bars.windows(2) {
            assert_eq!(w[1].open, w[0].close);
            assert_eq!(w[1].timestamp - w[0].timestamp, Duration::seconds(3_600));
        }
    }

    #[test]
    fn floor_holds_under_violent_paths() {
        let cfg = SyntheticConfig {
            x0: 1.0,
            delta: 500.0,
            min_price: 0.5,
            ..config(300)
        };
        let bars = cfg.generate_bars("X");
        assert!(bars.iter().all(|b| b.low >= 0.5));
    }

    #[test]
    fn zero_delta_is_flat() {
        let cfg = SyntheticConfig { delta: 0.0, ..config(10) };
        for bar in cfg.generate_bars("X") {
            assert_eq!((bar.open, bar.high, bar.low, bar.close), (100.0, 100.0, 100.0, 100.0));
        }
    }

    #[test]
    fn generated_market_data_is_aligned() {
        let symbols = vec!["A".to_string(), "B".to_string()];
        let data = config(64).generate(&symbols);
        assert_eq!(data.validate().unwrap(), 64);
    }

    #[test]
    fn gaussian_moments_are_plausible() {
        let mut g = Gaussian::new(symbol_rng(1, "moments"));
        let n = 20_000;
        let draws: Vec<f64> = (0..n).map(|_| g.sample()).collect();
        let mean = draws.iter().sum::<f64>() / n as f64;
        let var = draws.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;
        assert!(mean.abs() < 0.05, "mean {mean}");
        assert!((var - 1.0).abs() < 0.05, "var {var}");
    }

    #[test]
    fn validate_rejects_bad_settings() {
        assert!(SyntheticConfig::default().validate().is_ok());
        assert!(config(0).validate().is_err());
        assert!(SyntheticConfig { substeps: 0, ..config(1) }.validate().is_err());
        assert!(SyntheticConfig { dt: 0.0, ..config(1) }.validate().is_err());
        assert!(SyntheticConfig { min_price: 0.0, ..config(1) }.validate().is_err());
        assert!(SyntheticConfig { interval_secs: 0, ..config(1) }.validate().is_err());
    }
}
