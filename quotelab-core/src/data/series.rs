use super::DataShapeError;
use crate::domain::Bar;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Column-oriented price history of one symbol.
///
/// All columns, including every indicator, must have the same length.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SymbolSeries {
    pub timestamps: Vec<DateTime<Utc>>,
    pub open: Vec<f64>,
    pub high: Vec<f64>,
    pub low: Vec<f64>,
    pub close: Vec<f64>,
    pub indicators: BTreeMap<String, Vec<f64>>,
}

impl SymbolSeries {
    pub fn from_bars(bars: &[Bar]) -> Self {
        Self {
            timestamps: bars.iter().map(|b| b.timestamp).collect(),
            open: bars.iter().map(|b| b.open).collect(),
            high: bars.iter().map(|b| b.high).collect(),
            low: bars.iter().map(|b| b.low).collect(),
            close: bars.iter().map(|b| b.close).collect(),
            indicators: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// The bar at `index`, if every column reaches that far.
    pub fn bar(&self, index: usize) -> Option<Bar> {
        Some(Bar {
            timestamp: *self.timestamps.get(index)?,
            open: *self.open.get(index)?,
            high: *self.high.get(index)?,
            low: *self.low.get(index)?,
            close: *self.close.get(index)?,
        })
    }

    /// Row view of the whole series.
    pub fn bars(&self) -> Vec<Bar> {
        (0..self.len()).filter_map(|i| self.bar(i)).collect()
    }

    pub fn insert_indicator(&mut self, name: impl Into<String>, values: Vec<f64>) {
        self.indicators.insert(name.into(), values);
    }

    pub fn with_indicator(mut self, name: impl Into<String>, values: Vec<f64>) -> Self {
        self.insert_indicator(name, values);
        self
    }

    /// Indicator value at `index`. NaN (warmup) and missing values read as `None`.
    pub fn indicator(&self, name: &str, index: usize) -> Option<f64> {
        self.indicators
            .get(name)
            .and_then(|v| v.get(index).copied())
            .filter(|v| !v.is_nan())
    }

    /// Check column lengths, timestamp order and bar sanity.
    pub fn validate(&self, symbol: &str) -> Result<(), DataShapeError> {
        let expected = self.len();
        if expected == 0 {
            return Err(DataShapeError::EmptySeries {
                symbol: symbol.to_string(),
            });
        }

        let columns: [(&'static str, usize); 4] = [
            ("open", self.open.len()),
            ("high", self.high.len()),
            ("low", self.low.len()),
            ("close", self.close.len()),
        ];
        for (field, actual) in columns {
            if actual != expected {
                return Err(DataShapeError::FieldLength {
                    symbol: symbol.to_string(),
                    field,
                    expected,
                    actual,
                });
            }
        }

        for (name, values) in &self.indicators {
            if values.len() != expected {
                return Err(DataShapeError::IndicatorLength {
                    symbol: symbol.to_string(),
                    indicator: name.clone(),
                    expected,
                    actual: values.len(),
                });
            }
        }

        for step in 1..expected {
            if self.timestamps[step] <= self.timestamps[step - 1] {
                return Err(DataShapeError::UnorderedTimestamps {
                    symbol: symbol.to_string(),
                    step,
                });
            }
        }

        for step in 0..expected {
            if !self.bar(step).is_some_and(|b| b.is_sane()) {
                return Err(DataShapeError::InvalidBar {
                    symbol: symbol.to_string(),
                    step,
                });
            }
        }

        Ok(())
    }
}

/// Aligned market data for every symbol of a run, keyed in symbol order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketData {
    series: BTreeMap<String, SymbolSeries>,
}

impl MarketData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, symbol: impl Into<String>, series: SymbolSeries) {
        self.series.insert(symbol.into(), series);
    }

    pub fn with_symbol(mut self, symbol: impl Into<String>, series: SymbolSeries) -> Self {
        self.insert(symbol, series);
        self
    }

    pub fn get(&self, symbol: &str) -> Option<&SymbolSeries> {
        self.series.get(symbol)
    }

    pub fn get_mut(&mut self, symbol: &str) -> Option<&mut SymbolSeries> {
        self.series.get_mut(symbol)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(|s| s.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SymbolSeries)> {
        self.series.iter().map(|(s, v)| (s.as_str(), v))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut SymbolSeries)> {
        self.series.iter_mut().map(|(s, v)| (s.as_str(), v))
    }

    pub fn symbol_count(&self) -> usize {
        self.series.len()
    }

    /// Number of steps (length of the first series; 0 without symbols).
    pub fn num_steps(&self) -> usize {
        self.series.values().next().map_or(0, |s| s.len())
    }

    /// Validate every series and their mutual alignment.
    ///
    /// Returns the common number of steps.
    pub fn validate(&self) -> Result<usize, DataShapeError> {
        let mut iter = self.series.iter();
        let (reference, first) = iter.next().ok_or(DataShapeError::NoSymbols)?;
        first.validate(reference)?;
        let expected = first.len();

        for (symbol, series) in iter {
            series.validate(symbol)?;
            if series.len() != expected {
                return Err(DataShapeError::SymbolLength {
                    symbol: symbol.clone(),
                    reference: reference.clone(),
                    expected,
                    actual: series.len(),
                });
            }
            if let Some(step) = (0..expected).find(|&i| series.timestamps[i] != first.timestamps[i]) {
                return Err(DataShapeError::TimestampMismatch {
                    symbol: symbol.clone(),
                    reference: reference.clone(),
                    step,
                });
            }
        }

        Ok(expected)
    }
}
