//! Market data handed to the engine.
//!
//! The engine never loads anything itself: callers build a `MarketData` of
//! aligned per-symbol series (OHLC plus named indicator columns) and the engine
//! validates its shape once, before the first step.

pub mod align;
pub mod series;

pub use align::{align_on_common_timestamps, Aligned};
pub use series::{MarketData, SymbolSeries};

use thiserror::Error;

/// Malformed or misaligned input. Always fatal, always raised before step 0.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataShapeError {
    #[error("market data contains no symbols")]
    NoSymbols,

    #[error("series for '{symbol}' is empty")]
    EmptySeries { symbol: String },

    #[error("'{symbol}': field '{field}' has {actual} values, expected {expected}")]
    FieldLength {
        symbol: String,
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("'{symbol}': indicator '{indicator}' has {actual} values, expected {expected}")]
    IndicatorLength {
        symbol: String,
        indicator: String,
        expected: usize,
        actual: usize,
    },

    #[error("'{symbol}' has {actual} steps but '{reference}' has {expected}")]
    SymbolLength {
        symbol: String,
        reference: String,
        expected: usize,
        actual: usize,
    },

    #[error("'{symbol}': timestamp at step {step} differs from '{reference}'")]
    TimestampMismatch {
        symbol: String,
        reference: String,
        step: usize,
    },

    #[error("'{symbol}': timestamps not strictly increasing at step {step}")]
    UnorderedTimestamps { symbol: String, step: usize },

    #[error("'{symbol}': bar at step {step} is not a sane OHLC bar")]
    InvalidBar { symbol: String, step: usize },

    #[error("no strategy assigned to '{symbol}'")]
    MissingStrategy { symbol: String },

    #[error("strategy assigned to '{symbol}', which has no market data")]
    UnknownSymbol { symbol: String },
}
