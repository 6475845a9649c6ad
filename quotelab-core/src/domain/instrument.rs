use super::order::Side;
use serde::{Deserialize, Serialize};

/// Per-symbol overrides of the run-wide defaults.
///
/// Every field is optional: an absent tick size disables rounding, an absent
/// leverage cap falls back to the risk policy's share of the aggregate cap, and
/// an absent margin rate means fully collateralized positions (1.0).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Instrument {
    pub tick_size: Option<f64>,
    pub max_leverage: Option<f64>,
    pub margin_rate: Option<f64>,
}

impl Instrument {
    pub const DEFAULT_MARGIN_RATE: f64 = 1.0;

    pub fn margin_rate(&self) -> f64 {
        self.margin_rate.unwrap_or(Self::DEFAULT_MARGIN_RATE)
    }

    /// Round a quote onto the tick grid, away from the touch: bids down, asks up.
    pub fn round_price(&self, price: f64, side: Side) -> f64 {
        match self.tick_size {
            Some(tick) if tick > 0.0 => round_to_tick(price, tick, side),
            _ => price,
        }
    }
}

/// Side-aware tick rounding (buy limits round down, sell limits round up).
pub fn round_to_tick(price: f64, tick_size: f64, side: Side) -> f64 {
    let ticks = price / tick_size;
    // Absorb representation noise so an on-grid price stays put.
    let nearest = ticks.round();
    let ticks = if (ticks - nearest).abs() < 1e-9 {
        nearest
    } else {
        match side {
            Side::Bid => ticks.floor(),
            Side::Ask => ticks.ceil(),
        }
    };
    ticks * tick_size
}
