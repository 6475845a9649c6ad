//! Quoting strategies.
//!
//! A strategy turns the current market and portfolio view of one symbol into
//! an ordered list of limit orders for the current step. Strategies are pure:
//! `quote` takes `&self` and everything it may depend on is passed in, so the
//! same strategy object can drive many runs in parallel.
//!
//! Every variant quotes around the bar open (the only price known when quotes
//! are placed), rounds onto the instrument's tick grid away from the touch and
//! may ladder several levels per side.

pub mod avellaneda_stoikov;
pub mod factory;
pub mod indicator_skew;
pub mod symmetric_grid;

pub use avellaneda_stoikov::{AvellanedaStoikov, VolatilitySource};
pub use factory::{create_strategy, FactoryError, StrategyConfig};
pub use indicator_skew::IndicatorSkew;
pub use symmetric_grid::SymmetricGrid;

use crate::data::SymbolSeries;
use crate::domain::{Bar, Instrument, Order, Side};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a strategy could not produce quotes. Fatal for the run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StrategyError {
    #[error("indicator '{0}' is unavailable at this step")]
    MissingIndicator(String),

    #[error("inventory-based sizing needs a position limit from the risk policy")]
    NoInventoryLimit,

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Quoting strategy for one symbol.
pub trait Strategy: Send + Sync {
    fn name(&self) -> &str;

    /// Leading steps during which the engine does not ask for quotes.
    fn warmup(&self) -> usize {
        0
    }

    /// Candidate orders for `symbol` at `step`, in priority order, plus the
    /// model's reservation price and spread.
    fn quote(
        &self,
        symbol: &str,
        market: &MarketState<'_>,
        portfolio: &PortfolioState,
        step: usize,
    ) -> Result<QuoteOutput, StrategyError>;
}

/// What a strategy produced for one symbol at one step.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QuoteOutput {
    pub orders: Vec<Order>,
    /// Price the ladder is centered on, when the model has one.
    pub reservation_price: Option<f64>,
    /// Distance between the top ask and the top bid, in price units.
    pub spread: Option<f64>,
}

impl QuoteOutput {
    /// Bare orders with no model diagnostics.
    pub fn from_orders(orders: Vec<Order>) -> Self {
        Self {
            orders,
            ..Self::default()
        }
    }
}

// ─── Inputs ──────────────────────────────────────────────────────────

/// Market view of one symbol at one step: the current bar, history up to and
/// including it, precomputed indicators and instrument metadata.
#[derive(Debug, Clone, Copy)]
pub struct MarketState<'a> {
    pub step: usize,
    pub bar: Bar,
    series: &'a SymbolSeries,
    instrument: &'a Instrument,
}

impl<'a> MarketState<'a> {
    pub fn new(step: usize, bar: Bar, series: &'a SymbolSeries, instrument: &'a Instrument) -> Self {
        Self {
            step,
            bar,
            series,
            instrument,
        }
    }

    /// Price quotes are built around.
    pub fn reference_price(&self) -> f64 {
        self.bar.open
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.bar.timestamp
    }

    pub fn instrument(&self) -> &'a Instrument {
        self.instrument
    }

    /// Opens up to and including the current step.
    pub fn opens(&self) -> &'a [f64] {
        &self.series.open[..=self.step]
    }

    pub fn highs(&self) -> &'a [f64] {
        &self.series.high[..=self.step]
    }

    pub fn lows(&self) -> &'a [f64] {
        &self.series.low[..=self.step]
    }

    pub fn closes(&self) -> &'a [f64] {
        &self.series.close[..=self.step]
    }

    /// Indicator value at the current step, `None` during warmup or when absent.
    pub fn indicator(&self, name: &str) -> Option<f64> {
        self.series.indicator(name, self.step)
    }

    pub fn require_indicator(&self, name: &str) -> Result<f64, StrategyError> {
        self.indicator(name)
            .ok_or_else(|| StrategyError::MissingIndicator(name.to_string()))
    }
}

/// Portfolio view of one symbol, valued at the reference price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PortfolioState {
    /// Signed quantity held.
    pub inventory: f64,
    pub avg_entry_price: Option<f64>,
    pub unrealized_pnl: f64,
    pub realized_pnl: f64,
    pub equity: f64,
    /// Equity allotted to each symbol (equity / symbol_count).
    pub margin_share: f64,
    /// Largest position in units the risk policy allows, if it publishes one.
    pub max_inventory: Option<f64>,
    pub symbol_count: usize,
}

impl PortfolioState {
    /// A flat book with `equity` spread over `symbol_count` symbols.
    pub fn flat(equity: f64, symbol_count: usize) -> Self {
        Self {
            inventory: 0.0,
            avg_entry_price: None,
            unrealized_pnl: 0.0,
            realized_pnl: 0.0,
            equity,
            margin_share: equity / symbol_count.max(1) as f64,
            max_inventory: None,
            symbol_count,
        }
    }

    /// Inventory scaled by the published limit; raw inventory when there is none.
    pub fn normalized_inventory(&self) -> f64 {
        match self.max_inventory {
            Some(max) if max > 0.0 => self.inventory / max,
            _ => self.inventory,
        }
    }

    /// Units that `side` may still add before the limit; `None` when unlimited.
    pub fn room(&self, side: Side) -> Option<f64> {
        self.max_inventory
            .map(|max| (max - self.inventory * side.sign()).max(0.0))
    }
}

// ─── Shared quoting helpers ──────────────────────────────────────────

/// How large each quoted order is.
///
/// The inventory-based modes give a side's whole budget, which is then split
/// evenly across the ladder levels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Sizing {
    /// Constant size in units for every order.
    Fixed { size: f64 },
    /// Each side quotes `fraction · max_inventory` in total.
    InventoryFraction { fraction: f64 },
    /// Each side quotes `aggressivity` of its remaining room in total:
    /// `(max_inventory − inventory)` for bids, `(max_inventory + inventory)` for asks.
    Adaptive { aggressivity: f64 },
}

impl Sizing {
    /// Per-level (bid size, ask size) for a ladder of `levels` orders per side.
    pub fn level_sizes(&self, portfolio: &PortfolioState, levels: usize) -> Result<(f64, f64), StrategyError> {
        let levels = levels.max(1) as f64;
        match *self {
            Sizing::Fixed { size } => Ok((size, size)),
            Sizing::InventoryFraction { fraction } => {
                let max = portfolio.max_inventory.ok_or(StrategyError::NoInventoryLimit)?;
                let size = max * fraction / levels;
                Ok((size, size))
            }
            Sizing::Adaptive { aggressivity } => {
                let bid_room = portfolio.room(Side::Bid).ok_or(StrategyError::NoInventoryLimit)?;
                let ask_room = portfolio.room(Side::Ask).ok_or(StrategyError::NoInventoryLimit)?;
                Ok((bid_room * aggressivity / levels, ask_room * aggressivity / levels))
            }
        }
    }
}

/// Below this many units a side counts as full.
const ROOM_EPSILON: f64 = 1e-12;

/// Take up to `size` units out of the remaining `room`.
fn take(room: &mut Option<f64>, size: f64) -> Option<f64> {
    if !(size.is_finite() && size > 0.0) {
        return None;
    }
    match room {
        None => Some(size),
        Some(left) if *left > ROOM_EPSILON => {
            let granted = size.min(*left);
            *left -= granted;
            Some(granted)
        }
        Some(_) => None,
    }
}

/// Top-of-ladder prices plus the geometry of the deeper levels.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Ladder {
    pub reservation: f64,
    pub bid: f64,
    pub ask: f64,
    pub levels: usize,
    /// Absolute price distance between consecutive levels.
    pub spacing: f64,
    pub bid_size: f64,
    pub ask_size: f64,
}

impl Ladder {
    pub fn new(reservation: f64, bid: f64, ask: f64, levels: usize, spacing: f64, sizes: (f64, f64)) -> Self {
        Self {
            reservation,
            bid,
            ask,
            levels,
            spacing,
            bid_size: sizes.0,
            ask_size: sizes.1,
        }
    }

    /// Emit bid/ask pairs level by level. Each side draws on its remaining room
    /// under the inventory limit: the level that reaches the limit is shrunk to
    /// fit and deeper levels are dropped. Bids priced at or below zero are skipped.
    pub fn into_output(self, symbol: &str, market: &MarketState<'_>, portfolio: &PortfolioState) -> QuoteOutput {
        let instrument = market.instrument();
        let ts = market.timestamp();
        let mut bid_room = portfolio.room(Side::Bid);
        let mut ask_room = portfolio.room(Side::Ask);

        let mut orders = Vec::with_capacity(self.levels * 2);
        for level in 0..self.levels {
            let offset = level as f64 * self.spacing;
            let bid = instrument.round_price(self.bid - offset, Side::Bid);
            if bid > 0.0 {
                if let Some(size) = take(&mut bid_room, self.bid_size) {
                    orders.push(Order::bid(symbol, bid, size, ts));
                }
            }
            let ask = instrument.round_price(self.ask + offset, Side::Ask);
            if let Some(size) = take(&mut ask_room, self.ask_size) {
                orders.push(Order::ask(symbol, ask, size, ts));
            }
        }
        QuoteOutput {
            orders,
            reservation_price: Some(self.reservation),
            spread: Some(self.ask - self.bid),
        }
    }
}
