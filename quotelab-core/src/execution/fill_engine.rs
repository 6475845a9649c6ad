//! Fill engine: matches one step's resting orders against its bar.
//!
//! Stateless apart from the fee schedule and intrabar policy. Every fill it
//! produces is checked before it leaves: a price outside the bar or a size
//! different from the order is a bug, reported as `FillEngineInvariantError`.

use super::intrabar::IntrabarPolicy;
use crate::domain::{Bar, Fill, Liquidity, OrderId, RestingOrder, Side};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Fees as fractions of notional.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeeSchedule {
    /// Charged on every resting-order fill.
    pub maker: f64,
    /// Charged on forced liquidations.
    pub taker: f64,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            maker: 0.0002,
            taker: 0.0005,
        }
    }
}

impl FeeSchedule {
    pub fn zero() -> Self {
        Self {
            maker: 0.0,
            taker: 0.0,
        }
    }
}

/// A produced fill broke the matching rules.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FillEngineInvariantError {
    #[error("{symbol}: fill price {price} for {order_id:?} outside bar range [{low}, {high}]")]
    PriceOutsideBar {
        symbol: String,
        order_id: Option<OrderId>,
        price: f64,
        low: f64,
        high: f64,
    },

    #[error("{symbol}: fill price {price} for {order_id:?} is not positive and finite")]
    InvalidPrice {
        symbol: String,
        order_id: Option<OrderId>,
        price: f64,
    },

    #[error("{symbol}: fill size {filled} for {order_id:?} differs from order size {ordered}")]
    SizeMismatch {
        symbol: String,
        order_id: Option<OrderId>,
        filled: f64,
        ordered: f64,
    },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FillEngine {
    fees: FeeSchedule,
    intrabar: IntrabarPolicy,
}

impl FillEngine {
    pub fn new(fees: FeeSchedule, intrabar: IntrabarPolicy) -> Self {
        Self { fees, intrabar }
    }

    pub fn fees(&self) -> &FeeSchedule {
        &self.fees
    }

    pub fn intrabar_policy(&self) -> IntrabarPolicy {
        self.intrabar
    }

    /// Match `orders` (all for one symbol) against `bar`, in the given order.
    pub fn match_orders(
        &self,
        orders: &[RestingOrder],
        bar: &Bar,
        step: usize,
    ) -> Result<Vec<Fill>, FillEngineInvariantError> {
        let mut fills = Vec::new();
        for resting in orders {
            let order = &resting.order;
            let Some(price) = touch_price(order.side(), order.price(), bar) else {
                continue;
            };
            if !self.intrabar.allows(order.side(), order.price(), bar) {
                debug!(
                    symbol = order.symbol(),
                    order_id = %resting.id,
                    "touched but blocked by intrabar policy"
                );
                continue;
            }

            let fill = Fill {
                order_id: Some(resting.id),
                symbol: order.symbol().to_string(),
                side: order.side(),
                price,
                size: order.size(),
                fee: self.fees.maker * price * order.size(),
                liquidity: Liquidity::Maker,
                step,
                timestamp: bar.timestamp,
            };
            check_fill(&fill, order.size(), bar)?;
            fills.push(fill);
        }
        Ok(fills)
    }

    /// Forced close of a `quantity` position at `mark`, paying the taker fee.
    pub fn liquidation_fill(
        &self,
        symbol: &str,
        quantity: f64,
        mark: f64,
        step: usize,
        timestamp: DateTime<Utc>,
    ) -> Result<Fill, FillEngineInvariantError> {
        if !(mark.is_finite() && mark > 0.0) {
            return Err(FillEngineInvariantError::InvalidPrice {
                symbol: symbol.to_string(),
                order_id: None,
                price: mark,
            });
        }
        let size = quantity.abs();
        Ok(Fill {
            order_id: None,
            symbol: symbol.to_string(),
            side: if quantity > 0.0 { Side::Ask } else { Side::Bid },
            price: mark,
            size,
            fee: self.fees.taker * mark * size,
            liquidity: Liquidity::Taker,
            step,
            timestamp,
        })
    }
}

/// Execution price of a limit order the bar trades through, if any.
///
/// Bids fill at or below their limit, asks at or above; a gap through the
/// limit fills at the open.
fn touch_price(side: Side, limit: f64, bar: &Bar) -> Option<f64> {
    match side {
        Side::Bid if bar.low <= limit => Some(limit.min(bar.open)),
        Side::Ask if bar.high >= limit => Some(limit.max(bar.open)),
        _ => None,
    }
}

fn check_fill(fill: &Fill, ordered: f64, bar: &Bar) -> Result<(), FillEngineInvariantError> {
    if !(fill.price.is_finite() && fill.price > 0.0) {
        return Err(FillEngineInvariantError::InvalidPrice {
            symbol: fill.symbol.clone(),
            order_id: fill.order_id,
            price: fill.price,
        });
    }
    let tolerance = 1e-9 * bar.high.abs().max(1.0);
    if !bar.contains(fill.price, tolerance) {
        return Err(FillEngineInvariantError::PriceOutsideBar {
            symbol: fill.symbol.clone(),
            order_id: fill.order_id,
            price: fill.price,
            low: bar.low,
            high: bar.high,
        });
    }
    if fill.size != ordered {
        return Err(FillEngineInvariantError::SizeMismatch {
            symbol: fill.symbol.clone(),
            order_id: fill.order_id,
            filled: fill.size,
            ordered,
        });
    }
    Ok(())
}
