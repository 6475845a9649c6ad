//! Intrabar path assumptions.
//!
//! An OHLC bar does not say whether the high or the low traded first. When a
//! bid and an ask both sit inside the range, the policy decides whether both
//! may fill or only the side the inferred path reaches first.

use crate::domain::{Bar, Side};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntrabarPolicy {
    /// Every touched order fills, on both sides of the book.
    #[default]
    BothSides,
    /// Only the side the inferred path touches first fills; the other side
    /// fills only when the open already crosses it.
    FirstTouchOnly,
}

impl IntrabarPolicy {
    /// Side of the book the bar reaches first.
    ///
    /// Heuristic: if |open − high| ≤ |open − low| the path is
    /// Open → High → Low → Close, so asks are touched first.
    pub fn first_touched(bar: &Bar) -> Side {
        if (bar.open - bar.high).abs() <= (bar.open - bar.low).abs() {
            Side::Ask
        } else {
            Side::Bid
        }
    }

    /// Whether an order on `side` at `price`, already touched by the bar, may fill.
    pub fn allows(&self, side: Side, price: f64, bar: &Bar) -> bool {
        match self {
            IntrabarPolicy::BothSides => true,
            IntrabarPolicy::FirstTouchOnly => {
                side == Self::first_touched(bar) || crossed_at_open(side, price, bar)
            }
        }
    }
}

/// The open alone satisfies the order.
fn crossed_at_open(side: Side, price: f64, bar: &Bar) -> bool {
    match side {
        Side::Bid => price >= bar.open,
        Side::Ask => price <= bar.open,
    }
}
