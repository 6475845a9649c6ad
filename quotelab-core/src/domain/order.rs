//! Quoted limit orders.
//!
//! An `Order` is an immutable value: changing a quote means issuing a new one.
//! The engine wraps every accepted order in a `RestingOrder`, which carries the
//! run-unique id fills refer back to. A resting order lives for exactly one step.

use super::ids::OrderId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which side of the book an order rests on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Buy order. Fills add inventory.
    Bid,
    /// Sell order. Fills remove inventory.
    Ask,
}

impl Side {
    /// +1 for bids, -1 for asks.
    pub fn sign(self) -> f64 {
        match self {
            Side::Bid => 1.0,
            Side::Ask => -1.0,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Side::Bid => Side::Ask,
            Side::Ask => Side::Bid,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Bid => write!(f, "bid"),
            Side::Ask => write!(f, "ask"),
        }
    }
}

/// One quoted limit order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    symbol: String,
    side: Side,
    price: f64,
    size: f64,
    timestamp: DateTime<Utc>,
}

impl Order {
    pub fn new(
        symbol: impl Into<String>,
        side: Side,
        price: f64,
        size: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            price,
            size,
            timestamp,
        }
    }

    pub fn bid(symbol: impl Into<String>, price: f64, size: f64, timestamp: DateTime<Utc>) -> Self {
        Self::new(symbol, Side::Bid, price, size, timestamp)
    }

    pub fn ask(symbol: impl Into<String>, price: f64, size: f64, timestamp: DateTime<Utc>) -> Self {
        Self::new(symbol, Side::Ask, price, size, timestamp)
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    pub fn size(&self) -> f64 {
        self.size
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Price and size are finite and strictly positive.
    pub fn is_well_formed(&self) -> bool {
        self.price.is_finite() && self.price > 0.0 && self.size.is_finite() && self.size > 0.0
    }

    /// Notional value at the order's own price.
    pub fn notional(&self) -> f64 {
        self.price * self.size
    }

    /// Quantity with inventory sign: positive for bids, negative for asks.
    pub fn signed_size(&self) -> f64 {
        self.side.sign() * self.size
    }
}

/// An accepted order resting for one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestingOrder {
    pub id: OrderId,
    #[serde(flatten)]
    pub order: Order,
}

impl RestingOrder {
    pub fn new(id: OrderId, order: Order) -> Self {
        Self { id, order }
    }
}
