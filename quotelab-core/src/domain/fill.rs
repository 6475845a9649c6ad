use crate::domain::ids::OrderId;
use crate::domain::order::Side;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether a fill rested passively or crossed the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Liquidity {
    Maker,
    Taker,
}

/// Fill record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    /// The resting order this fill executed. `None` for forced liquidations.
    pub order_id: Option<OrderId>,
    pub symbol: String,
    pub side: Side,
    pub price: f64,
    pub size: f64,
    pub fee: f64,
    pub liquidity: Liquidity,
    pub step: usize,
    pub timestamp: DateTime<Utc>,
}

impl Fill {
    pub fn notional(&self) -> f64 {
        self.price * self.size
    }

    /// Inventory change: positive for buys, negative for sells.
    pub fn signed_size(&self) -> f64 {
        self.side.sign() * self.size
    }

    /// Cash movement caused by this fill, fee included.
    ///
    /// Buys pay notional plus fee, sells receive notional minus fee.
    pub fn cash_delta(&self) -> f64 {
        -self.side.sign() * self.notional() - self.fee
    }
}
