//! Per-symbol position with weighted-average-cost accounting.

use super::order::Side;
use super::QTY_EPSILON;
use serde::{Deserialize, Serialize};

/// Position tracking
///
/// Created on the first fill for a symbol and kept at zero quantity afterwards,
/// so realized PnL survives a round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    /// Signed inventory: positive is long.
    pub quantity: f64,
    /// Average entry price of the open quantity. `None` while flat.
    pub avg_entry_price: Option<f64>,
    pub realized_pnl: f64,
    pub fees_paid: f64,
}

impl Position {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            quantity: 0.0,
            avg_entry_price: None,
            realized_pnl: 0.0,
            fees_paid: 0.0,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.quantity.abs() < QTY_EPSILON
    }

    pub fn is_long(&self) -> bool {
        self.quantity > 0.0
    }

    pub fn is_short(&self) -> bool {
        self.quantity < 0.0
    }

    pub fn market_value(&self, current_price: f64) -> f64 {
        self.quantity * current_price
    }

    pub fn unrealized_pnl(&self, current_price: f64) -> f64 {
        match self.avg_entry_price {
            Some(entry) if !self.is_flat() => self.quantity * (current_price - entry),
            _ => 0.0,
        }
    }

    /// Apply a trade and return the PnL it realizes, fees excluded.
    ///
    /// Increasing (or opening) re-averages the entry price. Reducing realizes
    /// the difference to the entry on the closed quantity. A flip closes the
    /// whole old position and opens the remainder at `price`.
    pub fn apply_trade(&mut self, side: Side, price: f64, size: f64, fee: f64) -> f64 {
        let trade = side.sign() * size;
        let old = self.quantity;
        let mut new = old + trade;
        if new.abs() < QTY_EPSILON {
            new = 0.0;
        }

        let mut realized = 0.0;
        if old.abs() < QTY_EPSILON || old.signum() == trade.signum() {
            let entry = self.avg_entry_price.unwrap_or(price);
            self.avg_entry_price = Some((entry * old.abs() + price * size) / new.abs());
        } else {
            let entry = self.avg_entry_price.unwrap_or(price);
            let closed = size.min(old.abs());
            realized = closed * (price - entry) * old.signum();

            if new == 0.0 {
                self.avg_entry_price = None;
            } else if new.signum() != old.signum() {
                self.avg_entry_price = Some(price);
            }
        }

        self.quantity = new;
        self.realized_pnl += realized;
        self.fees_paid += fee;
        realized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < EPS
    }

    #[test]
    fn flat_to_long() {
        let mut p = Position::new("BTC");
        let r = p.apply_trade(Side::Bid, 100.0, 2.0, 0.0);
        assert_eq!(r, 0.0);
        assert_eq!(p.quantity, 2.0);
        assert_eq!(p.avg_entry_price, Some(100.0));
    }

    #[test]
    fn flat_to_short() {
        let mut p = Position::new("BTC");
        p.apply_trade(Side::Ask, 100.0, 2.0, 0.0);
        assert_eq!(p.quantity, -2.0);
        assert_eq!(p.avg_entry_price, Some(100.0));
    }

    #[test]
    fn long_increase_reaverages() {
        let mut p = Position::new("BTC");
        p.apply_trade(Side::Bid, 100.0, 1.0, 0.0);
        p.apply_trade(Side::Bid, 110.0, 1.0, 0.0);
        assert!(approx(p.avg_entry_price.unwrap(), 105.0));
    }

    #[test]
    fn short_increase_reaverages() {
        let mut p = Position::new("BTC");
        p.apply_trade(Side::Ask, 100.0, 1.0, 0.0);
        p.apply_trade(Side::Ask, 90.0, 3.0, 0.0);
        assert!(approx(p.avg_entry_price.unwrap(), 92.5));
        assert_eq!(p.quantity, -4.0);
    }

    #[test]
    fn long_partial_close_realizes() {
        let mut p = Position::new("BTC");
        p.apply_trade(Side::Bid, 100.0, 4.0, 0.0);
        let r = p.apply_trade(Side::Ask, 110.0, 1.0, 0.0);
        assert!(approx(r, 10.0));
        assert_eq!(p.quantity, 3.0);
        assert_eq!(p.avg_entry_price, Some(100.0));
    }

    #[test]
    fn short_full_close_goes_flat_and_keeps_pnl() {
        let mut p = Position::new("BTC");
        p.apply_trade(Side::Ask, 100.0, 2.0, 0.0);
        let r = p.apply_trade(Side::Bid, 95.0, 2.0, 0.0);
        assert!(approx(r, 10.0));
        assert!(p.is_flat());
        assert_eq!(p.avg_entry_price, None);
        assert!(approx(p.realized_pnl, 10.0));
    }

    #[test]
    fn long_to_short_flip() {
        let mut p = Position::new("BTC");
        p.apply_trade(Side::Bid, 100.0, 1.0, 0.0);
        let r = p.apply_trade(Side::Ask, 90.0, 3.0, 0.0);
        assert!(approx(r, -10.0));
        assert_eq!(p.quantity, -2.0);
        assert_eq!(p.avg_entry_price, Some(90.0));
    }

    #[test]
    fn short_to_long_flip() {
        let mut p = Position::new("BTC");
        p.apply_trade(Side::Ask, 100.0, 1.0, 0.0);
        let r = p.apply_trade(Side::Bid, 104.0, 2.0, 0.0);
        assert!(approx(r, -4.0));
        assert_eq!(p.quantity, 1.0);
        assert_eq!(p.avg_entry_price, Some(104.0));
    }

    #[test]
    fn fees_accumulate_separately() {
        let mut p = Position::new("BTC");
        p.apply_trade(Side::Bid, 100.0, 1.0, 0.02);
        p.apply_trade(Side::Ask, 100.0, 1.0, 0.02);
        assert!(approx(p.fees_paid, 0.04));
        assert_eq!(p.realized_pnl, 0.0);
    }

    #[test]
    fn unrealized_pnl_signs() {
        let mut long = Position::new("BTC");
        long.apply_trade(Side::Bid, 100.0, 2.0, 0.0);
        assert!(approx(long.unrealized_pnl(110.0), 20.0));

        let mut short = Position::new("BTC");
        short.apply_trade(Side::Ask, 100.0, 2.0, 0.0);
        assert!(approx(short.unrealized_pnl(110.0), -20.0));

        assert_eq!(Position::new("BTC").unrealized_pnl(110.0), 0.0);
    }
}
