//! Portfolio update: books a step's fills.

use crate::domain::{Fill, Portfolio};
use tracing::debug;

/// Apply `fills` in order. Returns the realized PnL they produced, fees excluded.
///
/// Buys pay notional plus fee, sells receive notional minus fee; the
/// position is updated at weighted-average cost.
pub fn apply_fills(fills: &[Fill], portfolio: &mut Portfolio) -> f64 {
    let mut realized = 0.0;
    for fill in fills {
        realized += portfolio.apply_fill(fill);
        debug!(
            symbol = %fill.symbol,
            side = %fill.side,
            price = fill.price,
            size = fill.size,
            fee = fill.fee,
            step = fill.step,
            "fill"
        );
    }
    realized
}

/// Net cash movement of `fills`.
pub fn cash_flow(fills: &[Fill]) -> f64 {
    fills.iter().map(Fill::cash_delta).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Liquidity, Side};
    use chrono::{TimeZone, Utc};

    fn fill(side: Side, price: f64, size: f64, fee: f64) -> Fill {
        Fill {
            order_id: None,
            symbol: "BTC".into(),
            side,
            price,
            size,
            fee,
            liquidity: Liquidity::Maker,
            step: 0,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn buy_fill(price: f64, size: f64, fee: f64) -> Fill {
        fill(Side::Bid, price, size, fee)
    }

    fn sell_fill(price: f64, size: f64, fee: f64) -> Fill {
        fill(Side::Ask, price, size, fee)
    }

    #[test]
    fn buy_deducts_notional_and_fee() {
        let mut portfolio = Portfolio::new(10_000.0);
        apply_fills(&[buy_fill(100.0, 10.0, 1.0)], &mut portfolio);
        assert_eq!(portfolio.cash, 10_000.0 - 1_000.0 - 1.0);
        assert_eq!(portfolio.quantity("BTC"), 10.0);
        assert_eq!(portfolio.maker_fees, 1.0);
    }

    #[test]
    fn round_trip_realizes_pnl() {
        let mut portfolio = Portfolio::new(10_000.0);
        let fills = [buy_fill(100.0, 10.0, 0.5), sell_fill(110.0, 10.0, 0.5)];
        let realized = apply_fills(&fills, &mut portfolio);
        assert_eq!(realized, 100.0);
        assert_eq!(portfolio.quantity("BTC"), 0.0);
        assert_eq!(portfolio.cash, 10_000.0 + 100.0 - 1.0);
        // flat positions keep their history
        assert_eq!(portfolio.position("BTC").unwrap().realized_pnl, 100.0);
    }

    #[test]
    fn cash_moves_by_cash_flow() {
        let mut portfolio = Portfolio::new(5_000.0);
        let fills = [
            buy_fill(50.0, 3.0, 0.1),
            sell_fill(52.0, 5.0, 0.2),
            buy_fill(49.0, 1.0, 0.05),
        ];
        let before = portfolio.cash;
        apply_fills(&fills, &mut portfolio);
        assert!((portfolio.cash - (before + cash_flow(&fills))).abs() < 1e-9);
        assert_eq!(portfolio.quantity("BTC"), -1.0);
    }
}
