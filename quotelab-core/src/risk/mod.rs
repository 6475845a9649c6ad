//! Risk policy: per-order validation, emergency exit, soft continuation.
//!
//! The engine calls a policy at three points. Before fills, every candidate
//! order goes through `validate_single_order` against metrics valued at the
//! bar open. After the portfolio update, metrics valued at the close go to
//! `check_emergency_exit` and, only if that returns false, to
//! `continue_simulation`. Policies only read `RiskMetrics`; they never touch
//! the portfolio.

pub mod basic;
pub mod metrics;
pub mod permissive;

pub use basic::{BasicRiskPolicy, RiskLimits};
pub use metrics::{RiskMetrics, SymbolRiskMetrics};
pub use permissive::PermissiveRiskPolicy;

use crate::domain::Order;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a single order was refused. Recoverable: the order is dropped and the
/// step goes on.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectReason {
    #[error("malformed order (price {price}, size {size})")]
    Malformed { price: f64, size: f64 },

    #[error("no margin available (share {margin_share})")]
    NoMargin { margin_share: f64 },

    #[error("notional {notional} below minimum {minimum}")]
    BelowMinimumNotional { notional: f64, minimum: f64 },

    #[error("price {price} deviates more than {max_deviation} from {reference}")]
    PriceOutOfBand {
        price: f64,
        reference: f64,
        max_deviation: f64,
    },

    #[error("leverage {leverage} after fill exceeds ceiling {ceiling}")]
    LeverageCeiling { leverage: f64, ceiling: f64 },
}

/// Risk rules shared by every symbol of a run.
pub trait RiskPolicy: Send + Sync {
    fn name(&self) -> &str;

    /// Accept or reject one candidate order priced against `current_price`.
    fn validate_single_order(
        &self,
        order: &Order,
        current_price: f64,
        metrics: &RiskMetrics,
        symbol_count: usize,
    ) -> Result<(), RejectReason>;

    /// Hard stop: liquidate everything at mark and halt.
    fn check_emergency_exit(&self, metrics: &RiskMetrics, symbol_count: usize) -> bool;

    /// Soft stop: `false` ends the run, open positions stay marked to market.
    fn continue_simulation(&self, metrics: &RiskMetrics, initial_margin: f64) -> bool;

    /// Largest absolute notional the policy lets `symbol` hold, if bounded.
    fn position_limit(&self, _symbol: &str, _metrics: &RiskMetrics, _symbol_count: usize) -> Option<f64> {
        None
    }
}

/// Shared well-formedness gate every policy applies first.
pub(crate) fn check_well_formed(order: &Order) -> Result<(), RejectReason> {
    if order.is_well_formed() {
        Ok(())
    } else {
        Err(RejectReason::Malformed {
            price: order.price(),
            size: order.size(),
        })
    }
}
