use super::{check_well_formed, RejectReason, RiskMetrics, RiskPolicy};
use crate::domain::Order;

/// Accepts every well-formed order and never stops a run.
///
/// Useful as a baseline and for isolating strategy or fill behavior from risk rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissiveRiskPolicy;

impl RiskPolicy for PermissiveRiskPolicy {
    fn name(&self) -> &str {
        "permissive"
    }

    fn validate_single_order(
        &self,
        order: &Order,
        _current_price: f64,
        _metrics: &RiskMetrics,
        _symbol_count: usize,
    ) -> Result<(), RejectReason> {
        check_well_formed(order)
    }

    fn check_emergency_exit(&self, _metrics: &RiskMetrics, _symbol_count: usize) -> bool {
        false
    }

    fn continue_simulation(&self, _metrics: &RiskMetrics, _initial_margin: f64) -> bool {
        true
    }
}
