//! Execution: turns resting limit orders into fills against one OHLC bar.
//!
//! Orders rest for exactly one step. A bid fills when the bar trades down to
//! it, an ask when the bar trades up to it; price improvement at the open is
//! passed on. There are no partial fills. Which sides may fill inside an
//! ambiguous bar is decided by the `IntrabarPolicy`.

pub mod fill_engine;
pub mod intrabar;

pub use fill_engine::{FeeSchedule, FillEngine, FillEngineInvariantError};
pub use intrabar::IntrabarPolicy;
