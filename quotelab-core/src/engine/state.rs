//! Run lifecycle.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a run is in its lifecycle. `Stopped` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    Running,
    Liquidating,
    Stopped,
    Failed,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Stopped | RunState::Failed)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunState::Running => "RUNNING",
            RunState::Liquidating => "LIQUIDATING",
            RunState::Stopped => "STOPPED",
            RunState::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// Why a run reached `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StopReason {
    /// Every step was processed.
    EndOfData,
    /// The risk policy forced a liquidation.
    EmergencyExit,
    /// The risk policy ended the run without liquidating.
    SoftStop,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StopReason::EndOfData => "END_OF_DATA",
            StopReason::EmergencyExit => "EMERGENCY_EXIT",
            StopReason::SoftStop => "SOFT_STOP",
        };
        f.write_str(s)
    }
}
