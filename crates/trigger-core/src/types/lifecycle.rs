//! Watch lifecycle states.

use serde::{Deserialize, Serialize};
use std::fmt;

/// State of a condition order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchState {
    /// Waiting for the breakout
    Watching,
    /// Broke out; tracking the extreme for a retracement
    Armed,
    /// Terminal: fired or invalidated
    Done,
}

impl WatchState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WatchState::Done)
    }
}

impl fmt::Display for WatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchState::Watching => write!(f, "WATCHING"),
            WatchState::Armed => write!(f, "ARMED"),
            WatchState::Done => write!(f, "DONE"),
        }
    }
}

/// Why a watch reached `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoneReason {
    /// The trade was dispatched (whatever the outcome)
    Fired,
    /// Domestic market closed today
    NonTradingDay,
    /// Past the daily time window
    WindowClosed,
    /// Past the expiry date
    Expired,
    /// Price was already beyond the resolved percentage band
    MissedEntry,
    /// Evaluation failed and the watch was shut down
    EvaluationFailed,
}

impl fmt::Display for DoneReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DoneReason::Fired => "fired",
            DoneReason::NonTradingDay => "non-trading day",
            DoneReason::WindowClosed => "time window closed",
            DoneReason::Expired => "expired",
            DoneReason::MissedEntry => "entry window missed",
            DoneReason::EvaluationFailed => "evaluation failed",
        };
        f.write_str(text)
    }
}
