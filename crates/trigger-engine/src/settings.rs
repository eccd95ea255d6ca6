//! Engine tunables.

use chrono::NaiveTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Where "now" comes from when evaluating quotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Clock {
    /// Local wall clock
    #[default]
    Wall,
    /// The quote's own timestamp (replays)
    QuoteTimestamp,
}

/// Settings shared by every watch in a set.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    /// Signals measured on the previous close are stale after this time
    pub stale_cutoff: NaiveTime,
    /// A retracement larger than `multiplier * expected` is stale
    pub stale_multiplier: Decimal,
    /// Upper bound on a single `TradeSink::deal` call
    pub deal_timeout: Duration,
    pub clock: Clock,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            stale_cutoff: NaiveTime::from_hms_opt(9, 32, 0).unwrap_or(NaiveTime::MIN),
            stale_multiplier: Decimal::from(3),
            deal_timeout: Duration::from_secs(30),
            clock: Clock::Wall,
        }
    }
}

impl EngineSettings {
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_deal_timeout(mut self, timeout: Duration) -> Self {
        self.deal_timeout = timeout;
        self
    }
}
