//! Data sources for the trigger engine.
//!
//! Rule records, holdings and replay quotes come from CSV files; consumed rules are
//! kept in a keyed store so a restart never re-arms a rule that fired.

mod holding_source;
mod quote_source;
mod rule_source;
mod store;

pub use holding_source::{load_holdings, load_holdings_from_reader, HoldingRecord};
pub use quote_source::QuoteReplaySource;
pub use rule_source::{LoadedRules, RuleRecord, RuleSource};
pub use store::{ConsumedEntry, JsonlConsumedStore, MemoryConsumedStore};

use std::path::Path;
use trigger_core::error::DataError;

/// Load rule records from a CSV file.
pub fn load_rules(path: impl AsRef<Path>) -> Result<LoadedRules, DataError> {
    RuleSource::new(path)?.load_all()
}
