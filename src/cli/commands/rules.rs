//! Rules command implementation.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use std::sync::Arc;
use trigger_broker::PaperSink;
use trigger_config::AppConfig;
use trigger_core::traits::ConsumedStore;
use trigger_data::{load_rules, JsonlConsumedStore};
use trigger_engine::{build_watch, parse_bool_like};

use super::single_sink_registry;
use crate::cli::RulesArgs;

pub async fn run(args: RulesArgs, config: &AppConfig) -> Result<()> {
    let path = args.rules.as_ref().unwrap_or(&config.paths.rules);
    let rules = load_rules(path).with_context(|| format!("Failed to load rules from {}", path.display()))?;

    let store_path = &config.paths.consumed_store;
    let store = JsonlConsumedStore::open(store_path)
        .with_context(|| format!("Failed to open consumed-rule store {}", store_path.display()))?;

    // Only used to check that each rule builds
    let registry = single_sink_registry(Arc::new(PaperSink::new(Decimal::ZERO)));

    println!("Rules in {}", path.display());
    println!();
    println!(
        "{:<6} {:<10} {:<14} {:<14} {:<5} {:<8} {:>8}  {:<28} STATUS",
        "LINE", "CODE", "MARKET", "BASE", "DIR", "BOUNCE", "QTY", "WINDOW"
    );

    let mut active = 0;
    let mut consumed = 0;
    let mut invalid = 0;

    for record in &rules.records {
        let status = if store.is_consumed(&record.key())? {
            consumed += 1;
            "consumed".to_string()
        } else {
            match build_watch(record, &registry) {
                Ok(_) => {
                    active += 1;
                    "active".to_string()
                }
                Err(e) => {
                    invalid += 1;
                    format!("invalid: {e}")
                }
            }
        };

        let direction = match parse_bool_like(&record.break_upward) {
            Ok(true) => "up",
            Ok(false) => "down",
            Err(_) => "?",
        };

        println!(
            "{:<6} {:<10} {:<14} {:<14} {:<5} {:<8} {:>8}  {:<28} {}",
            record.line,
            record.code,
            record.market,
            record.base,
            direction,
            record.bounce,
            record.trade_quantity,
            format!(
                "{}-{} until {}",
                record.valid_from, record.valid_until_time, record.valid_until_date
            ),
            status
        );
    }

    for error in &rules.rejected {
        invalid += 1;
        println!("{error}");
    }

    println!();
    println!("{active} active, {consumed} consumed, {invalid} invalid");

    Ok(())
}
