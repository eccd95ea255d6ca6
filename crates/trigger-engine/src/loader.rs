//! Rule records to watches.

use tracing::{info, warn};
use trigger_core::error::{ParseError, StoreError, TriggerError};
use trigger_core::traits::SinkRegistry;
use trigger_core::types::Instrument;
use trigger_data::{LoadedRules, RuleRecord};

use crate::threshold::{BaseSpec, BounceSpec};
use crate::watch::Watch;
use crate::watch_set::WatchSet;
use crate::window::WatchWindow;

/// Outcome of loading a rule file into a watch set.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: usize,
    pub skipped_consumed: usize,
    /// `(line, reason)` for every row that could not become a watch
    pub rejected: Vec<(u64, String)>,
}

/// Parse a bool-like cell: `1/0`, `true/false`, `yes/no`, `y/n`.
pub fn parse_bool_like(text: &str) -> Result<bool, ParseError> {
    match text.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" => Ok(true),
        "0" | "false" | "no" | "n" => Ok(false),
        _ => Err(ParseError::InvalidBool(text.trim().to_string())),
    }
}

/// Build a watch from a rule record, resolving its sink by backend tag.
pub fn build_watch(record: &RuleRecord, sinks: &SinkRegistry) -> Result<Watch, TriggerError> {
    let (market, backend) = Instrument::parse_market_tag(&record.market)?;

    let mut instrument = Instrument::new(record.code.trim(), market).with_backend(backend);
    if !record.name.trim().is_empty() {
        instrument = instrument.with_name(record.name.trim());
    }
    if let Some(lot_size) = record.lot_size {
        instrument = instrument.with_lot_size(lot_size);
    }

    let base: BaseSpec = record.base.parse()?;
    let break_upward = parse_bool_like(&record.break_upward)?;
    let bounce: BounceSpec = record.bounce.parse()?;
    if record.trade_quantity == 0 {
        return Err(ParseError::InvalidRecord("trade_quantity must be non-zero".to_string()).into());
    }
    let window = WatchWindow::parse(
        &record.valid_from,
        &record.valid_until_time,
        &record.valid_until_date,
    )?;

    let sink = sinks
        .resolve(backend)
        .ok_or_else(|| TriggerError::Config(format!("no trade sink registered for backend {backend}")))?;

    Ok(Watch::new(instrument, base, break_upward, bounce, record.trade_quantity, sink)
        .with_window(window)
        .with_origin(record.key(), record.raw.clone()))
}

/// Add every usable, not yet consumed rule to the set.
///
/// Bad rows are reported and skipped; only a failing consumed store aborts.
pub fn load_watches(
    rules: &LoadedRules,
    sinks: &SinkRegistry,
    set: &mut WatchSet,
) -> Result<LoadReport, StoreError> {
    let mut report = LoadReport::default();

    for error in &rules.rejected {
        let line = match error {
            trigger_core::error::DataError::Record { line, .. } => *line,
            _ => 0,
        };
        report.rejected.push((line, error.to_string()));
    }

    for record in &rules.records {
        let key = record.key();
        if set.store().is_consumed(&key)? {
            info!(line = record.line, code = %record.code, "Rule already consumed, skipping");
            report.skipped_consumed += 1;
            continue;
        }

        match build_watch(record, sinks) {
            Ok(watch) => {
                set.add(watch);
                report.loaded += 1;
            }
            Err(e) => {
                warn!(line = record.line, code = %record.code, error = %e, "Rejecting rule");
                report.rejected.push((record.line, e.to_string()));
            }
        }
    }

    info!(
        loaded = report.loaded,
        consumed = report.skipped_consumed,
        rejected = report.rejected.len(),
        "Rules loaded"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watch::tests::ScriptedSink;
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use trigger_core::traits::{ConsumedStore, RecordingNotifier, TradeSink};
    use trigger_core::types::{ExecutionBackend, Market};
    use trigger_data::{MemoryConsumedStore, RuleSource};

    const RULES: &str = "\
id,code,name,market,base,break_upward,bounce,trade_quantity,valid_from,valid_until_time,valid_until_date,lot_size
r1,600000,PF Bank,sh,10.5,yes,0.1,500,09:30:00,14:55:00,2099-12-31,
r2,00700,Tencent,hk@paper,-1.5%~-0.5%,n,0.3%,-200,09:30:00,15:55:00,2099-12-31,200
r3,AAPL,Apple,us,1%,1,0.5%,10,21:30:00,23:59:59,2099-12-31,
r4,000001,Bad,sz,0.5%~-1%,1,0.1,100,09:30:00,14:55:00,2099-12-31,
";

    fn registry() -> SinkRegistry {
        let sink: Arc<dyn TradeSink> = ScriptedSink::ok();
        SinkRegistry::new()
            .with(ExecutionBackend::Desktop, sink.clone())
            .with(ExecutionBackend::Paper, sink)
    }

    #[test]
    fn test_parse_bool_like() {
        for yes in ["1", "true", "TRUE", "yes", "Y", " y "] {
            assert!(parse_bool_like(yes).unwrap());
        }
        for no in ["0", "false", "No", "n"] {
            assert!(!parse_bool_like(no).unwrap());
        }
        assert!(parse_bool_like("maybe").is_err());
    }

    #[test]
    fn test_build_watch_from_record() {
        let loaded = RuleSource::load_from_reader(RULES.as_bytes()).unwrap();
        let watch = build_watch(&loaded.records[1], &registry()).unwrap();

        assert_eq!(watch.instrument().market, Market::HongKong);
        assert_eq!(watch.instrument().backend, ExecutionBackend::Paper);
        assert_eq!(watch.instrument().lot_size, 200);
        assert_eq!(watch.instrument().name, "Tencent");
        assert!(!watch.break_upward());
        assert!(!watch.base_resolved());
        assert_eq!(watch.base_lower(), dec!(-0.015));
        assert_eq!(watch.bounce(), BounceSpec::Percent(dec!(0.003)));
        assert_eq!(watch.trade_quantity(), -200);
        assert_eq!(watch.origin().unwrap().id, "r2");
    }

    #[test]
    fn test_missing_sink_rejected() {
        let loaded = RuleSource::load_from_reader(RULES.as_bytes()).unwrap();
        // "us" defaults to the streaming backend, which is not registered
        let err = build_watch(&loaded.records[2], &registry()).unwrap_err();
        assert!(matches!(err, TriggerError::Config(_)));
    }

    #[test]
    fn test_load_skips_consumed_and_bad_rows() {
        let loaded = RuleSource::load_from_reader(RULES.as_bytes()).unwrap();
        let store = Arc::new(MemoryConsumedStore::new());
        store.mark_consumed("r1", "r1,600000").unwrap();

        let mut set = crate::WatchSet::new(store, Arc::new(RecordingNotifier::new()));
        let report = load_watches(&loaded, &registry(), &mut set).unwrap();

        assert_eq!(report.loaded, 1);
        assert_eq!(report.skipped_consumed, 1);
        assert_eq!(report.rejected.len(), 2);
        assert!(report.rejected.iter().any(|(line, _)| *line == 5));
        assert_eq!(set.symbols(), vec!["00700".to_string()]);
    }
}
