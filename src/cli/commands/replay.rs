//! Replay command implementation.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{info, warn};
use trigger_broker::{PaperFill, PaperSink};
use trigger_config::AppConfig;
use trigger_core::traits::{ConsumedStore, TradeSink};
use trigger_core::types::{Instrument, PositionBook, Quote};
use trigger_data::{
    load_holdings, load_rules, HoldingRecord, JsonlConsumedStore, MemoryConsumedStore,
    QuoteReplaySource,
};
use trigger_engine::{load_watches, Clock, QuoteRouter, StopRule, TickReport, WatchSet};
use trigger_monitor::TracingNotifier;

use super::single_sink_registry;
use crate::cli::ReplayArgs;

/// What a replay did, for printing.
#[derive(Debug, Serialize)]
struct ReplaySummary {
    quotes: usize,
    rules_loaded: usize,
    rules_consumed: usize,
    rules_rejected: usize,
    stop_watches: usize,
    /// Per-evaluation counts; not collected in push mode
    ticks: Option<TickCounts>,
    watching: usize,
    armed: usize,
    done: usize,
    cash: Decimal,
    equity: Decimal,
    fills: Vec<PaperFill>,
}

#[derive(Debug, Serialize)]
struct TickCounts {
    evaluated: usize,
    armed: usize,
    fired: usize,
    failed_deals: usize,
    stale: usize,
    deactivated: usize,
    errors: usize,
}

impl From<TickReport> for TickCounts {
    fn from(report: TickReport) -> Self {
        Self {
            evaluated: report.evaluated,
            armed: report.armed,
            fired: report.fired,
            failed_deals: report.failed_deals,
            stale: report.stale,
            deactivated: report.deactivated,
            errors: report.errors,
        }
    }
}

impl ReplaySummary {
    fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Replay Summary");
        let _ = writeln!(out, "==============");
        let _ = writeln!(out, "Quotes replayed:  {}", self.quotes);
        let _ = writeln!(
            out,
            "Rules:            {} loaded, {} already consumed, {} rejected",
            self.rules_loaded, self.rules_consumed, self.rules_rejected
        );
        let _ = writeln!(out, "Stop watches:     {}", self.stop_watches);
        if let Some(ticks) = &self.ticks {
            let _ = writeln!(
                out,
                "Evaluations:      {} ({} armed, {} fired, {} failed, {} stale, {} deactivated, {} errors)",
                ticks.evaluated,
                ticks.armed,
                ticks.fired,
                ticks.failed_deals,
                ticks.stale,
                ticks.deactivated,
                ticks.errors
            );
        }
        let _ = writeln!(
            out,
            "Watches:          {} watching, {} armed, {} done",
            self.watching, self.armed, self.done
        );
        let _ = writeln!(out, "Cash:             {}", self.cash.round_dp(2));
        let _ = writeln!(out, "Equity:           {}", self.equity.round_dp(2));

        if !self.fills.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "Fills");
            let _ = writeln!(out, "-----");
            for fill in &self.fills {
                let _ = writeln!(
                    out,
                    "{}  {:<8} {:>8} @ {}",
                    fill.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    fill.symbol,
                    fill.quantity,
                    fill.price.round_dp(4)
                );
            }
        }
        out
    }
}

pub async fn run(args: ReplayArgs, config: &AppConfig) -> Result<()> {
    let mut settings = config.engine.to_settings().context("Invalid engine settings")?;
    // Replays evaluate at the recorded time
    settings.clock = Clock::QuoteTimestamp;

    let holdings = match args.holdings.as_ref().or(config.paths.holdings.as_ref()) {
        Some(path) => load_holdings(path)
            .with_context(|| format!("Failed to load holdings from {}", path.display()))?,
        None => Vec::new(),
    };

    let cash = args.cash.unwrap_or(config.paper.initial_cash);
    let paper = Arc::new(
        PaperSink::new(cash)
            .with_slippage(config.paper.slippage_pct)
            .with_holdings(holdings.iter().map(HoldingRecord::holding)),
    );
    let sink: Arc<dyn TradeSink> = paper.clone();
    let registry = single_sink_registry(sink.clone());

    let store: Arc<dyn ConsumedStore> = if args.no_persist {
        Arc::new(MemoryConsumedStore::new())
    } else {
        let path = &config.paths.consumed_store;
        Arc::new(
            JsonlConsumedStore::open(path)
                .with_context(|| format!("Failed to open consumed-rule store {}", path.display()))?,
        )
    };

    let mut set = WatchSet::new(store, Arc::new(TracingNotifier::new()))
        .with_calendar(Arc::new(config.calendar.calendar()))
        .with_settings(settings)
        .with_positions(PositionBook::from_holdings(holdings.iter().map(HoldingRecord::holding)));

    let rules_path = args.rules.as_ref().unwrap_or(&config.paths.rules);
    let rules = load_rules(rules_path)
        .with_context(|| format!("Failed to load rules from {}", rules_path.display()))?;
    let load = load_watches(&rules, &registry, &mut set).context("Failed to read consumed-rule store")?;
    for (line, reason) in &load.rejected {
        warn!(line, %reason, "Rule rejected");
    }

    let stop_watches = add_stop_watches(&mut set, &holdings, &config.stops.rules(), &sink)?;

    let quotes = QuoteReplaySource::new(&args.quotes)
        .and_then(|source| source.load_all())
        .with_context(|| format!("Failed to load quotes from {}", args.quotes.display()))?;

    info!(quotes = quotes.len(), watches = set.len(), push = args.push, "Starting replay");

    let (set, ticks) = if args.push {
        (replay_push(set, &quotes, config.engine.channel_capacity).await?, None)
    } else {
        let (set, report) = replay_batches(set, &quotes).await;
        (set, Some(TickCounts::from(report)))
    };

    paper.update_marks(&last_prices(&quotes));
    let account = paper.snapshot();
    let states = set.summary();

    let summary = ReplaySummary {
        quotes: quotes.len(),
        rules_loaded: load.loaded,
        rules_consumed: load.skipped_consumed,
        rules_rejected: load.rejected.len(),
        stop_watches,
        ticks,
        watching: states.watching,
        armed: states.armed,
        done: states.done,
        cash: account.cash,
        equity: account.equity(),
        fills: account.fills,
    };

    match args.output.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&summary)?),
        _ => println!("{}", summary.render()),
    }

    Ok(())
}

/// Add configured stop watches for every holding.
fn add_stop_watches(
    set: &mut WatchSet,
    holdings: &[HoldingRecord],
    rules: &[StopRule],
    sink: &Arc<dyn TradeSink>,
) -> Result<usize> {
    let mut added = 0;
    for record in holdings {
        let (market, backend) = Instrument::parse_market_tag(&record.market)
            .with_context(|| format!("Holding {} has an invalid market", record.code))?;
        let instrument = Instrument::new(record.code.clone(), market).with_backend(backend);
        let holding = record.holding();

        for rule in rules {
            if let Some(watch) = rule.build(instrument.clone(), &holding, sink.clone()) {
                info!(symbol = %record.code, ?rule, base = %watch.base_lower(), "Stop watch added");
                set.add(watch);
                added += 1;
            }
        }
    }
    Ok(added)
}

/// Tick quotes in batches sharing a timestamp, like a periodic scheduler.
async fn replay_batches(mut set: WatchSet, quotes: &[Quote]) -> (WatchSet, TickReport) {
    let mut report = TickReport::default();
    let mut batch: HashMap<String, Quote> = HashMap::new();
    let mut batch_time = None;

    for quote in quotes {
        if batch_time != Some(quote.timestamp) || batch.contains_key(&quote.symbol) {
            if !batch.is_empty() {
                report.merge(set.tick(&batch).await);
                batch.clear();
            }
            batch_time = Some(quote.timestamp);
        }
        batch.insert(quote.symbol.clone(), quote.clone());
    }
    if !batch.is_empty() {
        report.merge(set.tick(&batch).await);
    }

    (set, report)
}

/// Push quotes through per-symbol channels, as a streaming feed would.
async fn replay_push(set: WatchSet, quotes: &[Quote], capacity: usize) -> Result<WatchSet> {
    let mut router = QuoteRouter::new(set, capacity);
    let senders: HashMap<_, _> = router
        .symbols()
        .into_iter()
        .map(|symbol| {
            let sender = router.sender(&symbol);
            (symbol, sender)
        })
        .collect();

    let consumer = tokio::spawn(router.run());

    for quote in quotes {
        if let Some(sender) = senders.get(&quote.symbol) {
            sender
                .send(quote.clone())
                .await
                .context("Quote router stopped early")?;
        }
    }
    drop(senders);

    consumer.await.context("Quote router task failed")
}

fn last_prices(quotes: &[Quote]) -> HashMap<String, Decimal> {
    quotes
        .iter()
        .filter(|q| q.has_price())
        .map(|q| (q.symbol.clone(), q.price))
        .collect()
}
