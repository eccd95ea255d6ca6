//! Fan-out of quotes to the watches of each symbol.

use chrono::{Local, NaiveDateTime};
use futures::FutureExt;
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error};
use trigger_core::traits::{ConsumedStore, Notification, Notifier, TradingCalendar, WeekdayCalendar};
use trigger_core::types::{DoneReason, PositionBook, Quote, WatchState};

use crate::settings::{Clock, EngineSettings};
use crate::watch::{Evaluation, TickContext, Watch};

/// Counts of what one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub evaluated: usize,
    pub armed: usize,
    pub fired: usize,
    pub failed_deals: usize,
    pub stale: usize,
    pub deactivated: usize,
    pub errors: usize,
}

impl TickReport {
    fn record(&mut self, evaluation: Evaluation) {
        self.evaluated += 1;
        match evaluation {
            Evaluation::Armed => self.armed += 1,
            Evaluation::Fired { success: true } => self.fired += 1,
            Evaluation::Fired { success: false } => self.failed_deals += 1,
            Evaluation::StaleSkipped => self.stale += 1,
            Evaluation::Deactivated(_) => self.deactivated += 1,
            _ => {}
        }
    }

    pub fn merge(&mut self, other: TickReport) {
        self.evaluated += other.evaluated;
        self.armed += other.armed;
        self.fired += other.fired;
        self.failed_deals += other.failed_deals;
        self.stale += other.stale;
        self.deactivated += other.deactivated;
        self.errors += other.errors;
    }
}

/// Watch counts per lifecycle state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchSummary {
    pub watching: usize,
    pub armed: usize,
    pub done: usize,
}

/// All watches of a process, keyed by symbol.
///
/// A watch that errors or panics is logged, notified and forced done; its
/// siblings are always evaluated.
pub struct WatchSet {
    watches: HashMap<String, Vec<Watch>>,
    subscribed: HashSet<String>,
    pending: Vec<String>,
    calendar: Arc<dyn TradingCalendar>,
    store: Arc<dyn ConsumedStore>,
    notifier: Arc<dyn Notifier>,
    positions: PositionBook,
    settings: EngineSettings,
}

impl WatchSet {
    /// Create an empty set with a weekday calendar and default settings.
    pub fn new(store: Arc<dyn ConsumedStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            watches: HashMap::new(),
            subscribed: HashSet::new(),
            pending: Vec::new(),
            calendar: Arc::new(WeekdayCalendar::new()),
            store,
            notifier,
            positions: PositionBook::new(),
            settings: EngineSettings::default(),
        }
    }

    pub fn with_calendar(mut self, calendar: Arc<dyn TradingCalendar>) -> Self {
        self.calendar = calendar;
        self
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_positions(mut self, positions: PositionBook) -> Self {
        self.positions = positions;
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<dyn ConsumedStore> {
        &self.store
    }

    pub fn positions(&self) -> &PositionBook {
        &self.positions
    }

    /// Register a watch and subscribe its symbol.
    pub fn add(&mut self, watch: Watch) {
        let symbol = watch.symbol().to_string();
        self.subscribe(&symbol);
        self.watches.entry(symbol).or_default().push(watch);
    }

    /// Mark a symbol as needed from the feed. True only the first time.
    pub fn subscribe(&mut self, symbol: &str) -> bool {
        if !self.subscribed.insert(symbol.to_string()) {
            return false;
        }
        self.pending.push(symbol.to_string());
        true
    }

    /// Drain symbols not yet requested from the feed.
    pub fn pending_subscriptions(&mut self) -> Vec<String> {
        std::mem::take(&mut self.pending)
    }

    /// Tracked symbols, sorted.
    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.subscribed.iter().cloned().collect();
        symbols.sort();
        symbols
    }

    pub fn watches(&self, symbol: &str) -> &[Watch] {
        self.watches.get(symbol).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Watch> {
        self.watches.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.watches.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn active_count(&self) -> usize {
        self.iter().filter(|w| w.is_active()).count()
    }

    pub fn summary(&self) -> WatchSummary {
        let mut summary = WatchSummary::default();
        for watch in self.iter() {
            match watch.state() {
                WatchState::Watching => summary.watching += 1,
                WatchState::Armed => summary.armed += 1,
                WatchState::Done => summary.done += 1,
            }
        }
        summary
    }

    /// Evaluate a batch of quotes; "now" comes from the configured clock.
    pub async fn tick(&mut self, quotes: &HashMap<String, Quote>) -> TickReport {
        let mut report = TickReport::default();
        for quote in quotes.values() {
            let now = self.now_for(quote);
            report.merge(self.tick_one(quote, now).await);
        }
        report
    }

    /// Evaluate a batch of quotes at a fixed instant.
    pub async fn tick_at(&mut self, quotes: &HashMap<String, Quote>, now: NaiveDateTime) -> TickReport {
        let mut report = TickReport::default();
        for quote in quotes.values() {
            report.merge(self.tick_one(quote, now).await);
        }
        report
    }

    /// Evaluate one quote against every watch of its symbol.
    pub async fn tick_one(&mut self, quote: &Quote, now: NaiveDateTime) -> TickReport {
        let mut report = TickReport::default();
        let Some(watches) = self.watches.get_mut(&quote.symbol) else {
            debug!(symbol = %quote.symbol, "Quote for untracked symbol");
            return report;
        };

        for watch in watches.iter_mut() {
            let mut ctx = TickContext {
                now,
                calendar: self.calendar.as_ref(),
                store: self.store.as_ref(),
                notifier: self.notifier.as_ref(),
                positions: &mut self.positions,
                settings: &self.settings,
            };

            let outcome = AssertUnwindSafe(watch.on_quote(quote, &mut ctx))
                .catch_unwind()
                .await;

            match outcome {
                Ok(Ok(evaluation)) => report.record(evaluation),
                Ok(Err(e)) => {
                    report.errors += 1;
                    isolate(watch, self.notifier.as_ref(), e.to_string());
                }
                Err(payload) => {
                    report.errors += 1;
                    isolate(watch, self.notifier.as_ref(), panic_message(payload.as_ref()));
                }
            }
        }

        report
    }

    /// "Now" for a quote under the configured clock.
    pub fn now_for(&self, quote: &Quote) -> NaiveDateTime {
        match self.settings.clock {
            Clock::Wall => Local::now().naive_local(),
            Clock::QuoteTimestamp => quote.timestamp,
        }
    }
}

fn isolate(watch: &mut Watch, notifier: &dyn Notifier, message: String) {
    error!(symbol = %watch.symbol(), error = %message, "Watch evaluation failed");
    watch.force_done(DoneReason::EvaluationFailed);
    notifier.notify(&Notification::EvaluationFailed {
        symbol: watch.symbol().to_string(),
        error: message,
    });
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panic: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panic: {message}")
    } else {
        "panic".to_string()
    }
}
