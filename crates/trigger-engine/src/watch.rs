//! The condition-order state machine.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use trigger_core::error::{DealError, WatchError};
use trigger_core::traits::{ConsumedStore, Notification, Notifier, TradeSink, TradingCalendar};
use trigger_core::types::{DoneReason, Instrument, PositionBook, PriceBasis, Quote, WatchState};

use crate::settings::EngineSettings;
use crate::threshold::{BaseSpec, BounceSpec};
use crate::window::WatchWindow;

/// Source record a watch was built from, marked consumed when it fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleOrigin {
    pub id: String,
    pub raw: String,
}

/// Collaborators a watch needs while evaluating one quote.
pub struct TickContext<'a> {
    /// Exchange-local "now"
    pub now: NaiveDateTime,
    pub calendar: &'a dyn TradingCalendar,
    pub store: &'a dyn ConsumedStore,
    pub notifier: &'a dyn Notifier,
    pub positions: &'a mut PositionBook,
    pub settings: &'a EngineSettings,
}

/// What a single evaluation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evaluation {
    /// Already done; nothing happens
    Inactive,
    /// Zero or negative price; wait for the next quote
    NoPrice,
    /// Before today's window opens
    NotYetOpen,
    /// Percentage base still waiting for a previous close
    AwaitingPrevClose,
    /// Shut down without firing
    Deactivated(DoneReason),
    /// No breakout yet
    Watching,
    /// Broke out on this quote
    Armed,
    /// Armed, retracement not reached yet
    Tracking,
    /// Retracement reached but the signal was stale; still armed
    StaleSkipped,
    /// Trade dispatched
    Fired { success: bool },
}

/// A condition order for one instrument.
///
/// Lifecycle: `Watching` → (breakout) → `Armed` → (retracement) → `Done`.
/// Window expiry, non-trading days and a missed percentage entry also lead
/// to `Done`. Once done, nothing but logging happens again.
pub struct Watch {
    instrument: Instrument,
    // Fractions until a percentage base is resolved, prices afterwards
    base_lower: Decimal,
    base_upper: Decimal,
    base_is_percent: bool,
    base_resolved: bool,
    break_upward: bool,
    bounce: BounceSpec,
    trade_quantity: i64,
    window: WatchWindow,
    state: WatchState,
    done_reason: Option<DoneReason>,
    extreme: Option<Decimal>,
    origin: Option<RuleOrigin>,
    sink: Arc<dyn TradeSink>,
}

impl Watch {
    /// Create a watch with an all-day, never-expiring window.
    pub fn new(
        instrument: Instrument,
        base: BaseSpec,
        break_upward: bool,
        bounce: BounceSpec,
        trade_quantity: i64,
        sink: Arc<dyn TradeSink>,
    ) -> Self {
        let (base_lower, base_upper, base_is_percent) = match base {
            BaseSpec::Absolute(price) => (price, price, false),
            BaseSpec::Percent { low, high } => (low, high, true),
        };

        Self {
            instrument,
            base_lower,
            base_upper,
            base_is_percent,
            base_resolved: !base_is_percent,
            break_upward,
            bounce,
            trade_quantity,
            window: WatchWindow::all_day(),
            state: WatchState::Watching,
            done_reason: None,
            extreme: None,
            origin: None,
            sink,
        }
    }

    pub fn with_window(mut self, window: WatchWindow) -> Self {
        self.window = window;
        self
    }

    /// Attach the source record to mark consumed on a successful fire.
    pub fn with_origin(mut self, id: impl Into<String>, raw: impl Into<String>) -> Self {
        self.origin = Some(RuleOrigin {
            id: id.into(),
            raw: raw.into(),
        });
        self
    }

    pub fn instrument(&self) -> &Instrument {
        &self.instrument
    }

    pub fn symbol(&self) -> &str {
        &self.instrument.symbol
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        !self.state.is_terminal()
    }

    pub fn done_reason(&self) -> Option<DoneReason> {
        self.done_reason
    }

    /// Running extreme since arming; `None` before arming.
    pub fn extreme(&self) -> Option<Decimal> {
        self.extreme
    }

    pub fn base_lower(&self) -> Decimal {
        self.base_lower
    }

    pub fn base_upper(&self) -> Decimal {
        self.base_upper
    }

    pub fn base_resolved(&self) -> bool {
        self.base_resolved
    }

    pub fn break_upward(&self) -> bool {
        self.break_upward
    }

    pub fn bounce(&self) -> BounceSpec {
        self.bounce
    }

    pub fn trade_quantity(&self) -> i64 {
        self.trade_quantity
    }

    pub fn window(&self) -> &WatchWindow {
        &self.window
    }

    pub fn origin(&self) -> Option<&RuleOrigin> {
        self.origin.as_ref()
    }

    pub fn sink_name(&self) -> &str {
        self.sink.name()
    }

    /// Resolve a percentage base against the previous close.
    ///
    /// Happens at most once; later calls (with any close) change nothing.
    /// Returns whether this call resolved the base.
    pub fn resolve_base(&mut self, prev_close: Decimal) -> Result<bool, WatchError> {
        if self.base_resolved || self.state.is_terminal() || prev_close <= Decimal::ZERO {
            return Ok(false);
        }

        let lower = prev_close
            .checked_mul(Decimal::ONE + self.base_lower)
            .ok_or(WatchError::Overflow("base_lower"))?;
        let upper = prev_close
            .checked_mul(Decimal::ONE + self.base_upper)
            .ok_or(WatchError::Overflow("base_upper"))?;

        self.base_lower = lower;
        self.base_upper = upper;
        self.base_resolved = true;

        debug!(symbol = %self.instrument.symbol, %prev_close, %lower, %upper, "Percentage base resolved");
        Ok(true)
    }

    /// Shut the watch down. No-op when already done.
    pub fn force_done(&mut self, reason: DoneReason) {
        if self.state.is_terminal() {
            return;
        }
        self.state = WatchState::Done;
        self.done_reason = Some(reason);
    }

    /// Evaluate one quote.
    pub async fn on_quote(
        &mut self,
        quote: &Quote,
        ctx: &mut TickContext<'_>,
    ) -> Result<Evaluation, WatchError> {
        if self.state.is_terminal() {
            return Ok(Evaluation::Inactive);
        }
        if !quote.has_price() {
            return Ok(Evaluation::NoPrice);
        }

        let now = ctx.now;
        if !self.instrument.is_foreign() && !ctx.calendar.is_trading_day(now.date()) {
            return Ok(self.deactivate(DoneReason::NonTradingDay, ctx));
        }
        if self.window.not_yet_open(now) {
            return Ok(Evaluation::NotYetOpen);
        }
        if self.window.closed_for_today(now) {
            return Ok(self.deactivate(DoneReason::WindowClosed, ctx));
        }
        if self.window.expired(now) {
            return Ok(self.deactivate(DoneReason::Expired, ctx));
        }

        if !self.base_resolved {
            match quote.prev_close {
                Some(prev_close) if prev_close > Decimal::ZERO => {
                    self.resolve_base(prev_close)?;
                    if quote.price > self.base_upper {
                        return Ok(self.deactivate(DoneReason::MissedEntry, ctx));
                    }
                }
                _ => return Ok(Evaluation::AwaitingPrevClose),
            }
        }

        match self.state {
            WatchState::Watching => Ok(self.try_arm(quote, ctx)),
            WatchState::Armed => self.track(quote, ctx).await,
            WatchState::Done => Ok(Evaluation::Inactive),
        }
    }

    fn try_arm(&mut self, quote: &Quote, ctx: &mut TickContext<'_>) -> Evaluation {
        let broke_out = if self.break_upward {
            quote.price >= self.base_lower
        } else {
            quote.price <= self.base_lower
        };
        if !broke_out {
            return Evaluation::Watching;
        }

        // The extreme is sampled from the next quote on; no bounce test now.
        self.state = WatchState::Armed;
        self.extreme = Some(quote.price);

        info!(symbol = %self.instrument.symbol, price = %quote.price, base = %self.base_lower, "First breakout, watch armed");
        ctx.notifier.notify(&Notification::Armed {
            symbol: self.instrument.symbol.clone(),
            price: quote.price,
            base: self.base_lower,
        });
        Evaluation::Armed
    }

    async fn track(
        &mut self,
        quote: &Quote,
        ctx: &mut TickContext<'_>,
    ) -> Result<Evaluation, WatchError> {
        let price = quote.price;
        let extreme = match self.extreme {
            Some(extreme) if self.break_upward => extreme.max(price),
            Some(extreme) => extreme.min(price),
            None => price,
        };
        self.extreme = Some(extreme);

        let delta = (extreme - price).abs();
        let expected = self
            .bounce
            .expected(extreme)
            .ok_or(WatchError::Overflow("expected bounce"))?;

        if delta < expected {
            return Ok(Evaluation::Tracking);
        }

        let ceiling = expected
            .checked_mul(ctx.settings.stale_multiplier)
            .ok_or(WatchError::Overflow("stale ceiling"))?;
        let late_close = quote.basis == PriceBasis::PreviousClose
            && ctx.now.time() > ctx.settings.stale_cutoff;

        if delta > ceiling || late_close {
            warn!(
                symbol = %self.instrument.symbol,
                %price, %extreme, %delta, %expected, basis = %quote.basis,
                "Skipping stale retracement signal"
            );
            ctx.notifier.notify(&Notification::StaleSkipped {
                symbol: self.instrument.symbol.clone(),
                price,
                extreme,
                delta,
                expected,
            });
            return Ok(Evaluation::StaleSkipped);
        }

        self.fire(price, ctx).await
    }

    async fn fire(
        &mut self,
        price: Decimal,
        ctx: &mut TickContext<'_>,
    ) -> Result<Evaluation, WatchError> {
        // Committed before dispatch: a failed deal is never retried.
        self.state = WatchState::Done;
        self.done_reason = Some(DoneReason::Fired);

        let timeout = ctx.settings.deal_timeout;
        let outcome = match tokio::time::timeout(
            timeout,
            self.sink.deal(&self.instrument, price, self.trade_quantity),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(DealError::Timeout(timeout.as_secs())),
        };

        let symbol = self.instrument.symbol.clone();
        match outcome {
            Ok(()) => {
                info!(%symbol, %price, quantity = self.trade_quantity, sink = self.sink.name(), "Deal dispatched");
                ctx.positions.apply_deal(
                    &symbol,
                    self.trade_quantity,
                    price,
                    self.instrument.is_foreign(),
                );
                ctx.notifier.notify(&Notification::Dispatched {
                    symbol: symbol.clone(),
                    price,
                    quantity: self.trade_quantity,
                    success: true,
                    detail: format!("via {}", self.sink.name()),
                });

                if let Some(origin) = &self.origin {
                    // The trade stands; a restart would re-arm this rule
                    if let Err(e) = ctx.store.mark_consumed(&origin.id, &origin.raw) {
                        error!(%symbol, rule_id = %origin.id, error = %e, "Deal placed but rule not marked consumed");
                        ctx.notifier.notify(&Notification::NotPersisted {
                            symbol: symbol.clone(),
                            rule_id: origin.id.clone(),
                            error: e.to_string(),
                        });
                    }
                }
                Ok(Evaluation::Fired { success: true })
            }
            Err(e) => {
                warn!(%symbol, %price, quantity = self.trade_quantity, sink = self.sink.name(), error = %e, "Deal failed");
                ctx.notifier.notify(&Notification::Dispatched {
                    symbol,
                    price,
                    quantity: self.trade_quantity,
                    success: false,
                    detail: e.to_string(),
                });
                Ok(Evaluation::Fired { success: false })
            }
        }
    }

    fn deactivate(&mut self, reason: DoneReason, ctx: &mut TickContext<'_>) -> Evaluation {
        self.force_done(reason);
        info!(symbol = %self.instrument.symbol, %reason, "Watch deactivated");
        ctx.notifier.notify(&Notification::Deactivated {
            symbol: self.instrument.symbol.clone(),
            reason,
        });
        Evaluation::Deactivated(reason)
    }
}

impl fmt::Debug for Watch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watch")
            .field("instrument", &self.instrument)
            .field("base_lower", &self.base_lower)
            .field("base_upper", &self.base_upper)
            .field("base_is_percent", &self.base_is_percent)
            .field("base_resolved", &self.base_resolved)
            .field("break_upward", &self.break_upward)
            .field("bounce", &self.bounce)
            .field("trade_quantity", &self.trade_quantity)
            .field("window", &self.window)
            .field("state", &self.state)
            .field("done_reason", &self.done_reason)
            .field("extreme", &self.extreme)
            .field("origin", &self.origin)
            .field("sink", &self.sink.name())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use std::sync::Mutex;
    use std::time::Duration;
    use trigger_core::traits::{RecordingNotifier, WeekdayCalendar};
    use trigger_core::types::{Holding, Market};
    use trigger_data::MemoryConsumedStore;

    /// Sink that records calls and succeeds or fails on demand.
    pub(crate) struct ScriptedSink {
        pub calls: Mutex<Vec<(String, Decimal, i64)>>,
        pub fail: bool,
        pub delay: Option<Duration>,
    }

    impl ScriptedSink {
        pub fn ok() -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                fail: false,
                delay: None,
            })
        }

        pub fn failing() -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                fail: true,
                delay: None,
            })
        }

        pub fn calls(&self) -> Vec<(String, Decimal, i64)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TradeSink for ScriptedSink {
        async fn deal(
            &self,
            instrument: &Instrument,
            price: Decimal,
            quantity: i64,
        ) -> Result<(), DealError> {
            self.calls
                .lock()
                .unwrap()
                .push((instrument.symbol.clone(), price, quantity));
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                Err(DealError::Rejected("scripted failure".to_string()))
            } else {
                Ok(())
            }
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    pub(crate) fn monday(time: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(&format!("2024-03-04 {time}"), "%Y-%m-%d %H:%M:%S").unwrap()
    }

    struct Harness {
        calendar: WeekdayCalendar,
        store: MemoryConsumedStore,
        notifier: RecordingNotifier,
        positions: PositionBook,
        settings: EngineSettings,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                calendar: WeekdayCalendar::new(),
                store: MemoryConsumedStore::new(),
                notifier: RecordingNotifier::new(),
                positions: PositionBook::new(),
                settings: EngineSettings::default(),
            }
        }

        async fn feed(&mut self, watch: &mut Watch, quote: &Quote, now: NaiveDateTime) -> Evaluation {
            let mut ctx = TickContext {
                now,
                calendar: &self.calendar,
                store: &self.store,
                notifier: &self.notifier,
                positions: &mut self.positions,
                settings: &self.settings,
            };
            watch.on_quote(quote, &mut ctx).await.unwrap()
        }

        async fn feed_prices(&mut self, watch: &mut Watch, prices: &[Decimal]) -> Vec<Evaluation> {
            let mut out = Vec::new();
            for price in prices {
                out.push(self.feed(watch, &latest(*price), monday("10:00:00")).await);
            }
            out
        }
    }

    fn latest(price: Decimal) -> Quote {
        Quote::new("600000", PriceBasis::Latest, price, monday("10:00:00"))
    }

    fn shanghai() -> Instrument {
        Instrument::new("600000", Market::Shanghai)
    }

    fn absolute_up(sink: Arc<dyn TradeSink>) -> Watch {
        Watch::new(
            shanghai(),
            BaseSpec::Absolute(dec!(100)),
            true,
            BounceSpec::Absolute(dec!(1)),
            200,
            sink,
        )
    }

    #[tokio::test]
    async fn test_absolute_thresholds_scenario() {
        let sink = ScriptedSink::ok();
        let mut watch = absolute_up(sink.clone());
        let mut harness = Harness::new();

        let evals = harness
            .feed_prices(&mut watch, &[dec!(99), dec!(100), dec!(105), dec!(102)])
            .await;

        assert_eq!(
            evals,
            vec![
                Evaluation::Watching,
                Evaluation::Armed,
                Evaluation::Tracking,
                Evaluation::Fired { success: true },
            ]
        );
        assert_eq!(watch.extreme(), Some(dec!(105)));
        assert_eq!(watch.state(), WatchState::Done);
        assert_eq!(watch.done_reason(), Some(DoneReason::Fired));
        assert_eq!(sink.calls(), vec![("600000".to_string(), dec!(102), 200)]);
        assert_eq!(harness.positions.get("600000").unwrap().quantity, 200);
    }

    #[tokio::test]
    async fn test_percent_base_missed_window() {
        let sink = ScriptedSink::ok();
        let mut watch = Watch::new(
            shanghai(),
            "0.5%~1.5%".parse().unwrap(),
            true,
            BounceSpec::Percent(dec!(0.005)),
            100,
            sink.clone(),
        );
        assert!(!watch.base_resolved());
        assert_eq!(watch.base_lower(), dec!(0.005));

        let mut harness = Harness::new();
        let quote = latest(dec!(102)).with_prev_close(dec!(100));
        let eval = harness.feed(&mut watch, &quote, monday("10:00:00")).await;

        assert_eq!(eval, Evaluation::Deactivated(DoneReason::MissedEntry));
        assert_eq!(watch.base_lower(), dec!(100.5));
        assert_eq!(watch.base_upper(), dec!(101.5));
        assert_eq!(watch.state(), WatchState::Done);
        assert_eq!(watch.extreme(), None);
        assert!(sink.calls().is_empty());
    }

    #[tokio::test]
    async fn test_stop_loss_fires_on_next_tick() {
        let sink = ScriptedSink::ok();
        let holding = Holding::new("600000", 300, dec!(50));
        let mut watch = Watch::stop_loss(shanghai(), &holding, dec!(5), sink.clone()).unwrap();

        assert!(!watch.break_upward());
        assert_eq!(watch.base_lower(), dec!(47.5));
        assert_eq!(watch.bounce(), BounceSpec::Absolute(Decimal::ZERO));
        assert_eq!(watch.trade_quantity(), -300);

        let mut harness = Harness::new();
        harness.positions.insert(holding);

        let evals = harness.feed_prices(&mut watch, &[dec!(47.4), dec!(47.4)]).await;

        assert_eq!(evals, vec![Evaluation::Armed, Evaluation::Fired { success: true }]);
        assert_eq!(sink.calls(), vec![("600000".to_string(), dec!(47.4), -300)]);
        assert!(harness.positions.get("600000").is_none());
    }

    #[tokio::test]
    async fn test_stop_watch_survives_midnight() {
        let holding = Holding::new("AAPL", 10, dec!(150));
        let mut watch = Watch::stop_loss(Instrument::new("AAPL", Market::Us), &holding, dec!(5), ScriptedSink::ok()).unwrap();
        let mut harness = Harness::new();

        let late = NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_milli_opt(23, 59, 59, 500)
            .unwrap();
        let quote = Quote::new("AAPL", PriceBasis::Latest, dec!(149), late);
        let eval = harness.feed(&mut watch, &quote, late).await;

        assert_eq!(eval, Evaluation::Watching);
        assert_eq!(watch.state(), WatchState::Watching);
        assert_eq!(watch.done_reason(), None);
    }

    #[tokio::test]
    async fn test_never_fires_from_watching() {
        let sink = ScriptedSink::ok();
        let mut watch = absolute_up(sink.clone());
        let mut harness = Harness::new();

        // A big jump through the base only arms
        let eval = harness.feed(&mut watch, &latest(dec!(150)), monday("10:00:00")).await;
        assert_eq!(eval, Evaluation::Armed);
        assert!(sink.calls().is_empty());
    }

    #[tokio::test]
    async fn test_extreme_monotonic() {
        let mut harness = Harness::new();

        let mut up = Watch::new(
            shanghai(),
            BaseSpec::Absolute(dec!(10)),
            true,
            BounceSpec::Absolute(dec!(1000)),
            100,
            ScriptedSink::ok(),
        );
        let mut down = Watch::new(
            shanghai(),
            BaseSpec::Absolute(dec!(10)),
            false,
            BounceSpec::Absolute(dec!(1000)),
            -100,
            ScriptedSink::ok(),
        );

        let prices = [dec!(10), dec!(12), dec!(11), dec!(15), dec!(9), dec!(14), dec!(8), dec!(10)];

        let mut last_up: Option<Decimal> = None;
        let mut last_down: Option<Decimal> = None;
        for price in prices {
            harness.feed(&mut up, &latest(price), monday("10:00:00")).await;
            harness.feed(&mut down, &latest(price), monday("10:00:00")).await;

            if let (Some(prev), Some(now)) = (last_up, up.extreme()) {
                assert!(now >= prev);
            }
            if let (Some(prev), Some(now)) = (last_down, down.extreme()) {
                assert!(now <= prev);
            }
            last_up = up.extreme().or(last_up);
            last_down = down.extreme().or(last_down);
        }

        assert_eq!(up.extreme(), Some(dec!(15)));
        assert_eq!(down.extreme(), Some(dec!(8)));
        assert_eq!(up.state(), WatchState::Armed);
        assert_eq!(down.state(), WatchState::Armed);
    }

    #[test]
    fn test_base_resolves_once() {
        let mut watch = Watch::new(
            shanghai(),
            "-1.5%~-0.5%".parse().unwrap(),
            false,
            BounceSpec::Absolute(dec!(0.1)),
            100,
            ScriptedSink::ok(),
        );

        assert!(watch.resolve_base(dec!(100)).unwrap());
        assert_eq!(watch.base_lower(), dec!(98.5));
        assert_eq!(watch.base_upper(), dec!(99.5));

        assert!(!watch.resolve_base(dec!(200)).unwrap());
        assert_eq!(watch.base_lower(), dec!(98.5));
        assert_eq!(watch.base_upper(), dec!(99.5));
    }

    #[tokio::test]
    async fn test_outsized_retracement_is_stale() {
        let sink = ScriptedSink::ok();
        let mut watch = absolute_up(sink.clone());
        let mut harness = Harness::new();

        // Arm at 100, extreme 110, drop to 106: delta 4 > 3 * 1
        let evals = harness
            .feed_prices(&mut watch, &[dec!(100), dec!(110), dec!(106)])
            .await;
        assert_eq!(evals[2], Evaluation::StaleSkipped);
        assert_eq!(watch.state(), WatchState::Armed);
        assert!(sink.calls().is_empty());
        assert_eq!(
            harness
                .notifier
                .count(|n| matches!(n, Notification::StaleSkipped { .. })),
            1
        );

        // Back inside the band: delta 2
        let eval = harness.feed(&mut watch, &latest(dec!(108)), monday("10:00:00")).await;
        assert_eq!(eval, Evaluation::Fired { success: true });
    }

    #[tokio::test]
    async fn test_previous_close_basis_stale_after_cutoff() {
        let mut watch = absolute_up(ScriptedSink::ok());
        let mut harness = Harness::new();
        harness.feed_prices(&mut watch, &[dec!(100), dec!(105)]).await;

        let close = Quote::new("600000", PriceBasis::PreviousClose, dec!(103), monday("10:00:00"));
        let eval = harness.feed(&mut watch, &close, monday("10:00:00")).await;
        assert_eq!(eval, Evaluation::StaleSkipped);

        let eval = harness.feed(&mut watch, &close, monday("09:31:00")).await;
        assert_eq!(eval, Evaluation::Fired { success: true });
    }

    #[tokio::test]
    async fn test_done_is_terminal() {
        let mut watch = absolute_up(ScriptedSink::ok());
        let mut harness = Harness::new();
        harness
            .feed_prices(&mut watch, &[dec!(100), dec!(105), dec!(104)])
            .await;
        assert_eq!(watch.state(), WatchState::Done);

        let snapshot = format!("{watch:?}");
        for price in [dec!(1), dec!(100), dec!(200), dec!(0)] {
            let quote = latest(price).with_prev_close(dec!(50));
            let eval = harness.feed(&mut watch, &quote, monday("10:00:00")).await;
            assert_eq!(eval, Evaluation::Inactive);
        }
        assert!(!watch.resolve_base(dec!(10)).unwrap());
        assert_eq!(format!("{watch:?}"), snapshot);
    }

    #[tokio::test]
    async fn test_failed_deal_stays_done() {
        let sink = ScriptedSink::failing();
        let mut watch = absolute_up(sink.clone()).with_origin("r1", "raw");
        let mut harness = Harness::new();

        let evals = harness
            .feed_prices(&mut watch, &[dec!(100), dec!(105), dec!(104), dec!(103)])
            .await;

        assert_eq!(evals[2], Evaluation::Fired { success: false });
        assert_eq!(evals[3], Evaluation::Inactive);
        assert_eq!(sink.calls().len(), 1);
        assert!(!harness.store.is_consumed("r1").unwrap());
        assert!(harness.positions.is_empty());
        assert_eq!(
            harness.notifier.count(|n| matches!(
                n,
                Notification::Dispatched { success: false, .. }
            )),
            1
        );
    }

    #[tokio::test]
    async fn test_success_marks_origin_consumed() {
        let mut watch = absolute_up(ScriptedSink::ok()).with_origin("r1", "r1,600000");
        let mut harness = Harness::new();

        harness
            .feed_prices(&mut watch, &[dec!(100), dec!(105), dec!(104)])
            .await;

        assert!(harness.store.is_consumed("r1").unwrap());
    }

    #[tokio::test]
    async fn test_slow_sink_times_out() {
        let sink = Arc::new(ScriptedSink {
            calls: Mutex::new(Vec::new()),
            fail: false,
            delay: Some(Duration::from_secs(5)),
        });
        let mut watch = absolute_up(sink.clone());
        let mut harness = Harness::new();
        harness.settings = EngineSettings::default().with_deal_timeout(Duration::from_millis(20));

        let evals = harness
            .feed_prices(&mut watch, &[dec!(100), dec!(105), dec!(104)])
            .await;

        assert_eq!(evals[2], Evaluation::Fired { success: false });
        assert_eq!(watch.state(), WatchState::Done);
    }

    #[tokio::test]
    async fn test_guards() {
        let mut harness = Harness::new();
        let window = WatchWindow::parse("09:30:00", "14:55:00", "2024-03-05").unwrap();

        // Zero price: nothing happens
        let mut watch = absolute_up(ScriptedSink::ok()).with_window(window);
        let eval = harness.feed(&mut watch, &latest(Decimal::ZERO), monday("10:00:00")).await;
        assert_eq!(eval, Evaluation::NoPrice);

        // Before the window: still pending
        let eval = harness.feed(&mut watch, &latest(dec!(100)), monday("09:00:00")).await;
        assert_eq!(eval, Evaluation::NotYetOpen);
        assert_eq!(watch.state(), WatchState::Watching);

        // After the window: done
        let eval = harness.feed(&mut watch, &latest(dec!(100)), monday("15:00:00")).await;
        assert_eq!(eval, Evaluation::Deactivated(DoneReason::WindowClosed));

        // Past the expiry date
        let mut watch = absolute_up(ScriptedSink::ok()).with_window(window);
        let thursday = NaiveDate::from_ymd_opt(2024, 3, 7)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        let eval = harness.feed(&mut watch, &latest(dec!(100)), thursday).await;
        assert_eq!(eval, Evaluation::Deactivated(DoneReason::Expired));
    }

    #[tokio::test]
    async fn test_non_trading_day_domestic_only() {
        let mut harness = Harness::new();
        let saturday = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();

        let mut domestic = absolute_up(ScriptedSink::ok());
        let eval = harness.feed(&mut domestic, &latest(dec!(100)), saturday).await;
        assert_eq!(eval, Evaluation::Deactivated(DoneReason::NonTradingDay));

        let mut foreign = Watch::new(
            Instrument::new("AAPL", Market::Us),
            BaseSpec::Absolute(dec!(100)),
            true,
            BounceSpec::Absolute(dec!(1)),
            5,
            ScriptedSink::ok(),
        );
        let eval = harness.feed(&mut foreign, &latest(dec!(100)), saturday).await;
        assert_eq!(eval, Evaluation::Armed);
    }

    #[tokio::test]
    async fn test_percent_base_waits_for_prev_close() {
        let mut watch = Watch::new(
            shanghai(),
            "1%".parse().unwrap(),
            true,
            BounceSpec::Absolute(dec!(0.1)),
            100,
            ScriptedSink::ok(),
        );
        let mut harness = Harness::new();

        let eval = harness.feed(&mut watch, &latest(dec!(10.2)), monday("10:00:00")).await;
        assert_eq!(eval, Evaluation::AwaitingPrevClose);

        let quote = latest(dec!(10.1)).with_prev_close(dec!(10));
        let eval = harness.feed(&mut watch, &quote, monday("10:01:00")).await;
        assert_eq!(eval, Evaluation::Armed);
        assert_eq!(watch.base_lower(), dec!(10.1));
    }
}
