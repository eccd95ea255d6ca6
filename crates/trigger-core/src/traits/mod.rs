//! Capability traits the engine calls out through.

mod calendar;
mod notifier;
mod sink;
mod store;

pub use calendar::{TradingCalendar, WeekdayCalendar};
pub use notifier::{Notification, Notifier, NullNotifier, RecordingNotifier};
pub use sink::{SinkRegistry, TradeSink};
pub use store::ConsumedStore;
