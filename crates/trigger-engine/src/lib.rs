//! Condition-order trigger engine.
//!
//! A [`Watch`] waits for a breakout through its base threshold, then tracks
//! the running extreme and fires exactly one trade once price gives back the
//! configured bounce. A [`WatchSet`] fans quotes out to the watches of each
//! symbol and isolates their failures; a [`QuoteRouter`] serializes pushed
//! quotes per symbol in front of it.

mod loader;
mod router;
mod settings;
mod stops;
mod threshold;
mod watch;
mod watch_set;
mod window;

pub use loader::{build_watch, load_watches, parse_bool_like, LoadReport};
pub use router::QuoteRouter;
pub use settings::{Clock, EngineSettings};
pub use stops::StopRule;
pub use threshold::{BaseSpec, BounceSpec};
pub use watch::{Evaluation, RuleOrigin, TickContext, Watch};
pub use watch_set::{TickReport, WatchSet, WatchSummary};
pub use window::WatchWindow;
