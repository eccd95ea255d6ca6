//! Logging and notification delivery.

mod logging;
mod notifier;

pub use logging::setup_logging;
pub use notifier::TracingNotifier;
