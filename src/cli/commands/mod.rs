//! CLI command implementations.

pub mod replay;
pub mod rules;
pub mod validate;

use std::sync::Arc;
use trigger_broker::ALL_BACKENDS;
use trigger_core::traits::{SinkRegistry, TradeSink};

/// Registry routing every backend to one sink.
pub fn single_sink_registry(sink: Arc<dyn TradeSink>) -> SinkRegistry {
    ALL_BACKENDS
        .iter()
        .fold(SinkRegistry::new(), |registry, backend| registry.with(*backend, sink.clone()))
}
