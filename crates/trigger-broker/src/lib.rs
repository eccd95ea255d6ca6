//! Trade sink backends.
//!
//! Every backend implements [`TradeSink`](trigger_core::traits::TradeSink)
//! and is registered per [`ExecutionBackend`] in a
//! [`SinkRegistry`](trigger_core::traits::SinkRegistry).

mod command;
mod http;
mod paper;

pub use command::{CommandSink, CommandSinkConfig};
pub use http::{HttpSink, HttpSinkConfig};
pub use paper::{PaperAccount, PaperFill, PaperSink};

use trigger_core::types::ExecutionBackend;

/// Order side as sent to external backends.
pub(crate) fn side_of(quantity: i64) -> &'static str {
    if quantity >= 0 {
        "buy"
    } else {
        "sell"
    }
}

/// Backends every replay routes to the paper sink.
pub const ALL_BACKENDS: [ExecutionBackend; 3] = [
    ExecutionBackend::Desktop,
    ExecutionBackend::Streaming,
    ExecutionBackend::Paper,
];
